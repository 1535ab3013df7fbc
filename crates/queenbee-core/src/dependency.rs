//! Dependency references
//!
//! A dependency reference names one package version in one registry. It is
//! read from a recipe's dependency list and handed to the resolver, which
//! hands back a locked copy once the digest is known.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::digest::Digest;
use crate::kind::PackageKind;

/// Well-known index file name under every registry root
pub const INDEX_FILE: &str = "index.json";

/// Reference to a package version published in a registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReference {
    /// Package kind
    #[serde(rename = "type")]
    pub kind: PackageKind,

    /// Package name in the registry
    pub name: String,

    /// Digest pinned when the dependency was locked
    #[serde(default, rename = "hash", alias = "digest", skip_serializing_if = "Option::is_none")]
    pub digest: Option<PinnedDigest>,

    /// Name used to refer to this dependency if `name` clashes with another one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Exact package version
    pub version: String,

    /// Registry root URL (`file:` or HTTP(S))
    pub source: String,
}

impl DependencyReference {
    pub fn new(
        kind: PackageKind,
        name: impl Into<String>,
        version: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            digest: None,
            alias: None,
            version: version.into(),
            source: source.into(),
        }
    }

    /// Set an alias
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Copy of this reference pinned to `digest`
    #[must_use]
    pub fn with_digest(&self, digest: Digest) -> Self {
        Self {
            digest: Some(PinnedDigest::Valid(digest)),
            ..self.clone()
        }
    }

    /// A reference is locked once its digest is known
    pub fn is_locked(&self) -> bool {
        self.digest.is_some()
    }

    /// Name other entities use for this dependency (alias or original name)
    pub fn ref_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// URL of the registry index document
    pub fn index_url(&self) -> String {
        source_url(&self.source, INDEX_FILE)
    }

    /// URL of a file given relative to the registry root
    pub fn package_url(&self, relative: &str) -> String {
        source_url(&self.source, relative)
    }
}

/// Digest written in a dependency file
///
/// Hand-edited or foreign lock files can carry a hash that is not a SHA-256
/// digest. Such a value is kept as written; no record can carry it, so it
/// resolves like any digest the registry no longer lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinnedDigest {
    Valid(Digest),
    Unparsed(String),
}

impl PinnedDigest {
    pub fn parse(value: &str) -> Self {
        match Digest::parse(value) {
            Ok(digest) => PinnedDigest::Valid(digest),
            Err(_) => PinnedDigest::Unparsed(value.to_string()),
        }
    }

    /// The digest, if the pinned value is one
    pub fn digest(&self) -> Option<&Digest> {
        match self {
            PinnedDigest::Valid(digest) => Some(digest),
            PinnedDigest::Unparsed(_) => None,
        }
    }
}

impl From<Digest> for PinnedDigest {
    fn from(digest: Digest) -> Self {
        PinnedDigest::Valid(digest)
    }
}

impl fmt::Display for PinnedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinnedDigest::Valid(digest) => fmt::Display::fmt(digest, f),
            PinnedDigest::Unparsed(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for PinnedDigest {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PinnedDigest {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(PinnedDigest::parse(&s))
    }
}

/// Join a registry root and a path relative to it
pub fn source_url(base: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> DependencyReference {
        DependencyReference::new(
            PackageKind::Recipe,
            "daylight-factor",
            "0.2.0",
            "https://registry.example.com/ladybug-tools/",
        )
    }

    #[test]
    fn test_ref_name() {
        let dep = reference();
        assert_eq!(dep.ref_name(), "daylight-factor");

        let aliased = reference().with_alias("df");
        assert_eq!(aliased.ref_name(), "df");
    }

    #[test]
    fn test_with_digest_locks_a_copy() {
        let dep = reference();
        assert!(!dep.is_locked());

        let locked = dep.with_digest(Digest::of(b"manifest"));
        assert!(locked.is_locked());
        assert!(!dep.is_locked());
        assert_eq!(locked.name, dep.name);
    }

    #[test]
    fn test_urls() {
        let dep = reference();
        assert_eq!(
            dep.index_url(),
            "https://registry.example.com/ladybug-tools/index.json"
        );
        assert_eq!(
            dep.package_url("/recipes/daylight-factor-0.2.0.tgz"),
            "https://registry.example.com/ladybug-tools/recipes/daylight-factor-0.2.0.tgz"
        );

        let local = DependencyReference::new(PackageKind::Operator, "x", "1.0.0", "file:registry");
        assert_eq!(local.index_url(), "file:registry/index.json");
    }

    #[test]
    fn test_deserialize_hash_field() {
        let digest = Digest::of(b"resource");
        let yaml = format!(
            "type: operator\nname: honeybee-radiance\nversion: 1.2.3\nsource: file:repo\nhash: {}\n",
            digest
        );
        let dep: DependencyReference = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(dep.kind, PackageKind::Operator);
        assert_eq!(dep.digest, Some(PinnedDigest::Valid(digest)));
        assert!(dep.alias.is_none());

        let out = serde_yaml::to_string(&dep).unwrap();
        assert!(out.contains("hash:"));
        assert!(!out.contains("alias"));
    }

    #[test]
    fn test_deserialize_unparsed_hash() {
        let yaml = "type: recipe\nname: daylight-factor\nversion: 0.2.0\nsource: file:repo\nhash: stale\n";
        let dep: DependencyReference = serde_yaml::from_str(yaml).unwrap();

        assert!(dep.is_locked());
        assert_eq!(dep.digest, Some(PinnedDigest::Unparsed("stale".to_string())));
        assert!(dep.digest.as_ref().and_then(PinnedDigest::digest).is_none());
        assert!(serde_yaml::to_string(&dep).unwrap().contains("hash: stale"));
    }

    #[test]
    fn test_deserialize_without_hash() {
        let dep: DependencyReference = serde_json::from_str(
            r#"{"type": "recipe", "name": "a", "version": "0.1.0", "source": "file:r", "alias": "b"}"#,
        )
        .unwrap();
        assert!(!dep.is_locked());
        assert_eq!(dep.ref_name(), "b");
    }
}
