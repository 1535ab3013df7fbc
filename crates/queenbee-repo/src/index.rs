//! Registry index types
//!
//! The index lists every published version of every operator and recipe in a
//! registry. Both kinds share one catalog type so lookup and insertion rules
//! are identical for operators and recipes.

use chrono::{DateTime, Utc};
use queenbee_core::{Digest, PackageKind};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::error::{RepoError, Result};

/// Registry index (`index.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageIndex {
    /// When this index was last modified
    #[serde(default = "Utc::now", deserialize_with = "timestamp::generated")]
    pub generated: DateTime<Utc>,

    /// Operators indexed by name
    #[serde(default)]
    pub operator: Catalog,

    /// Recipes indexed by name
    #[serde(default)]
    pub recipe: Catalog,
}

impl Default for PackageIndex {
    fn default() -> Self {
        Self {
            generated: Utc::now(),
            operator: Catalog::default(),
            recipe: Catalog::default(),
        }
    }
}

impl PackageIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an index document; `location` is only used in error messages
    ///
    /// A document listing the same version of a package twice is rejected.
    pub fn from_json_bytes(bytes: &[u8], location: &str) -> Result<Self> {
        let index: Self = serde_json::from_slice(bytes).map_err(|e| RepoError::InvalidIndex {
            location: location.to_string(),
            message: e.to_string(),
        })?;

        for kind in PackageKind::ALL {
            if let Some((name, version)) = index.catalog(kind).first_duplicate() {
                return Err(RepoError::InvalidIndex {
                    location: location.to_string(),
                    message: format!("{} {} version {} is listed more than once", kind, name, version),
                });
            }
        }
        Ok(index)
    }

    /// Serialize as a pretty-printed index document
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Catalog holding packages of `kind`
    pub fn catalog(&self, kind: PackageKind) -> &Catalog {
        match kind {
            PackageKind::Operator => &self.operator,
            PackageKind::Recipe => &self.recipe,
        }
    }

    /// Mutable catalog holding packages of `kind`
    pub fn catalog_mut(&mut self, kind: PackageKind) -> &mut Catalog {
        match kind {
            PackageKind::Operator => &mut self.operator,
            PackageKind::Recipe => &mut self.recipe,
        }
    }

    /// Find the record for an exact version
    pub fn lookup_by_version(
        &self,
        kind: PackageKind,
        name: &str,
        version: &str,
    ) -> Result<&PackageRecord> {
        self.catalog(kind).by_version(kind, name, version)
    }

    /// Find the record published with `digest`
    pub fn lookup_by_digest(
        &self,
        kind: PackageKind,
        name: &str,
        digest: &Digest,
    ) -> Result<&PackageRecord> {
        self.catalog(kind).by_digest(kind, name, digest)
    }

    /// Add a record, refusing to duplicate an indexed version unless `overwrite` is set
    pub fn insert(&mut self, kind: PackageKind, record: PackageRecord, overwrite: bool) -> Result<()> {
        self.catalog_mut(kind).insert(kind, record, overwrite)?;
        self.generated = Utc::now();
        Ok(())
    }

    /// All versions of a package, in index order
    pub fn versions(&self, kind: PackageKind, name: &str) -> Option<&[PackageRecord]> {
        self.catalog(kind).get(name)
    }

    /// Highest version of a package (semver order, non-semver versions last)
    pub fn latest(&self, kind: PackageKind, name: &str) -> Option<&PackageRecord> {
        self.catalog(kind)
            .get(name)?
            .iter()
            .max_by(|a, b| compare_versions(&a.version, &b.version))
    }

    /// Package names of one kind
    pub fn names(&self, kind: PackageKind) -> Vec<&str> {
        self.catalog(kind).names().collect()
    }

    /// Every record with its kind
    pub fn records(&self) -> impl Iterator<Item = (PackageKind, &PackageRecord)> {
        PackageKind::ALL
            .into_iter()
            .flat_map(move |kind| self.catalog(kind).records().map(move |r| (kind, r)))
    }

    /// Number of records across both kinds
    pub fn len(&self) -> usize {
        self.operator.len() + self.recipe.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Search both kinds by name, description or keyword
    ///
    /// Returns the latest version of each matching package, exact name
    /// matches first, then by name.
    pub fn search(&self, query: &str) -> Vec<(PackageKind, &PackageRecord)> {
        let query_lower = query.to_lowercase();

        let mut results: Vec<_> = PackageKind::ALL
            .into_iter()
            .flat_map(|kind| {
                self.catalog(kind)
                    .names()
                    .filter_map(move |name| self.latest(kind, name).map(|r| (kind, r)))
            })
            .filter(|(_, record)| record.matches(&query_lower))
            .collect();

        results.sort_by(|(ka, a), (kb, b)| {
            let a_exact = a.name.to_lowercase() == query_lower;
            let b_exact = b.name.to_lowercase() == query_lower;
            b_exact
                .cmp(&a_exact)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| ka.cmp(kb))
        });

        results
    }
}

/// Packages of one kind, by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: BTreeMap<String, Vec<PackageRecord>>,
}

impl Catalog {
    /// All versions of a package
    pub fn get(&self, name: &str) -> Option<&[PackageRecord]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    fn versions_of(&self, kind: PackageKind, name: &str) -> Result<&[PackageRecord]> {
        self.get(name).ok_or_else(|| RepoError::PackageNotFound {
            kind,
            name: name.to_string(),
        })
    }

    fn by_version(&self, kind: PackageKind, name: &str, version: &str) -> Result<&PackageRecord> {
        self.versions_of(kind, name)?
            .iter()
            .find(|r| r.version == version)
            .ok_or_else(|| RepoError::VersionNotFound {
                kind,
                name: name.to_string(),
                version: version.to_string(),
            })
    }

    fn by_digest(&self, kind: PackageKind, name: &str, digest: &Digest) -> Result<&PackageRecord> {
        self.versions_of(kind, name)?
            .iter()
            .find(|r| &r.digest == digest)
            .ok_or_else(|| RepoError::DigestNotFound {
                kind,
                name: name.to_string(),
                digest: digest.clone(),
            })
    }

    fn insert(&mut self, kind: PackageKind, record: PackageRecord, overwrite: bool) -> Result<()> {
        let versions = self.entries.entry(record.name.clone()).or_default();

        if versions.iter().any(|r| r.version == record.version) {
            if !overwrite {
                return Err(RepoError::Conflict {
                    kind,
                    name: record.name,
                    version: record.version,
                });
            }
            versions.retain(|r| r.version != record.version);
        }

        versions.push(record);
        Ok(())
    }

    fn first_duplicate(&self) -> Option<(&str, &str)> {
        self.entries.iter().find_map(|(name, versions)| {
            let mut seen = HashSet::new();
            versions
                .iter()
                .find(|r| !seen.insert(r.version.as_str()))
                .map(|r| (name.as_str(), r.version.as_str()))
        })
    }

    /// Package names in this catalog
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every record in this catalog
    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.entries.values().flatten()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One published version of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Package name
    pub name: String,

    /// Package version (manifest tag)
    pub version: String,

    /// Digest of the bundle's resource.json
    #[serde(alias = "hash")]
    pub digest: Digest,

    /// Bundle location relative to the registry root
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// When the bundle was packaged
    #[serde(
        default,
        deserialize_with = "timestamp::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub created: Option<DateTime<Utc>>,
}

impl PackageRecord {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        digest: Digest,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            digest,
            url: url.into(),
            description: None,
            keywords: Vec::new(),
            created: None,
        }
    }

    /// Parse version as semver
    pub fn parsed_version(&self) -> Option<Version> {
        Version::parse(&self.version).ok()
    }

    fn matches(&self, query_lower: &str) -> bool {
        self.name.to_lowercase().contains(query_lower)
            || self
                .description
                .as_ref()
                .map(|d| d.to_lowercase().contains(query_lower))
                .unwrap_or(false)
            || self
                .keywords
                .iter()
                .any(|k| k.to_lowercase().contains(query_lower))
    }
}

/// Index timestamps: RFC 3339, or a naive date-time taken as UTC
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    fn parse(value: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(value) => parse(&value)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", value))),
        }
    }

    /// `null` means never set, which reads as now
    pub fn generated<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(optional(deserializer)?.unwrap_or_else(Utc::now))
    }
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    match (Version::parse(a).ok(), Version::parse(b).ok()) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, version: &str, content: &str) -> PackageRecord {
        PackageRecord::new(
            name,
            version,
            Digest::of(content.as_bytes()),
            format!("recipes/{}-{}.tgz", name, version),
        )
    }

    fn sample_index() -> PackageIndex {
        let mut index = PackageIndex::new();
        index
            .insert(PackageKind::Recipe, record("daylight-factor", "0.1.0", "A"), false)
            .unwrap();
        index
            .insert(PackageKind::Recipe, record("daylight-factor", "0.2.0", "B"), false)
            .unwrap();

        let mut radiance = record("honeybee-radiance", "1.2.3", "C");
        radiance.url = "operators/honeybee-radiance-1.2.3.tgz".to_string();
        radiance.keywords = vec!["raytracing".to_string()];
        radiance.description = Some("Radiance commands".to_string());
        index.insert(PackageKind::Operator, radiance, false).unwrap();
        index
    }

    #[test]
    fn test_insert_duplicate_version_conflicts() {
        let mut index = sample_index();
        let err = index
            .insert(PackageKind::Recipe, record("daylight-factor", "0.2.0", "B2"), false)
            .unwrap_err();

        assert!(matches!(err, RepoError::Conflict { ref version, .. } if version == "0.2.0"));
        let versions = index.versions(PackageKind::Recipe, "daylight-factor").unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[1].digest, Digest::of(b"B"));
    }

    #[test]
    fn test_insert_overwrite_replaces() {
        let mut index = sample_index();
        index
            .insert(PackageKind::Recipe, record("daylight-factor", "0.2.0", "B2"), true)
            .unwrap();

        let versions = index.versions(PackageKind::Recipe, "daylight-factor").unwrap();
        let matching: Vec<_> = versions.iter().filter(|r| r.version == "0.2.0").collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].digest, Digest::of(b"B2"));
        assert_eq!(versions.len(), 2);
    }

    #[test]
    fn test_same_version_different_kinds_do_not_conflict() {
        let mut index = PackageIndex::new();
        index
            .insert(PackageKind::Recipe, record("shared", "1.0.0", "r"), false)
            .unwrap();
        index
            .insert(PackageKind::Operator, record("shared", "1.0.0", "o"), false)
            .unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_insert_refreshes_generated() {
        let mut index = PackageIndex::new();
        let before = index.generated;
        index
            .insert(PackageKind::Operator, record("x", "1.0.0", "x"), false)
            .unwrap();
        assert!(index.generated >= before);
    }

    #[test]
    fn test_lookups_return_inserted_records() {
        let index = sample_index();
        for (kind, record) in index.records() {
            let by_version = index.lookup_by_version(kind, &record.name, &record.version).unwrap();
            let by_digest = index.lookup_by_digest(kind, &record.name, &record.digest).unwrap();
            assert_eq!(by_version, record);
            assert_eq!(by_digest, record);
        }
    }

    #[test]
    fn test_lookup_failures() {
        let index = sample_index();

        let err = index
            .lookup_by_version(PackageKind::Recipe, "daylight-factor", "9.9.9")
            .unwrap_err();
        assert!(matches!(err, RepoError::VersionNotFound { .. }));

        let err = index
            .lookup_by_digest(PackageKind::Recipe, "daylight-factor", &Digest::of(b"stale"))
            .unwrap_err();
        assert!(matches!(err, RepoError::DigestNotFound { .. }));

        let err = index
            .lookup_by_version(PackageKind::Operator, "daylight-factor", "0.1.0")
            .unwrap_err();
        assert!(matches!(err, RepoError::PackageNotFound { kind: PackageKind::Operator, .. }));
    }

    #[test]
    fn test_latest() {
        let mut index = sample_index();
        index
            .insert(PackageKind::Recipe, record("daylight-factor", "0.10.0", "D"), false)
            .unwrap();
        index
            .insert(PackageKind::Recipe, record("daylight-factor", "nightly", "E"), false)
            .unwrap();

        let latest = index.latest(PackageKind::Recipe, "daylight-factor").unwrap();
        assert_eq!(latest.version, "0.10.0");
        assert!(index.latest(PackageKind::Operator, "missing").is_none());
    }

    #[test]
    fn test_search() {
        let index = sample_index();

        let results = index.search("daylight");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, PackageKind::Recipe);
        assert_eq!(results[0].1.version, "0.2.0");

        let results = index.search("RAYTRACING");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1.name, "honeybee-radiance");

        assert!(index.search("energyplus").is_empty());
    }

    #[test]
    fn test_json_document_shape() {
        let index = sample_index();
        let json = index.to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(value.get("generated").is_some());
        assert_eq!(value["recipe"]["daylight-factor"].as_array().unwrap().len(), 2);
        assert_eq!(value["operator"]["honeybee-radiance"][0]["version"], "1.2.3");

        let parsed = PackageIndex::from_json_bytes(json.as_bytes(), "memory").unwrap();
        assert_eq!(parsed, index);
    }

    #[test]
    fn test_parse_accepts_hash_key_and_missing_sections() {
        let digest = Digest::of(b"A");
        let doc = format!(
            r#"{{"recipe": {{"daylight-factor": [{{"name": "daylight-factor", "version": "0.1.0", "hash": "{}", "url": "recipes/daylight-factor-0.1.0.tgz"}}]}}}}"#,
            digest
        );
        let index = PackageIndex::from_json_bytes(doc.as_bytes(), "memory").unwrap();

        assert!(index.operator.is_empty());
        let found = index
            .lookup_by_digest(PackageKind::Recipe, "daylight-factor", &digest)
            .unwrap();
        assert_eq!(found.version, "0.1.0");
    }

    #[test]
    fn test_parse_naive_and_null_timestamps() {
        let digest = Digest::of(b"A");
        let doc = format!(
            r#"{{"generated": "2020-05-01T12:00:00.123456", "recipe": {{"daylight-factor": [{{"name": "daylight-factor", "version": "0.1.0", "digest": "{}", "url": "recipes/daylight-factor-0.1.0.tgz", "created": "2020-04-30 08:15:00"}}]}}}}"#,
            digest
        );
        let index = PackageIndex::from_json_bytes(doc.as_bytes(), "memory").unwrap();
        assert_eq!(index.generated.to_rfc3339(), "2020-05-01T12:00:00.123456+00:00");
        let record = index
            .lookup_by_version(PackageKind::Recipe, "daylight-factor", "0.1.0")
            .unwrap();
        assert_eq!(record.created.unwrap().to_rfc3339(), "2020-04-30T08:15:00+00:00");

        let doc = format!(
            r#"{{"generated": null, "operator": {{}}, "recipe": {{"daylight-factor": [{{"name": "daylight-factor", "version": "0.1.0", "digest": "{}", "url": "recipes/daylight-factor-0.1.0.tgz", "created": null}}]}}}}"#,
            digest
        );
        let before = Utc::now();
        let index = PackageIndex::from_json_bytes(doc.as_bytes(), "memory").unwrap();
        assert!(index.generated >= before);
        assert!(index.records().all(|(_, r)| r.created.is_none()));

        let doc = br#"{"generated": "2020-05-01T12:00:00+02:00"}"#;
        let index = PackageIndex::from_json_bytes(doc, "memory").unwrap();
        assert_eq!(index.generated.to_rfc3339(), "2020-05-01T10:00:00+00:00");

        let err = PackageIndex::from_json_bytes(br#"{"generated": "yesterday"}"#, "memory").unwrap_err();
        assert!(matches!(err, RepoError::InvalidIndex { ref message, .. } if message.contains("yesterday")));
    }

    #[test]
    fn test_parse_rejects_duplicate_versions() {
        let digest = Digest::of(b"A");
        let entry = format!(
            r#"{{"name": "daylight-factor", "version": "0.1.0", "digest": "{}", "url": "recipes/daylight-factor-0.1.0.tgz"}}"#,
            digest
        );
        let doc = format!(r#"{{"recipe": {{"daylight-factor": [{}, {}]}}}}"#, entry, entry);

        let err = PackageIndex::from_json_bytes(doc.as_bytes(), "memory").unwrap_err();
        assert!(matches!(err, RepoError::InvalidIndex { ref message, .. } if message.contains("0.1.0")));
    }

    #[test]
    fn test_invalid_document() {
        let err = PackageIndex::from_json_bytes(b"not json", "https://example.com/index.json")
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidIndex { ref location, .. } if location.contains("example.com")));
    }
}
