//! Dependency resolution
//!
//! Resolution turns one dependency reference into verified manifest bytes:
//!
//! ```text
//! Unresolved -> IndexFetched -> RecordLocated -> BundleFetched -> Verified
//! ```
//!
//! Any step may fail, which ends the attempt. Unlocked references are located
//! by version and locked to the published digest. Locked references are
//! located by digest; if the registry no longer lists that digest for the
//! package, the version is looked up instead and the reference is re-locked,
//! which tolerates a publisher overwriting a version. Integrity is never
//! optional in that sense: a digest mismatch on the fetched manifest fails.

use queenbee_core::{DependencyReference, Digest, INDEX_FILE, MANIFEST_ENTRY, source_url};
use std::fmt;

use crate::error::{RepoError, Result};
use crate::fetch::{Fetcher, extract_entry};
use crate::index::{PackageIndex, PackageRecord};

/// Steps of a resolution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    Unresolved,
    IndexFetched,
    RecordLocated,
    BundleFetched,
    Verified,
}

impl fmt::Display for ResolveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unresolved => "unresolved",
            Self::IndexFetched => "index-fetched",
            Self::RecordLocated => "record-located",
            Self::BundleFetched => "bundle-fetched",
            Self::Verified => "verified",
        };
        f.write_str(name)
    }
}

/// Resolution options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Compare the manifest digest against the index (default: on)
    pub verify_digest: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            verify_digest: true,
        }
    }
}

/// Manifest bytes of a resolved package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBundle {
    /// Raw `resource.json` bytes
    pub manifest: Vec<u8>,
    /// Digest the bytes were verified against
    pub digest: Digest,
}

/// Outcome of resolving one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The reference, locked to the resolved digest
    pub reference: DependencyReference,
    pub bundle: ResolvedBundle,
}

impl Resolution {
    /// Whether resolution pinned a digest that differs from the input reference
    pub fn relocked(&self, original: &DependencyReference) -> bool {
        original.digest != self.reference.digest
    }
}

/// Resolves dependency references against their registries
pub struct DependencyResolver<F> {
    fetcher: F,
    options: ResolveOptions,
}

impl<F: Fetcher> DependencyResolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            options: ResolveOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch and parse the index of a registry
    pub async fn fetch_index(&self, source: &str) -> Result<PackageIndex> {
        let url = source_url(source, INDEX_FILE);
        let bytes = self.fetcher.fetch_bytes(&url).await?;
        PackageIndex::from_json_bytes(&bytes, &url)
    }

    /// Find the index record a reference points to
    ///
    /// A locked reference whose digest is unknown for its package falls back
    /// to a version lookup. Every other lookup failure is returned as is.
    pub fn locate<'a>(
        index: &'a PackageIndex,
        reference: &DependencyReference,
    ) -> Result<&'a PackageRecord> {
        let kind = reference.kind;
        let name = reference.name.as_str();

        let Some(pinned) = &reference.digest else {
            return index.lookup_by_version(kind, name, &reference.version);
        };

        // A hash that is not a digest can never be indexed
        if let Some(digest) = pinned.digest() {
            match index.lookup_by_digest(kind, name, digest) {
                Err(RepoError::DigestNotFound { .. }) => {}
                found => return found,
            }
        }

        tracing::warn!(
            "Digest {} of {} {} is no longer indexed, looking up version {}",
            pinned,
            kind,
            name,
            reference.version
        );
        index.lookup_by_version(kind, name, &reference.version)
    }

    /// Resolve one reference to verified manifest bytes
    ///
    /// The input reference is not modified; the returned resolution carries
    /// the locked copy.
    pub async fn resolve(&self, reference: &DependencyReference) -> Result<Resolution> {
        let mut state = ResolveState::Unresolved;
        trace_state(reference, state);

        let index = self.fetch_index(&reference.source).await?;
        state = ResolveState::IndexFetched;
        trace_state(reference, state);

        let record = Self::locate(&index, reference)?;
        let locked = reference.with_digest(record.digest.clone());
        state = ResolveState::RecordLocated;
        trace_state(&locked, state);

        let bundle_url = reference.package_url(&record.url);
        let bundle = self.fetcher.fetch_bytes(&bundle_url).await?;
        state = ResolveState::BundleFetched;
        trace_state(&locked, state);

        let manifest = extract_entry(&bundle, MANIFEST_ENTRY).map_err(|e| match e {
            RepoError::MalformedPackage { message } => RepoError::MalformedPackage {
                message: format!("{} ({}): {}", reference.name, bundle_url, message),
            },
            other => other,
        })?;

        let expected = record.digest.clone();
        if self.options.verify_digest {
            let actual = Digest::of(&manifest);
            if actual != expected {
                return Err(RepoError::IntegrityCheckFailed {
                    kind: reference.kind,
                    name: reference.name.clone(),
                    expected,
                    actual,
                });
            }
        }
        state = ResolveState::Verified;
        trace_state(&locked, state);

        Ok(Resolution {
            reference: locked,
            bundle: ResolvedBundle {
                manifest,
                digest: expected,
            },
        })
    }

    /// Resolve references one after another, stopping at the first failure
    pub async fn resolve_all(&self, references: &[DependencyReference]) -> Result<Vec<Resolution>> {
        let mut resolutions = Vec::with_capacity(references.len());
        for reference in references {
            resolutions.push(self.resolve(reference).await?);
        }
        Ok(resolutions)
    }
}

fn trace_state(reference: &DependencyReference, state: ResolveState) {
    tracing::debug!(
        kind = %reference.kind,
        name = %reference.name,
        version = %reference.version,
        source = %reference.source,
        "{}",
        state
    );
}
