//! Index persistence, directory scanning, merging and publishing
//!
//! A registry folder looks like:
//!
//! ```text
//! registry/
//! ├── index.json
//! ├── operators/
//! │   └── honeybee-radiance-1.2.3.tgz
//! └── recipes/
//!     └── daylight-factor-0.2.0.tgz
//! ```
//!
//! Every mutation here is read-modify-write on `index.json` without any
//! locking. Two concurrent writers against the same folder race and the last
//! one wins, so a registry folder must only have one writer at a time.

use chrono::{DateTime, Utc};
use queenbee_core::{
    Digest, INDEX_FILE, MANIFEST_ENTRY, PackageKind, ResourceManifest, bundle_file_name,
    create_bundle, read_bundle_entry,
};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{RepoError, Result};
use crate::index::{PackageIndex, PackageRecord};

/// Load an index document from disk
pub fn load_index(path: &Path) -> Result<PackageIndex> {
    let bytes = std::fs::read(path)?;
    PackageIndex::from_json_bytes(&bytes, &path.display().to_string())
}

/// Write an index document, replacing the file only once the write succeeded
pub fn save_index(index: &PackageIndex, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, index.to_json_pretty()?)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Derive an index record from an already-packaged bundle
///
/// The record URL is `{kind dir}/{file name}`, relative to the registry root.
pub fn record_from_bundle(kind: PackageKind, path: &Path) -> Result<PackageRecord> {
    let bytes = std::fs::read(path)?;

    let manifest_bytes = read_bundle_entry(&bytes, MANIFEST_ENTRY)
        .map_err(|e| RepoError::malformed(format!("{}: {}", path.display(), e)))?
        .ok_or_else(|| {
            RepoError::malformed(format!(
                "{} does not contain a {} file",
                path.display(),
                MANIFEST_ENTRY
            ))
        })?;

    let manifest = ResourceManifest::from_json_bytes(&manifest_bytes)
        .map_err(|e| RepoError::malformed(format!("{}: {}", path.display(), e)))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| RepoError::malformed(format!("{} has no file name", path.display())))?;

    let created = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);

    let metadata = manifest.metadata();
    Ok(PackageRecord {
        name: metadata.name.clone(),
        version: metadata.tag.clone(),
        digest: Digest::of(&manifest_bytes),
        url: format!("{}/{}", kind.directory(), file_name),
        description: metadata.description.clone(),
        keywords: metadata.keywords.clone(),
        created,
    })
}

/// Derive records for every bundle under the per-kind subdirectories of `path`
///
/// Bundles are visited in file-name order; a missing subdirectory is empty.
fn scan_directory(path: &Path) -> Result<Vec<(PackageKind, PackageRecord)>> {
    if !path.is_dir() {
        return Err(RepoError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("registry folder not found: {}", path.display()),
        )));
    }

    let mut records = Vec::new();

    for kind in PackageKind::ALL {
        let dir = path.join(kind.directory());
        if !dir.is_dir() {
            tracing::debug!("No {} directory under {}", kind.directory(), path.display());
            continue;
        }

        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            tracing::debug!("Indexing {} bundle {}", kind, entry.path().display());
            records.push((kind, record_from_bundle(kind, entry.path())?));
        }
    }

    Ok(records)
}

/// Build a fresh index from a folder of packaged bundles
pub fn build_from_directory(path: &Path) -> Result<PackageIndex> {
    let mut index = PackageIndex::new();
    for (kind, record) in scan_directory(path)? {
        index.insert(kind, record, false)?;
    }
    Ok(index)
}

/// Where merged records come from
#[derive(Debug, Clone)]
pub enum MergeSource {
    /// A registry folder of packaged bundles
    Directory(PathBuf),
    /// Another index
    Index(PackageIndex),
}

/// How to treat records whose version is already indexed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Replace already indexed versions
    pub overwrite: bool,
    /// Skip conflicting records instead of aborting
    pub skip_on_conflict: bool,
}

impl MergeOptions {
    /// Any conflict aborts the merge
    pub fn strict() -> Self {
        Self::default()
    }

    /// Conflicting records are skipped, everything else lands
    pub fn best_effort() -> Self {
        Self {
            overwrite: false,
            skip_on_conflict: true,
        }
    }
}

/// Record skipped because its version was already indexed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub kind: PackageKind,
    pub name: String,
    pub version: String,
}

/// Outcome of a merge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub skipped: Vec<SkippedRecord>,
}

/// Merge every record from `source` into `target`
///
/// A conflict aborts the merge unless `skip_on_conflict` is set. An aborted
/// merge leaves `target` unchanged.
pub fn merge_into(
    target: &mut PackageIndex,
    source: MergeSource,
    options: MergeOptions,
) -> Result<MergeReport> {
    let records = match source {
        MergeSource::Directory(path) => scan_directory(&path)?,
        MergeSource::Index(index) => index.records().map(|(k, r)| (k, r.clone())).collect(),
    };

    let mut working = target.clone();
    let mut report = MergeReport::default();

    for (kind, record) in records {
        match working.insert(kind, record, options.overwrite) {
            Ok(()) => report.added += 1,
            Err(RepoError::Conflict {
                kind,
                name,
                version,
            }) if options.skip_on_conflict => {
                tracing::warn!("Skipping {} {} {}: version already indexed", kind, name, version);
                report.skipped.push(SkippedRecord {
                    kind,
                    name,
                    version,
                });
            }
            Err(e) => return Err(e),
        }
    }

    *target = working;
    Ok(report)
}

/// A registry folder with its `index.json`
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the index document
    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn load(&self) -> Result<PackageIndex> {
        load_index(&self.index_path())
    }

    /// Load the index, or start an empty one if the folder has none yet
    pub fn load_or_default(&self) -> Result<PackageIndex> {
        let path = self.index_path();
        if path.exists() {
            load_index(&path)
        } else {
            Ok(PackageIndex::new())
        }
    }

    pub fn save(&self, index: &PackageIndex) -> Result<()> {
        save_index(index, &self.index_path())
    }

    /// Rebuild the index from the bundles in this folder and persist it
    pub fn rebuild(&self) -> Result<PackageIndex> {
        let index = build_from_directory(&self.root)?;
        self.save(&index)?;
        tracing::info!("Indexed {} packages in {}", index.len(), self.root.display());
        Ok(index)
    }

    /// Merge `source` into this folder's index and persist it
    ///
    /// Nothing is written when the merge aborts.
    pub fn merge(&self, source: MergeSource, options: MergeOptions) -> Result<MergeReport> {
        let mut index = self.load_or_default()?;
        let report = merge_into(&mut index, source, options)?;
        self.save(&index)?;
        tracing::info!(
            "Merged {} records into {} ({} skipped)",
            report.added,
            self.index_path().display(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Package a resource into this registry and add it to the index
    ///
    /// The bundle is written to `{kind dir}/{name}-{tag}.tgz`. On conflict
    /// neither the bundle nor the index is touched.
    pub fn publish(
        &self,
        kind: PackageKind,
        manifest: &ResourceManifest,
        readme: Option<&Path>,
        overwrite: bool,
    ) -> Result<PackageRecord> {
        let mut index = self.load_or_default()?;

        let readme = readme.map(std::fs::read).transpose()?;
        let bundle = create_bundle(manifest, readme.as_deref())?;
        let file_name = bundle_file_name(manifest.name(), manifest.tag());

        let metadata = manifest.metadata();
        let record = PackageRecord {
            name: metadata.name.clone(),
            version: metadata.tag.clone(),
            digest: manifest.digest()?,
            url: format!("{}/{}", kind.directory(), file_name),
            description: metadata.description.clone(),
            keywords: metadata.keywords.clone(),
            created: Some(Utc::now()),
        };

        index.insert(kind, record.clone(), overwrite)?;

        // The bundle only replaces an existing one after the index is saved
        let bundle_dir = self.root.join(kind.directory());
        std::fs::create_dir_all(&bundle_dir)?;
        let bundle_path = bundle_dir.join(&file_name);
        let staged_path = bundle_dir.join(format!("{}.tmp", file_name));
        std::fs::write(&staged_path, bundle)?;

        if let Err(e) = self.save(&index) {
            let _ = std::fs::remove_file(&staged_path);
            return Err(e);
        }
        std::fs::rename(&staged_path, &bundle_path)?;

        tracing::info!("Published {} {} {}", kind, record.name, record.version);
        Ok(record)
    }
}
