//! Bundle creation and extraction
//!
//! A bundle is a tar archive holding the canonical manifest as
//! `resource.json` plus supporting files. Bundles written here are
//! gzip-compressed; readers accept both compressed and plain tar bytes.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Cursor, Read, Write};
use tar::{Archive, Builder, Header};

use crate::error::{CoreError, Result};
use crate::manifest::ResourceManifest;

/// Archive entry holding the canonical manifest
pub const MANIFEST_ENTRY: &str = "resource.json";

/// Optional archive entry holding the package readme
pub const README_ENTRY: &str = "README.md";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Create a gzip-compressed bundle for a manifest
///
/// The archive contains:
/// - resource.json (canonical manifest bytes)
/// - README.md (if provided)
pub fn create_bundle(manifest: &ResourceManifest, readme: Option<&[u8]>) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);

    add_bytes_to_archive(&mut builder, MANIFEST_ENTRY, &manifest.canonical_bytes()?)?;

    if let Some(readme) = readme {
        add_bytes_to_archive(&mut builder, README_ENTRY, readme)?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Read a single entry from bundle bytes
///
/// Returns `Ok(None)` when the archive is readable but has no such entry.
pub fn read_bundle_entry(bytes: &[u8], entry_name: &str) -> Result<Option<Vec<u8>>> {
    if bytes.starts_with(&GZIP_MAGIC) {
        find_entry(Archive::new(GzDecoder::new(Cursor::new(bytes))), entry_name)
    } else {
        find_entry(Archive::new(Cursor::new(bytes)), entry_name)
    }
}

fn find_entry<R: Read>(mut archive: Archive<R>, entry_name: &str) -> Result<Option<Vec<u8>>> {
    let entries = archive.entries().map_err(archive_error)?;

    for entry in entries {
        let mut entry = entry.map_err(archive_error)?;
        let matches = {
            let path = entry.path().map_err(archive_error)?;
            path.to_string_lossy().trim_start_matches("./") == entry_name
        };

        if matches {
            let mut content = Vec::new();
            entry.read_to_end(&mut content).map_err(archive_error)?;
            return Ok(Some(content));
        }
    }

    Ok(None)
}

fn archive_error(e: std::io::Error) -> CoreError {
    CoreError::Archive {
        message: e.to_string(),
    }
}

/// Add bytes to a tar archive with a given path
fn add_bytes_to_archive<W: Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    content: &[u8],
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0); // Reproducible bundles: use epoch time
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content)?;

    Ok(())
}

/// Default bundle file name for a package version
#[must_use]
pub fn bundle_file_name(name: &str, version: &str) -> String {
    format!("{}-{}.tgz", name, version)
}
