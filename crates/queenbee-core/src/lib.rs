//! Queenbee Core - Core types shared by the registry client and index tools
//!
//! This crate provides the foundational types used throughout Queenbee:
//! - `PackageKind`: The two publishable package kinds (operator, recipe)
//! - `Digest`: Canonical SHA-256 digest of a package manifest
//! - `DependencyReference`: A named, versioned pointer into a registry, optionally pinned to a digest
//! - `ResourceManifest`: The canonical manifest stored in every bundle
//! - `archive`: Bundle creation and entry extraction

pub mod archive;
pub mod dependency;
pub mod digest;
pub mod error;
pub mod kind;
pub mod manifest;

pub use archive::{MANIFEST_ENTRY, README_ENTRY, bundle_file_name, create_bundle, read_bundle_entry};
pub use dependency::{DependencyReference, INDEX_FILE, PinnedDigest, source_url};
pub use digest::Digest;
pub use error::{CoreError, Result};
pub use kind::PackageKind;
pub use manifest::{ManifestMetadata, ResourceManifest};
