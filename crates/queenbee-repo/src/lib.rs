//! Queenbee Registry Management
//!
//! This crate manages Queenbee package registries:
//!
//! - **Index documents**: `index.json` listing every operator and recipe version
//! - **Registry folders**: build, merge and publish into a local registry
//! - **Dependency resolution**: locate, fetch and verify packages from `file:`
//!   or HTTP(S) registries
//!
//! ## Key Features
//!
//! - **Content digests**: every record carries the SHA-256 of its `resource.json`
//! - **Lock tolerance**: a pinned digest that disappeared falls back to the version
//! - **Secure credentials**: scoped credentials with redirect protection
//!
//! ## Example
//!
//! ```rust,no_run
//! use queenbee_core::{DependencyReference, PackageKind};
//! use queenbee_repo::{DependencyResolver, SourceFetcher};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = SourceFetcher::public(Duration::from_secs(30))?;
//! let resolver = DependencyResolver::new(fetcher);
//!
//! let dep = DependencyReference::new(
//!     PackageKind::Recipe,
//!     "daylight-factor",
//!     "0.2.0",
//!     "https://registry.example.com/ladybug-tools",
//! );
//! let resolution = resolver.resolve(&dep).await?;
//! println!("locked to {:?}", resolution.reference.digest);
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Notes
//!
//! - Credentials are NEVER sent after cross-origin redirects
//! - Manifests are verified against the index digest by default

pub mod config;
pub mod credentials;
pub mod error;
pub mod fetch;
pub mod http;
pub mod index;
pub mod resolver;
pub mod store;

// Re-exports for convenience
pub use config::{Registry, RegistryConfig, RegistryScheme};
pub use credentials::{CredentialStore, Credentials, ResolvedCredentials, ScopedCredentials};
pub use error::{RepoError, Result};
pub use fetch::{Fetcher, SourceFetcher, extract_entry};
pub use http::SecureHttpClient;
pub use index::{Catalog, PackageIndex, PackageRecord};
pub use resolver::{
    DependencyResolver, Resolution, ResolveOptions, ResolveState, ResolvedBundle,
};
pub use store::{
    IndexStore, MergeOptions, MergeReport, MergeSource, SkippedRecord, build_from_directory,
    load_index, merge_into, record_from_bundle, save_index,
};
