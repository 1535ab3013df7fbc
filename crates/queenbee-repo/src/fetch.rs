//! Retrieval of index documents and bundles
//!
//! `file:` URLs are read from the local filesystem, relative paths being
//! resolved against a base directory (the working directory by default).
//! Every other URL is fetched over HTTP(S).

use async_trait::async_trait;
use queenbee_core::read_bundle_entry;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::RegistryConfig;
use crate::credentials::{CredentialStore, ScopedCredentials};
use crate::error::{RepoError, Result};
use crate::http::SecureHttpClient;

/// Byte retrieval by URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the full content behind `url`
    ///
    /// Fails with `SourceUnreachable` on any I/O or transport error. No retry
    /// is attempted.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetcher for `file:` and HTTP(S) registry sources
pub struct SourceFetcher {
    client: SecureHttpClient,
    base_dir: PathBuf,
}

impl SourceFetcher {
    /// Create a fetcher resolving relative `file:` paths against the working directory
    pub fn new(client: SecureHttpClient) -> Result<Self> {
        let base_dir = std::env::current_dir()?;
        Ok(Self { client, base_dir })
    }

    /// Public fetcher with the given request timeout
    pub fn public(timeout: Duration) -> Result<Self> {
        Self::new(SecureHttpClient::public(timeout)?)
    }

    /// Fetcher carrying credentials for every configured registry that has them
    pub fn from_config(config: &RegistryConfig, store: &CredentialStore) -> Result<Self> {
        let mut scoped = ScopedCredentials::default();
        for registry in &config.registries {
            let Some(creds) = store.get(registry.credential_key()) else {
                continue;
            };
            match creds.resolve() {
                Ok(resolved) => scoped.add(&registry.url, resolved),
                Err(e) => tracing::warn!("Ignoring credentials of {}: {}", registry.name, e),
            }
        }
        Self::new(SecureHttpClient::new(scoped, config.timeout)?)
    }

    /// Resolve relative `file:` paths against `base_dir`
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Local path for a `file:` URL
    pub fn local_path(&self, url: &str) -> Option<PathBuf> {
        let rest = url.strip_prefix("file:")?;
        let path = Path::new(rest);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            Some(self.base_dir.join(path))
        }
    }
}

#[async_trait]
impl Fetcher for SourceFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        match self.local_path(url) {
            Some(path) => {
                tracing::debug!("Reading {}", path.display());
                tokio::fs::read(&path)
                    .await
                    .map_err(|e| RepoError::unreachable(url, e))
            }
            None => {
                tracing::debug!("Downloading {}", url);
                self.client.get_bytes(url).await
            }
        }
    }
}

/// Read one entry from bundle bytes
///
/// Fails with `MalformedPackage` if the archive cannot be read or has no
/// such entry.
pub fn extract_entry(tar_bytes: &[u8], entry_name: &str) -> Result<Vec<u8>> {
    read_bundle_entry(tar_bytes, entry_name)
        .map_err(|e| RepoError::malformed(format!("unreadable package archive: {}", e)))?
        .ok_or_else(|| {
            RepoError::malformed(format!(
                "package archive did not contain a {} file",
                entry_name
            ))
        })
}
