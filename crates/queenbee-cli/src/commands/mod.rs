//! CLI commands

pub mod dep;
pub mod repo;
pub mod search;

use std::path::{Path, PathBuf};

use crate::error::Result;
use queenbee_repo::{CredentialStore, RegistryConfig, SourceFetcher};

/// Locations of the registry configuration and the credential store
pub struct ConfigPaths {
    pub registries: PathBuf,
    pub credentials: PathBuf,
}

impl ConfigPaths {
    /// Files under `config_dir`, or the per-user defaults
    pub fn new(config_dir: Option<&Path>) -> Result<Self> {
        match config_dir {
            Some(dir) => Ok(Self {
                registries: dir.join("registries.yaml"),
                credentials: dir.join("credentials.yaml"),
            }),
            None => Ok(Self {
                registries: RegistryConfig::default_path()?,
                credentials: CredentialStore::default_path()?,
            }),
        }
    }

    pub fn load_config(&self) -> Result<RegistryConfig> {
        if self.registries.exists() {
            Ok(RegistryConfig::load_from(&self.registries)?)
        } else {
            Ok(RegistryConfig::default())
        }
    }

    pub fn load_credentials(&self) -> Result<CredentialStore> {
        if self.credentials.exists() {
            Ok(CredentialStore::load_from(&self.credentials)?)
        } else {
            Ok(CredentialStore::default())
        }
    }

    /// Fetcher carrying the configured timeout and credentials
    pub fn fetcher(&self, config: &RegistryConfig) -> Result<SourceFetcher> {
        let credentials = self.load_credentials()?;
        Ok(SourceFetcher::from_config(config, &credentials)?)
    }
}
