//! Registry configuration management
//!
//! Stores named registries in `~/.config/queenbee/registries.yaml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RepoError, Result};

/// Registry configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Timeout applied to every HTTP request
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Configured registries
    #[serde(default)]
    pub registries: Vec<Registry>,
}

fn default_api_version() -> String {
    "queenbee.io/v1".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            timeout: default_timeout(),
            registries: Vec::new(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to default location
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("queenbee").join("registries.yaml"))
    }

    /// Get a registry by name
    pub fn get(&self, name: &str) -> Option<&Registry> {
        self.registries.iter().find(|r| r.name == name)
    }

    /// Add a registry
    pub fn add(&mut self, registry: Registry) -> Result<()> {
        if self.get(&registry.name).is_some() {
            return Err(RepoError::RegistryAlreadyExists {
                name: registry.name.clone(),
            });
        }
        self.registries.push(registry);
        Ok(())
    }

    /// Remove a registry by name
    pub fn remove(&mut self, name: &str) -> Result<Registry> {
        let idx = self
            .registries
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| RepoError::RegistryNotFound {
                name: name.to_string(),
            })?;
        Ok(self.registries.remove(idx))
    }

    /// Turn a registry name or URL into a source URL
    ///
    /// URLs are returned unchanged; anything else must be a configured name.
    pub fn resolve_source(&self, name_or_url: &str) -> Result<String> {
        if RegistryScheme::detect(name_or_url).is_ok() {
            return Ok(name_or_url.to_string());
        }
        self.get(name_or_url)
            .map(|r| r.url.clone())
            .ok_or_else(|| RepoError::RegistryNotFound {
                name: name_or_url.to_string(),
            })
    }
}

/// Registry definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    /// Unique name for this registry
    pub name: String,

    /// Registry root URL (`file:` or HTTP(S))
    pub url: String,

    /// Credential reference name (stored separately)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<String>,
}

impl Registry {
    /// Create a new registry entry, validating the URL scheme
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        RegistryScheme::detect(&url)?;

        Ok(Self {
            name: name.into(),
            url,
            credential_ref: None,
        })
    }

    /// Name under which credentials for this registry are stored
    pub fn credential_key(&self) -> &str {
        self.credential_ref.as_deref().unwrap_or(&self.name)
    }

    pub fn scheme(&self) -> RegistryScheme {
        RegistryScheme::detect(&self.url).unwrap_or(RegistryScheme::Http)
    }
}

/// How a registry root is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryScheme {
    /// Local folder, relative to the working directory
    File,
    /// HTTP(S) server
    Http,
}

impl RegistryScheme {
    /// Detect the scheme from a URL
    pub fn detect(url: &str) -> Result<Self> {
        if url.starts_with("file:") {
            Ok(RegistryScheme::File)
        } else if url.starts_with("http://") || url.starts_with("https://") {
            Ok(RegistryScheme::Http)
        } else {
            Err(RepoError::InvalidRegistryUrl {
                url: url.to_string(),
                reason: "URL must start with http://, https:// or file:".to_string(),
            })
        }
    }
}
