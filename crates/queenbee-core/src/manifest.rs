//! Canonical resource manifest
//!
//! The operator/recipe schema itself belongs to the domain model. The registry
//! only needs the identifying metadata and a stable byte form to digest, so the
//! manifest is carried as a JSON value.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::digest::Digest;
use crate::error::{CoreError, Result};

/// Identifying metadata read from `metadata` in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    /// Package version (`tag` in manifests, `version` accepted too)
    #[serde(alias = "version")]
    pub tag: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A resource manifest and its identifying metadata
#[derive(Debug, Clone)]
pub struct ResourceManifest {
    value: Value,
    metadata: ManifestMetadata,
}

impl ResourceManifest {
    /// Build from a parsed JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(CoreError::InvalidManifest {
                message: "manifest must be an object".to_string(),
            });
        }

        let raw_metadata = value.get("metadata").ok_or_else(|| CoreError::InvalidManifest {
            message: "missing 'metadata' section".to_string(),
        })?;

        let metadata: ManifestMetadata =
            serde_json::from_value(raw_metadata.clone()).map_err(|e| CoreError::InvalidManifest {
                message: format!("invalid metadata: {}", e),
            })?;

        if metadata.name.trim().is_empty() {
            return Err(CoreError::InvalidManifest {
                message: "metadata.name must not be empty".to_string(),
            });
        }
        if metadata.tag.trim().is_empty() {
            return Err(CoreError::InvalidManifest {
                message: "metadata.tag must not be empty".to_string(),
            });
        }

        Ok(Self { value, metadata })
    }

    /// Parse JSON bytes (e.g. a `resource.json` bundle entry)
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => {
                let text = String::from_utf8(content).map_err(|e| CoreError::InvalidManifest {
                    message: format!("invalid UTF-8 in {}: {}", path.display(), e),
                })?;
                Self::from_yaml_str(&text)
            }
            _ => Self::from_json_bytes(&content),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn tag(&self) -> &str {
        &self.metadata.tag
    }

    pub fn metadata(&self) -> &ManifestMetadata {
        &self.metadata
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Bytes stored as `resource.json`: compact JSON with sorted object keys
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.value)?)
    }

    /// Digest of the canonical bytes
    pub fn digest(&self) -> Result<Digest> {
        Ok(Digest::of(&self.canonical_bytes()?))
    }
}
