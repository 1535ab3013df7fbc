//! Error types for registry operations

use queenbee_core::{CoreError, Digest, PackageKind};
use thiserror::Error;

/// Registry operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Lookup Errors ============
    #[error("No {kind} package with name {name} exists in this index")]
    PackageNotFound { kind: PackageKind, name: String },

    #[error("No {kind} package with name {name} and version {version} exists in this index")]
    VersionNotFound {
        kind: PackageKind,
        name: String,
        version: String,
    },

    #[error("No {kind} package with name {name} and digest {digest} exists in this index")]
    DigestNotFound {
        kind: PackageKind,
        name: String,
        digest: Digest,
    },

    // ============ Index Errors ============
    #[error("{kind} {name} already has a version {version} in the index")]
    Conflict {
        kind: PackageKind,
        name: String,
        version: String,
    },

    #[error("Invalid index at {location}: {message}")]
    InvalidIndex { location: String, message: String },

    // ============ Package Errors ============
    #[error(
        "Integrity check failed for {kind} {name}: resource.json digest differs from the index, expected {expected} and got {actual}"
    )]
    IntegrityCheckFailed {
        kind: PackageKind,
        name: String,
        expected: Digest,
        actual: Digest,
    },

    #[error("Malformed package: {message}")]
    MalformedPackage { message: String },

    // ============ Network Errors ============
    #[error("Source unreachable: {url} - {reason}")]
    SourceUnreachable { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthFailed { message: String },

    // ============ Configuration Errors ============
    #[error("Registry not found: {name}")]
    RegistryNotFound { name: String },

    #[error("Registry already exists: {name}")]
    RegistryAlreadyExists { name: String },

    #[error("Invalid registry URL: {url} - {reason}")]
    InvalidRegistryUrl { url: String, reason: String },

    #[error("Invalid registry configuration: {message}")]
    InvalidConfig { message: String },

    // ============ Other ============
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl RepoError {
    /// Any of the index lookup failures
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepoError::PackageNotFound { .. }
                | RepoError::VersionNotFound { .. }
                | RepoError::DigestNotFound { .. }
        )
    }

    pub(crate) fn unreachable(url: impl Into<String>, reason: impl ToString) -> Self {
        RepoError::SourceUnreachable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        RepoError::MalformedPackage {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();
        let reason = if e.is_timeout() {
            "request timed out".to_string()
        } else if e.is_connect() {
            format!("connection failed: {}", e)
        } else if let Some(status) = e.status() {
            format!("HTTP {}", status.as_u16())
        } else {
            e.to_string()
        };

        RepoError::SourceUnreachable { url, reason }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::InvalidRegistryUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}
