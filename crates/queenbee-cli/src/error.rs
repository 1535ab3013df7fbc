//! CLI error types with exit code handling
//!
//! Library errors are folded into a small set of categories, each with a
//! stable exit code.

use miette::Diagnostic;
use queenbee_core::CoreError;
use queenbee_repo::RepoError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Package, version or digest missing from an index
    #[error("{message}")]
    #[diagnostic(code(queenbee::cli::not_found))]
    NotFound {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Version already indexed
    #[error("{message}")]
    #[diagnostic(
        code(queenbee::cli::conflict),
        help("Pass --overwrite to replace it, or --skip when merging")
    )]
    Conflict { message: String },

    /// Manifest digest mismatch
    #[error("{message}")]
    #[diagnostic(code(queenbee::cli::integrity))]
    Integrity { message: String },

    /// Unreadable package bundle
    #[error("{message}")]
    #[diagnostic(code(queenbee::cli::package))]
    Package { message: String },

    /// Registry source could not be read
    #[error("{message}")]
    #[diagnostic(code(queenbee::cli::unreachable))]
    Unreachable { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(queenbee::cli::io))]
    Io { message: String },

    /// Invalid user input
    #[error("{message}")]
    #[diagnostic(code(queenbee::cli::input))]
    Input {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Anything else
    #[error("{message}")]
    #[diagnostic(code(queenbee::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Conflict { .. } => exit_codes::CONFLICT,
            CliError::Integrity { .. } => exit_codes::INTEGRITY_ERROR,
            CliError::Package { .. } => exit_codes::PACKAGE_ERROR,
            CliError::Unreachable { .. } => exit_codes::UNREACHABLE,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Input { .. } => exit_codes::USAGE_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create an input error (user provided invalid input)
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: None,
        }
    }

    /// Create an input error with help text
    pub fn input_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        let message = err.to_string();
        match err {
            RepoError::PackageNotFound { .. }
            | RepoError::VersionNotFound { .. }
            | RepoError::DigestNotFound { .. } => CliError::NotFound {
                message,
                help: Some("Run 'queenbee search <source> <name>' to list what is published".into()),
            },
            RepoError::RegistryNotFound { .. } => CliError::NotFound {
                message,
                help: Some("Run 'queenbee repo list' to see configured registries".into()),
            },
            RepoError::Conflict { .. } => CliError::Conflict { message },
            RepoError::IntegrityCheckFailed { .. } => CliError::Integrity { message },
            RepoError::MalformedPackage { .. } => CliError::Package { message },
            RepoError::SourceUnreachable { .. } | RepoError::AuthFailed { .. } => {
                CliError::Unreachable { message }
            }
            RepoError::Io(e) => CliError::from(e),
            RepoError::Core(core) => CliError::from(core),
            RepoError::InvalidIndex { .. }
            | RepoError::InvalidRegistryUrl { .. }
            | RepoError::RegistryAlreadyExists { .. }
            | RepoError::InvalidConfig { .. }
            | RepoError::Serialization(_) => CliError::input(message),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Io(e) => CliError::from(e),
            CoreError::Archive { .. } => CliError::Package { message },
            _ => CliError::input(message),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use queenbee_core::{Digest, PackageKind};

    #[test]
    fn test_exit_codes() {
        let cases = [
            (
                RepoError::VersionNotFound {
                    kind: PackageKind::Recipe,
                    name: "daylight-factor".into(),
                    version: "9.9.9".into(),
                },
                exit_codes::NOT_FOUND,
            ),
            (
                RepoError::Conflict {
                    kind: PackageKind::Operator,
                    name: "honeybee-radiance".into(),
                    version: "1.0.0".into(),
                },
                exit_codes::CONFLICT,
            ),
            (
                RepoError::IntegrityCheckFailed {
                    kind: PackageKind::Recipe,
                    name: "daylight-factor".into(),
                    expected: Digest::of(b"a"),
                    actual: Digest::of(b"b"),
                },
                exit_codes::INTEGRITY_ERROR,
            ),
            (
                RepoError::MalformedPackage {
                    message: "no resource.json".into(),
                },
                exit_codes::PACKAGE_ERROR,
            ),
            (
                RepoError::SourceUnreachable {
                    url: "file:nowhere/index.json".into(),
                    reason: "not found".into(),
                },
                exit_codes::UNREACHABLE,
            ),
            (
                RepoError::Io(std::io::Error::other("disk full")),
                exit_codes::IO_ERROR,
            ),
            (
                RepoError::Core(CoreError::InvalidKind {
                    value: "workflow".into(),
                }),
                exit_codes::USAGE_ERROR,
            ),
        ];

        for (err, code) in cases {
            assert_eq!(CliError::from(err).exit_code(), code);
        }
    }
}
