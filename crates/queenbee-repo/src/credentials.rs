//! Registry credentials
//!
//! Credentials live in `~/.config/queenbee/credentials.yaml`, keyed by the
//! registry's credential name, separate from `registries.yaml` so the config
//! file can be shared. At fetch time they are scoped to the registry URL and
//! only ever attached to requests under that URL.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{RepoError, Result};

/// Stored credentials for one registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credentials {
    /// Username and password
    Basic { username: String, password: String },

    /// API token
    Bearer { token: String },

    /// Username and password read from environment variables at fetch time
    Env {
        username_var: String,
        password_var: String,
    },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer {
            token: token.into(),
        }
    }

    pub fn from_env(username_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Credentials::Env {
            username_var: username_var.into(),
            password_var: password_var.into(),
        }
    }

    /// Turn stored credentials into header-ready values
    ///
    /// Fails with `AuthFailed` when an `Env` variable is unset.
    pub fn resolve(&self) -> Result<ResolvedCredentials> {
        let resolved = match self {
            Credentials::Basic { username, password } => ResolvedCredentials::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            Credentials::Bearer { token } => ResolvedCredentials::Bearer {
                token: token.clone(),
            },
            Credentials::Env {
                username_var,
                password_var,
            } => ResolvedCredentials::Basic {
                username: read_env(username_var)?,
                password: read_env(password_var)?,
            },
        };
        Ok(resolved)
    }
}

fn read_env(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| RepoError::AuthFailed {
        message: format!("environment variable {} is not set", var),
    })
}

/// Credentials with every value known
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCredentials {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl ResolvedCredentials {
    /// `Authorization` header value
    pub fn auth_header(&self) -> String {
        use base64::Engine;

        match self {
            ResolvedCredentials::Basic { username, password } => {
                let pair = format!("{}:{}", username, password);
                format!(
                    "Basic {}",
                    base64::engine::general_purpose::STANDARD.encode(pair)
                )
            }
            ResolvedCredentials::Bearer { token } => format!("Bearer {}", token),
        }
    }
}

/// `credentials.yaml`: credentials by registry credential name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialStore {
    #[serde(default)]
    credentials: BTreeMap<String, Credentials>,
}

impl CredentialStore {
    /// Load from the default location, empty if the file does not exist
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    /// Write the store, readable by the owner only on unix
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path)?;
        std::io::Write::write_all(&mut file, content.as_bytes())?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("queenbee").join("credentials.yaml"))
    }

    pub fn set(&mut self, key: &str, credentials: Credentials) {
        self.credentials.insert(key.to_string(), credentials);
    }

    pub fn get(&self, key: &str) -> Option<&Credentials> {
        self.credentials.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Credentials> {
        self.credentials.remove(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.credentials.contains_key(key)
    }
}

/// Credentials bound to registry root URLs
///
/// A request only carries credentials whose registry root is a path prefix of
/// the request URL; when several match, the longest root wins.
#[derive(Debug, Clone, Default)]
pub struct ScopedCredentials {
    scopes: Vec<(String, ResolvedCredentials)>,
}

impl ScopedCredentials {
    /// Bind credentials to a registry root
    pub fn add(&mut self, registry_url: &str, credentials: ResolvedCredentials) {
        let root = registry_url.trim_end_matches('/').to_string();
        self.scopes.retain(|(existing, _)| existing != &root);
        self.scopes.push((root, credentials));
    }

    /// Credentials to attach to a request for `url`
    pub fn for_url(&self, url: &str) -> Option<&ResolvedCredentials> {
        self.scopes
            .iter()
            .filter(|(root, _)| in_scope(root, url))
            .max_by_key(|(root, _)| root.len())
            .map(|(_, creds)| creds)
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Same scheme, host and port
    pub fn same_origin(a: &str, b: &str) -> bool {
        match (Url::parse(a), Url::parse(b)) {
            (Ok(a), Ok(b)) => a.origin() == b.origin(),
            _ => false,
        }
    }
}

/// `url` is `root` itself or lies under it at a path boundary
fn in_scope(root: &str, url: &str) -> bool {
    match url.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bearer(token: &str) -> ResolvedCredentials {
        ResolvedCredentials::Bearer {
            token: token.to_string(),
        }
    }

    #[test]
    fn test_same_origin() {
        assert!(ScopedCredentials::same_origin(
            "https://registry.example.com/ladybug/index.json",
            "https://registry.example.com/other/index.json"
        ));
        assert!(ScopedCredentials::same_origin(
            "https://registry.example.com:443/a",
            "https://registry.example.com/b"
        ));
        assert!(!ScopedCredentials::same_origin(
            "https://registry.example.com/a",
            "https://cdn.example.com/a"
        ));
        assert!(!ScopedCredentials::same_origin(
            "https://registry.example.com/a",
            "http://registry.example.com/a"
        ));
    }

    #[test]
    fn test_scope_matching() {
        let mut scoped = ScopedCredentials::default();
        scoped.add("https://registry.example.com/ladybug/", bearer("team"));
        scoped.add("https://registry.example.com/ladybug/private", bearer("private"));

        assert_eq!(
            scoped.for_url("https://registry.example.com/ladybug/index.json"),
            Some(&bearer("team"))
        );
        assert_eq!(
            scoped.for_url("https://registry.example.com/ladybug/private/index.json"),
            Some(&bearer("private"))
        );
        // Path boundary: a sibling with a shared prefix is out of scope
        assert!(scoped
            .for_url("https://registry.example.com/ladybug-tools/index.json")
            .is_none());
        assert!(scoped.for_url("https://other.example.com/index.json").is_none());

        scoped.add("https://registry.example.com/ladybug", bearer("rotated"));
        assert_eq!(
            scoped.for_url("https://registry.example.com/ladybug/index.json"),
            Some(&bearer("rotated"))
        );
    }

    #[test]
    fn test_auth_header() {
        let basic = Credentials::basic("user", "pass").resolve().unwrap();
        assert_eq!(basic.auth_header(), "Basic dXNlcjpwYXNz");

        let token = Credentials::bearer("tok").resolve().unwrap();
        assert_eq!(token.auth_header(), "Bearer tok");
    }

    #[test]
    fn test_env_credentials() {
        // SAFETY: variable names are unique to this test
        unsafe {
            std::env::set_var("QUEENBEE_TEST_USER_VAR", "ci-user");
            std::env::set_var("QUEENBEE_TEST_PASS_VAR", "ci-pass");
        }

        let resolved = Credentials::from_env("QUEENBEE_TEST_USER_VAR", "QUEENBEE_TEST_PASS_VAR")
            .resolve()
            .unwrap();
        assert_eq!(
            resolved,
            ResolvedCredentials::Basic {
                username: "ci-user".to_string(),
                password: "ci-pass".to_string(),
            }
        );

        let missing = Credentials::from_env("QUEENBEE_TEST_MISSING_A", "QUEENBEE_TEST_MISSING_B");
        assert!(matches!(missing.resolve(), Err(RepoError::AuthFailed { .. })));

        // SAFETY: variable names are unique to this test
        unsafe {
            std::env::remove_var("QUEENBEE_TEST_USER_VAR");
            std::env::remove_var("QUEENBEE_TEST_PASS_VAR");
        }
    }

    #[test]
    fn test_credential_store_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("queenbee").join("credentials.yaml");

        let mut store = CredentialStore::default();
        store.set("ladybug", Credentials::basic("user", "pass"));
        store.set("ci", Credentials::from_env("CI_USER", "CI_PASS"));
        store.save_to(&path).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("type: env"));

        let mut loaded = CredentialStore::load_from(&path).unwrap();
        assert_eq!(loaded.get("ladybug"), Some(&Credentials::basic("user", "pass")));
        assert!(loaded.remove("ladybug").is_some());
        assert!(!loaded.has("ladybug"));
        assert!(loaded.has("ci"));
    }
}
