//! SHA-256 digests of package manifests
//!
//! Digests are always held as canonical lowercase hex so that publisher and
//! consumer compare the same text regardless of how the value was written.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

const HEX_LEN: usize = 64;

/// Canonical SHA-256 digest (64 lowercase hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    /// Compute the digest of raw bytes
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Digest(hex::encode(hasher.finalize()))
    }

    /// Parse a digest, accepting an optional `sha256:` prefix and any case
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let hex_part = trimmed
            .strip_prefix("sha256:")
            .or_else(|| trimmed.strip_prefix("SHA256:"))
            .unwrap_or(trimmed)
            .to_lowercase();

        if hex_part.len() != HEX_LEN {
            return Err(CoreError::InvalidDigest {
                value: value.to_string(),
                reason: format!("expected {} hex characters, got {}", HEX_LEN, hex_part.len()),
            });
        }
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidDigest {
                value: value.to_string(),
                reason: "contains non-hex characters".to_string(),
            });
        }

        Ok(Digest(hex_part))
    }

    /// Hex representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether `data` hashes to this digest
    pub fn verify(&self, data: &[u8]) -> bool {
        Digest::of(data) == *self
    }

    /// Short form for display (first 12 hex characters)
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Digest::parse(s)
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Digest::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_of_known_value() {
        let digest = Digest::of(b"hello world");
        assert_eq!(
            digest.as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(digest.short(), "b94d27b9934d");
    }

    #[test]
    fn test_parse_normalizes_case_and_prefix() {
        let lower = Digest::of(b"data");
        let upper = Digest::parse(&lower.as_str().to_uppercase()).unwrap();
        let prefixed = Digest::parse(&format!("sha256:{}", lower)).unwrap();

        assert_eq!(lower, upper);
        assert_eq!(lower, prefixed);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Digest::parse("stale").is_err());
        assert!(Digest::parse(&"z".repeat(64)).is_err());
        assert!(Digest::parse("").is_err());
    }

    #[test]
    fn test_verify() {
        let digest = Digest::of(b"payload");
        assert!(digest.verify(b"payload"));
        assert!(!digest.verify(b"tampered"));
    }

    #[test]
    fn test_serde_as_plain_string() {
        let digest = Digest::of(b"x");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest));

        let back: Digest = serde_json::from_str(&json.to_uppercase()).unwrap();
        assert_eq!(back, digest);

        assert!(serde_json::from_str::<Digest>("\"not-a-digest\"").is_err());
    }
}
