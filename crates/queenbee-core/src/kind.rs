//! Package kinds published to a registry

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Kind of a publishable package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// Reusable functions and their runtime environment
    Operator,
    /// Workflow template built from operators and other recipes
    Recipe,
}

impl PackageKind {
    /// All kinds, in the order registries are scanned
    pub const ALL: [PackageKind; 2] = [PackageKind::Operator, PackageKind::Recipe];

    /// Lowercase name used in index documents and dependency references
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageKind::Operator => "operator",
            PackageKind::Recipe => "recipe",
        }
    }

    /// Subdirectory of a registry folder holding bundles of this kind
    pub fn directory(&self) -> &'static str {
        match self {
            PackageKind::Operator => "operators",
            PackageKind::Recipe => "recipes",
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "operator" | "operators" => Ok(PackageKind::Operator),
            "recipe" | "recipes" => Ok(PackageKind::Recipe),
            _ => Err(CoreError::InvalidKind {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!("operator".parse::<PackageKind>().unwrap(), PackageKind::Operator);
        assert_eq!("Recipe".parse::<PackageKind>().unwrap(), PackageKind::Recipe);
        assert_eq!("recipes".parse::<PackageKind>().unwrap(), PackageKind::Recipe);
        assert!("workflow".parse::<PackageKind>().is_err());
    }

    #[test]
    fn test_directory_names() {
        assert_eq!(PackageKind::Operator.directory(), "operators");
        assert_eq!(PackageKind::Recipe.directory(), "recipes");
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&PackageKind::Recipe).unwrap();
        assert_eq!(json, "\"recipe\"");
        let kind: PackageKind = serde_json::from_str("\"operator\"").unwrap();
        assert_eq!(kind, PackageKind::Operator);
    }
}
