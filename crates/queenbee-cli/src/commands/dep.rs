//! Dependency management commands

use console::style;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use super::ConfigPaths;
use crate::error::{CliError, Result};
use queenbee_core::{DependencyReference, MANIFEST_ENTRY};
use queenbee_repo::{DependencyResolver, ResolveOptions};

/// Dependency file: a `dependencies` list plus any other keys, kept as is
#[derive(Debug, Serialize, Deserialize)]
struct DependencyFile {
    #[serde(default)]
    dependencies: Vec<DependencyReference>,

    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

impl DependencyFile {
    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| {
            CliError::input(format!("Invalid dependency file {}: {}", path.display(), e))
        })
    }

    fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|e| CliError::Other {
            message: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// A single path component under the output folder
fn is_folder_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !Path::new(name).is_absolute()
}

/// Resolve every dependency, write the manifests and lock the file
pub async fn fetch(paths: &ConfigPaths, file: &Path, output: &Path, verify: bool) -> Result<()> {
    let mut deps = DependencyFile::load(file)?;

    if deps.dependencies.is_empty() {
        println!("No dependencies defined in {}", file.display());
        return Ok(());
    }

    let mut seen = HashSet::new();
    for dep in &deps.dependencies {
        if !is_folder_name(dep.ref_name()) {
            return Err(CliError::input_with_help(
                format!("Dependency name '{}' cannot be used as a folder name", dep.ref_name()),
                "Names and aliases must not contain path separators or be '.' or '..'",
            ));
        }
        if !seen.insert(dep.ref_name()) {
            return Err(CliError::input_with_help(
                format!("Dependency name '{}' is used more than once", dep.ref_name()),
                "Give one of them an alias",
            ));
        }
    }

    tracing::debug!(
        "Resolving {} dependencies from {}",
        deps.dependencies.len(),
        file.display()
    );
    let config = paths.load_config()?;
    let resolver = DependencyResolver::new(paths.fetcher(&config)?).with_options(ResolveOptions {
        verify_digest: verify,
    });

    let resolutions = resolver.resolve_all(&deps.dependencies).await?;

    let mut relocked = 0;
    for (dep, resolution) in deps.dependencies.iter_mut().zip(resolutions) {
        let target = output.join(dep.ref_name());
        std::fs::create_dir_all(&target)?;
        std::fs::write(target.join(MANIFEST_ENTRY), &resolution.bundle.manifest)?;

        let marker = if resolution.relocked(dep) {
            relocked += 1;
            style("locked").cyan()
        } else {
            style("verified").green()
        };
        println!(
            "  {} {} {} @ {} ({})",
            style("✓").green(),
            dep.kind,
            dep.ref_name(),
            dep.version,
            marker
        );

        *dep = resolution.reference;
    }

    if relocked > 0 {
        deps.save(file)?;
        println!("Locked {} dependency digest(s) in {}", relocked, file.display());
    }

    println!(
        "{} Fetched {} dependencies into {}",
        style("✓").green().bold(),
        deps.dependencies.len(),
        output.display()
    );
    Ok(())
}
