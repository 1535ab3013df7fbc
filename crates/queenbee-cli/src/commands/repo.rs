//! Registry management commands

use console::style;
use std::path::Path;

use super::ConfigPaths;
use crate::error::{CliError, Result};
use queenbee_core::{PackageKind, ResourceManifest};
use queenbee_repo::{
    Credentials, IndexStore, MergeOptions, MergeSource, Registry, RegistryScheme, load_index,
};

/// Build a registry index from the packages in `folder`
pub fn init(folder: &Path) -> Result<()> {
    let store = IndexStore::new(folder);
    let index = store.rebuild()?;

    for kind in PackageKind::ALL {
        let catalog = index.catalog(kind);
        if !catalog.is_empty() {
            println!(
                "  {:<10} {} package(s), {} version(s)",
                kind.directory(),
                catalog.names().count(),
                catalog.len()
            );
        }
    }
    println!(
        "{} Wrote {}",
        style("✓").green().bold(),
        store.index_path().display()
    );
    Ok(())
}

/// Merge a package folder or an index file into the index of `folder`
pub fn merge(folder: &Path, source: &Path, overwrite: bool, skip: bool) -> Result<()> {
    let source = if source.is_file() {
        MergeSource::Index(load_index(source)?)
    } else if source.is_dir() {
        MergeSource::Directory(source.to_path_buf())
    } else {
        return Err(CliError::input(format!(
            "Merge source '{}' is neither an index file nor a folder",
            source.display()
        )));
    };

    let store = IndexStore::new(folder);
    let report = store.merge(
        source,
        MergeOptions {
            overwrite,
            skip_on_conflict: skip,
        },
    )?;

    for skipped in &report.skipped {
        println!(
            "  {} skipped {} {} {} (already indexed)",
            style("⚠").yellow(),
            skipped.kind,
            skipped.name,
            skipped.version
        );
    }
    println!(
        "{} Merged {} record(s) into {}",
        style("✓").green().bold(),
        report.added,
        store.index_path().display()
    );
    Ok(())
}

/// Package a manifest and publish it into `folder`
pub fn publish(
    folder: &Path,
    manifest: &Path,
    kind: PackageKind,
    readme: Option<&Path>,
    overwrite: bool,
) -> Result<()> {
    let manifest = ResourceManifest::from_file(manifest)?;
    let store = IndexStore::new(folder);
    let record = store.publish(kind, &manifest, readme, overwrite)?;

    println!(
        "{} Published {} {} {}",
        style("✓").green().bold(),
        kind,
        record.name,
        record.version
    );
    println!("  url:    {}", record.url);
    println!("  digest: {}", record.digest);
    Ok(())
}

/// Add a named registry
pub fn add(
    paths: &ConfigPaths,
    name: &str,
    url: &str,
    username: Option<&str>,
    password: Option<&str>,
    token: Option<&str>,
) -> Result<()> {
    let mut config = paths.load_config()?;

    if config.get(name).is_some() {
        return Err(CliError::input_with_help(
            format!("Registry '{}' already exists", name),
            format!("Remove it first with 'queenbee repo remove {}'", name),
        ));
    }

    let registry = Registry::new(name, url)?;

    // Handle credentials
    if username.is_some() || password.is_some() || token.is_some() {
        let mut cred_store = paths.load_credentials()?;

        let creds = if let Some(token) = token {
            Credentials::bearer(token)
        } else if let (Some(user), Some(pass)) = (username, password) {
            Credentials::basic(user, pass)
        } else {
            return Err(CliError::input(
                "Please provide both username and password, or a token",
            ));
        };

        cred_store.set(registry.credential_key(), creds);
        cred_store.save_to(&paths.credentials)?;
        println!("Credentials stored securely");
    }

    let scheme = match registry.scheme() {
        RegistryScheme::File => "File",
        RegistryScheme::Http => "HTTP",
    };

    config.add(registry)?;
    config.save_to(&paths.registries)?;

    println!(
        "\"{}\" has been added to your registries ({})",
        name, scheme
    );
    Ok(())
}

/// List configured registries
pub fn list(paths: &ConfigPaths, show_auth: bool) -> Result<()> {
    let config = paths.load_config()?;

    if config.registries.is_empty() {
        println!("No registries configured.");
        println!();
        println!("Add one with: queenbee repo add <name> <url>");
        return Ok(());
    }

    let cred_store = paths.load_credentials()?;

    println!("{:<20} {:<10} URL", "NAME", "TYPE");
    println!("{}", "-".repeat(80));

    for registry in &config.registries {
        let scheme = match registry.scheme() {
            RegistryScheme::File => "File",
            RegistryScheme::Http => "HTTP",
        };

        let auth_info = if !show_auth {
            ""
        } else if cred_store.has(registry.credential_key()) {
            " (authenticated)"
        } else {
            " (public)"
        };

        println!(
            "{:<20} {:<10} {}{}",
            registry.name, scheme, registry.url, auth_info
        );
    }

    Ok(())
}

/// Remove a named registry and its stored credentials
pub fn remove(paths: &ConfigPaths, name: &str) -> Result<()> {
    let mut config = paths.load_config()?;
    let removed = config.remove(name)?;
    config.save_to(&paths.registries)?;

    let mut cred_store = paths.load_credentials()?;
    if cred_store.remove(removed.credential_key()).is_some() {
        cred_store.save_to(&paths.credentials)?;
    }

    println!("\"{}\" has been removed from your registries", name);
    Ok(())
}
