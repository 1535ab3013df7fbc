//! Search command

use console::style;

use super::ConfigPaths;
use crate::error::{CliError, Result};
use queenbee_repo::DependencyResolver;

/// Search the index of a registry given by name or URL
pub async fn run(paths: &ConfigPaths, source: &str, query: &str, json_output: bool) -> Result<()> {
    let config = paths.load_config()?;
    let url = config.resolve_source(source)?;
    let resolver = DependencyResolver::new(paths.fetcher(&config)?);

    let index = resolver.fetch_index(&url).await?;
    let results = index.search(query);

    if json_output {
        let json = serde_json::to_string_pretty(
            &results
                .iter()
                .map(|(kind, record)| {
                    serde_json::json!({
                        "kind": kind,
                        "name": record.name,
                        "version": record.version,
                        "digest": record.digest,
                        "description": record.description,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .map_err(|e| CliError::Other {
            message: e.to_string(),
        })?;
        println!("{}", json);
        return Ok(());
    }

    if results.is_empty() {
        println!("{} No packages found matching '{}'", style("✗").red(), query);
        return Ok(());
    }

    println!(
        "{:<10} {:<30} {:<12} DESCRIPTION",
        "KIND", "NAME", "VERSION"
    );
    println!("{}", "-".repeat(80));

    for (kind, record) in results {
        let desc = record
            .description
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(40)
            .collect::<String>();

        println!(
            "{:<10} {:<30} {:<12} {}",
            kind.as_str(),
            record.name,
            record.version,
            desc
        );
    }

    Ok(())
}
