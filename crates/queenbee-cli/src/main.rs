//! Queenbee CLI - Package registry tooling for operators and recipes

use clap::{Parser, Subcommand};
use queenbee_core::PackageKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;

use commands::ConfigPaths;
use error::Result;

#[derive(Parser)]
#[command(name = "queenbee")]
#[command(author = "Queenbee Contributors")]
#[command(version)]
#[command(about = "Package registry tooling for Queenbee operators and recipes", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Directory holding registries.yaml and credentials.yaml
    #[arg(long, global = true, env = "QUEENBEE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage registries and their indexes
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },

    /// Search a registry index
    Search {
        /// Registry name or URL (file:, http:// or https://)
        source: String,

        /// Text matched against names, descriptions and keywords
        query: String,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage dependencies
    Dep {
        #[command(subcommand)]
        command: DepCommands,
    },
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Build index.json from the packages in a registry folder
    Init {
        /// Registry folder with operators/ and recipes/ subfolders
        folder: PathBuf,
    },

    /// Merge a package folder or another index.json into a registry index
    Merge {
        /// Registry folder whose index.json is updated
        folder: PathBuf,

        /// Package folder or index.json file to merge
        source: PathBuf,

        /// Replace versions that are already indexed
        #[arg(long)]
        overwrite: bool,

        /// Skip versions that are already indexed instead of failing
        #[arg(long, conflicts_with = "overwrite")]
        skip: bool,
    },

    /// Package a manifest into a registry folder
    Publish {
        /// Registry folder
        folder: PathBuf,

        /// Manifest file (JSON or YAML)
        manifest: PathBuf,

        /// Package kind
        #[arg(short, long)]
        kind: PackageKind,

        /// README to ship in the package
        #[arg(long)]
        readme: Option<PathBuf>,

        /// Replace the version if it is already indexed
        #[arg(long)]
        overwrite: bool,
    },

    /// Add a named registry
    Add {
        /// Registry name
        name: String,

        /// Registry URL
        url: String,

        /// Username for basic auth
        #[arg(long, requires = "password")]
        username: Option<String>,

        /// Password for basic auth
        #[arg(long, requires = "username")]
        password: Option<String>,

        /// Bearer token
        #[arg(long, conflicts_with_all = ["username", "password"])]
        token: Option<String>,
    },

    /// List configured registries
    List {
        /// Show whether credentials are stored
        #[arg(long)]
        auth: bool,
    },

    /// Remove a named registry
    Remove {
        /// Registry name
        name: String,
    },
}

#[derive(Subcommand)]
enum DepCommands {
    /// Resolve, verify and lock every dependency in a file
    Fetch {
        /// Dependency file (YAML)
        file: PathBuf,

        /// Folder receiving one <name>/resource.json per dependency
        #[arg(short, long, default_value = ".dependencies")]
        output: PathBuf,

        /// Skip manifest digest verification
        #[arg(long)]
        no_verify: bool,
    },
}

fn initialize_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // Logs go to stderr, stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let paths = || ConfigPaths::new(cli.config_dir.as_deref());

    match cli.command {
        Commands::Repo { command } => match command {
            RepoCommands::Init { folder } => commands::repo::init(&folder),

            RepoCommands::Merge {
                folder,
                source,
                overwrite,
                skip,
            } => commands::repo::merge(&folder, &source, overwrite, skip),

            RepoCommands::Publish {
                folder,
                manifest,
                kind,
                readme,
                overwrite,
            } => commands::repo::publish(&folder, &manifest, kind, readme.as_deref(), overwrite),

            RepoCommands::Add {
                name,
                url,
                username,
                password,
                token,
            } => commands::repo::add(
                &paths()?,
                &name,
                &url,
                username.as_deref(),
                password.as_deref(),
                token.as_deref(),
            ),

            RepoCommands::List { auth } => commands::repo::list(&paths()?, auth),

            RepoCommands::Remove { name } => commands::repo::remove(&paths()?, &name),
        },

        Commands::Search {
            source,
            query,
            json,
        } => commands::search::run(&paths()?, &source, &query, json).await,

        Commands::Dep { command } => match command {
            DepCommands::Fetch {
                file,
                output,
                no_verify,
            } => commands::dep::fetch(&paths()?, &file, &output, !no_verify).await,
        },
    }
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() => {
            let _ = err.print();
            std::process::exit(exit_codes::USAGE_ERROR);
        }
        Err(err) => err.exit(),
    };

    initialize_tracing(cli.debug);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
