//! PyCoach CLI — the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP tutor server
//! - `index`   — Build the vector index from course material
//! - `init`    — Write a default config file
//! - `doctor`  — Diagnose configuration and backends

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "pycoach",
    about = "PyCoach — adaptive, retrieval-grounded Python tutor",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./pycoach.toml)
    #[arg(short, long, global = true, env = "PYCOACH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP tutor server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Build the vector index from the course directory
    Index {
        /// Directory of course material
        #[arg(long)]
        course_dir: Option<PathBuf>,

        /// Where to write the index
        #[arg(long)]
        index_dir: Option<PathBuf>,
    },

    /// Write a default config file and course directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Diagnose configuration, index and backends
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env must be loaded before clap reads PYCOACH_CONFIG
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Index { course_dir, index_dir } => {
            commands::index::run(config_path, course_dir, index_dir).await?
        }
        Commands::Init { force } => commands::init::run(config_path, force).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
