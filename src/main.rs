//! uindex: code-index HTTP service for Unreal Engine repositories.
//!
//! Usage:
//!   uindex serve --config uindex.toml     # Run the HTTP service
//!   uindex stats --config uindex.toml     # Print index statistics

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uindex::config::{BuildInfo, Config};

#[derive(Parser)]
#[command(name = "uindex")]
#[command(about = "Code-index HTTP service for Unreal Engine repositories")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the store path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Override the bind port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print index statistics as JSON
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("uindex=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(db) = cli.db {
        config.data.db_path = Some(db);
    }

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            let state = uindex::bootstrap(config, BuildInfo::default())?;
            // Queries go through the worker pool until the load lands
            uindex::spawn_memory_load(&state);
            uindex::http::serve(state).await?;
        }

        Commands::Stats => {
            let state = uindex::bootstrap(config, BuildInfo::default())?;
            uindex::load_memory(&state.store, &state.memory)?;
            let stats = state.store.stats()?;
            let mem = state
                .memory
                .read()
                .map(|m| m.stats())
                .map_err(|_| anyhow::anyhow!("memory index lock poisoned"))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "store": stats,
                    "memory": mem,
                }))?
            );
        }
    }

    Ok(())
}
