use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod replay;

use config::CliConfig;
use replay::Replay;

#[derive(Parser)]
#[command(name = "corestore", about = "Schema-driven store driven from an action log")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dispatch JSON-lines actions and print the resulting snapshots
    Replay {
        /// TOML entity definition (defaults to CORESTORE_DEFINITION)
        #[arg(long)]
        definition: Option<PathBuf>,

        /// JSON-lines action log; read from stdin when omitted
        #[arg(long)]
        actions: Option<PathBuf>,

        /// Pretty-print the snapshots
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = CliConfig::from_env();

    // Logs go to stderr; stdout carries the snapshots.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            definition,
            actions,
            pretty,
        } => {
            let definition = config.definition_or(definition).context(
                "No definition given. Pass --definition <path> or set CORESTORE_DEFINITION",
            )?;
            info!(definition = %definition.display(), "Loading definition");

            let replay = Replay::load(&definition)?;
            let input = read_actions(actions.as_deref()).await?;
            let dispatched = replay.apply_all(&input)?;
            info!(dispatched, "Replay finished");

            let summary = replay.summary();
            let rendered = if pretty {
                serde_json::to_string_pretty(&summary)?
            } else {
                serde_json::to_string(&summary)?
            };
            println!("{rendered}");
        }
    }

    Ok(())
}

async fn read_actions(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read actions from {}", path.display())),
        None => {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("Failed to read actions from stdin")?;
            Ok(input)
        }
    }
}
