///
/// This module implements the CLI interface for treesync: command parsing and the
/// entrypoints behind each subcommand.
///
/// All traversal, routing and outcome logic lives in the [`treesync-core`] crate.
/// This module only loads configuration, builds collaborators and drives the core.
///
/// ## Subcommands
/// - `run`: drain the spool inbox once, handling messages concurrently.
/// - `process`: push a single message file through the handler without a queue.
/// - `check`: validate the config and print the category table.
///
/// [`treesync-core`]: ../../treesync-core/
use crate::config::load_config;
use crate::spool::SpoolQueue;
use crate::worker::build_handler;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use treesync_core::contract::InboundMessage;
use treesync_core::intake::drain;

/// CLI for treesync: mirror queued folder trees into local category folders.
#[derive(Parser)]
#[clap(
    name = "treesync",
    version,
    about = "Mirror remote folder trees into category-routed local directories"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Handle every message waiting in the spool inbox, then exit
    Run {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Handle a single message file without going through the queue
    Process {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// JSON file holding the folder tree; its file stem is used as message id
        #[clap(long)]
        message: PathBuf,
    },
    /// Validate the config file and print the category table
    Check {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Run { config } => {
            let config = load_config(config)?;
            let max_concurrent_jobs = config.queue.max_concurrent_jobs;
            let queue = SpoolQueue::open(&config.queue.inbox).await?;
            let handler = build_handler(config)?;

            tracing::info!(command = "run", inbox = %queue.inbox().display(), "Draining inbox");
            let summary = drain(&handler, &queue, max_concurrent_jobs).await;
            println!(
                "Processed {} message(s): {} succeeded, {} failed",
                summary.received, summary.succeeded, summary.failed
            );
            Ok(())
        }
        Commands::Process { config, message } => {
            let config = load_config(config)?;
            let handler = build_handler(config)?;

            let id = message
                .file_stem()
                .and_then(|s| s.to_str())
                .with_context(|| format!("Cannot derive a message id from {}", message.display()))?
                .to_owned();
            let body = tokio::fs::read(&message)
                .await
                .with_context(|| format!("Failed to read message file {}", message.display()))?;

            tracing::info!(command = "process", message_id = %id, "Processing message file");
            let outcome = handler.execute(&InboundMessage { id, body }).await;
            println!("{}", outcome.notification());
            if !outcome.success {
                bail!("message {} failed", outcome.message_id);
            }
            Ok(())
        }
        Commands::Check { config } => {
            let config = load_config(config)?;
            println!("Config OK. Categories:");
            for (category, root) in config.categories.iter() {
                println!("  {category} -> {}", root.display());
            }
            Ok(())
        }
    }
}
