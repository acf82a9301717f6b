///
/// This module implements the CLI interface for structure-sync: command
/// parsing, configuration loading, and wiring the Notion client into the core
/// pipeline.
///
/// All business logic (tree walking, rendering, document layout) lives in the
/// [`structure-sync-core`] crate. This module is CLI glue only.
///
/// ## How To Use
/// - From CI: run `structure-sync sync` after checkout with the Notion
///   secrets and the GitHub context in the environment.
/// - When a branch is deleted: `structure-sync mark-deleted --branch <name>`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`structure-sync-core`]: ../../structure-sync-core/
use crate::load_config::load_config;
use crate::notion::NotionClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use structure_sync_core::synchronise::{mark_branch_deleted, synchronise, SyncOutcome};
use structure_sync_core::version::SystemClock;

/// CLI for structure-sync: publish repository structure diagrams to Notion.
#[derive(Parser)]
#[clap(
    name = "structure-sync",
    version,
    about = "Publish a Mermaid diagram of the repository structure to a Notion page",
    after_help = "On failure the error and its causes are printed to stderr. \
Set RUST_BACKTRACE=1 to include a backtrace."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Walk the repository and append a version record for the current commit
    Sync {
        /// Optional YAML file with non-secret settings
        #[clap(long)]
        config: Option<PathBuf>,
        /// Append even if the structure is unchanged
        #[clap(long)]
        force: bool,
    },
    /// Mark a branch's grouping as deleted
    MarkDeleted {
        /// Branch name as shown in the grouping title
        #[clap(long)]
        branch: String,
        /// Optional YAML file with non-secret settings
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config, force } => {
            let mut config = load_config(config.as_deref())?;
            config.sync.force |= force;
            config.sync.trace_loaded();
            tracing::info!(command = "sync", "🚀 Starting structure sync");

            let client = NotionClient::new(&config.api_key, &config.base_url)
                .context("Failed to construct Notion client")?;
            let report = synchronise(&config.sync, &client, &SystemClock)
                .await
                .context("Synchronisation failed")?;

            match &report.outcome {
                SyncOutcome::Appended { block_id, divider } => tracing::info!(
                    command = "sync",
                    version = %report.version,
                    branch = %report.branch,
                    block_id = %block_id,
                    divider,
                    "✨ Structure synced to Notion"
                ),
                SyncOutcome::Unchanged => tracing::info!(
                    command = "sync",
                    branch = %report.branch,
                    hash = %report.content_hash,
                    "✨ Structure unchanged, nothing to sync"
                ),
            }
            Ok(())
        }
        Commands::MarkDeleted { branch, config } => {
            let config = load_config(config.as_deref())?;
            tracing::info!(command = "mark-deleted", branch = %branch, "🗑️ Marking branch as deleted");

            let client = NotionClient::new(&config.api_key, &config.base_url)
                .context("Failed to construct Notion client")?;
            let marked = mark_branch_deleted(
                &client,
                &config.sync.page_id,
                &config.sync.anchor_title,
                &branch,
            )
            .await
            .context("Marking branch as deleted failed")?;

            if marked {
                tracing::info!(command = "mark-deleted", branch = %branch, "✅ Branch grouping marked deleted");
            } else {
                tracing::warn!(command = "mark-deleted", branch = %branch, "No grouping found for branch");
            }
            Ok(())
        }
    }
}
