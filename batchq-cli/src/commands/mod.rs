//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod queue;

use std::path::PathBuf;

use anyhow::Result;
use batchq_client::QueueClient;
use batchq_core::domain::job::Priority;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a batch of files for extraction
    Submit {
        /// Local files to upload, or content references with --reference
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Admission priority (low, normal, high, urgent)
        #[arg(short, long)]
        priority: Option<Priority>,

        /// Per-group retry budget
        #[arg(long)]
        max_retries: Option<u32>,

        /// Send the arguments as content references instead of reading them
        #[arg(long)]
        reference: bool,
    },
    /// Show a job
    Status {
        /// Job ID
        id: uuid::Uuid,

        /// Poll until the job reaches a terminal status
        #[arg(short, long)]
        watch: bool,
    },
    /// Cancel a processing job
    Cancel {
        /// Job ID
        id: uuid::Uuid,
    },
    /// Show queue counters and limits
    Stats,
    /// Trigger an admission pass
    ProcessNext,
    /// Check that the server is reachable
    Health,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = QueueClient::new(&config.server_url);

    match command {
        Commands::Submit {
            files,
            priority,
            max_retries,
            reference,
        } => job::submit(&client, files, priority, max_retries, reference).await,
        Commands::Status { id, watch } => job::status(&client, id, watch).await,
        Commands::Cancel { id } => job::cancel(&client, id).await,
        Commands::Stats => queue::stats(&client).await,
        Commands::ProcessNext => queue::process_next(&client).await,
        Commands::Health => queue::health(&client).await,
    }
}
