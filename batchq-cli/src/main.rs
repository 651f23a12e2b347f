//! batchq CLI
//!
//! Command-line interface for operating the batch queue server.

mod commands;
mod config;
mod files;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "batchq")]
#[command(about = "Batch extraction queue CLI", long_about = None)]
struct Cli {
    /// Queue server URL
    #[arg(long, env = "BATCHQ_SERVER_URL", default_value = "http://localhost:8080")]
    server_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        server_url: cli.server_url,
    };

    handle_command(cli.command, &config).await
}
