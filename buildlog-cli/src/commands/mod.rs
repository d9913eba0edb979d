//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod health;
mod logs;
mod push;

pub use logs::LogsArgs;
pub use push::PushCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print the log of a build
    Logs(LogsArgs),
    /// Push objects and step logs into the server registry
    Push {
        #[command(subcommand)]
        command: PushCommands,
    },
    /// Check that the server is reachable
    Health,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Logs(args) => logs::handle_logs_command(args, config).await,
        Commands::Push { command } => push::handle_push_command(command, config).await,
        Commands::Health => health::handle_health_command(config).await,
    }
}
