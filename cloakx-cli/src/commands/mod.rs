//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod cursor;
mod job;

pub use cursor::CursorCommands;
pub use job::JobCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Inspect relayed jobs
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Inspect or reset event cursors
    Cursors {
        #[command(subcommand)]
        command: CursorCommands,
    },
}

/// Routes the command to the appropriate handler module
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Jobs { command } => job::handle_job_command(command, config).await,
        Commands::Cursors { command } => cursor::handle_cursor_command(command, config).await,
    }
}
