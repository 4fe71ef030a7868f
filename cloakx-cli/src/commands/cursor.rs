//! Cursor command handlers

use anyhow::Result;
use clap::Subcommand;
use cloakx_client::RelayClient;
use colored::*;

use crate::config::Config;

/// Cursor subcommands
#[derive(Subcommand)]
pub enum CursorCommands {
    /// List the saved cursor of every tracked event type
    List,
    /// Delete all cursors; the relay replays every event from genesis
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

/// Handle cursor commands
pub async fn handle_cursor_command(command: CursorCommands, config: &Config) -> Result<()> {
    let client = RelayClient::new(&config.relay_url);

    match command {
        CursorCommands::List => list_cursors(&client).await,
        CursorCommands::Reset { yes } => reset_cursors(&client, yes).await,
    }
}

async fn list_cursors(client: &RelayClient) -> Result<()> {
    let cursors = client.list_cursors().await?;

    if cursors.is_empty() {
        println!("{}", "No cursors saved; every event type starts from genesis.".yellow());
        return Ok(());
    }

    for cursor in cursors {
        println!("  {} {}", "▸".cyan(), cursor.event_type.bold());
        println!("    Position: {}", cursor.position);
        println!(
            "    Updated:  {}",
            cursor
                .updated_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed()
        );
        println!();
    }

    Ok(())
}

async fn reset_cursors(client: &RelayClient, yes: bool) -> Result<()> {
    if !yes {
        println!(
            "{}",
            "This deletes every cursor and makes the relay re-read the whole event log.".yellow()
        );
        println!("{}", "Re-run with --yes to confirm.".dimmed());
        return Ok(());
    }

    let deleted = client.reset_cursors().await?;
    println!(
        "{} Deleted {} cursor(s)",
        "✓".green(),
        deleted.to_string().bold()
    );

    Ok(())
}
