//! CloakX CLI
//!
//! Operator command-line interface for the CloakX relay.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "cloakx")]
#[command(about = "CloakX relay operator CLI", long_about = None)]
struct Cli {
    /// Relay URL
    #[arg(long, env = "CLOAKX_RELAY_URL", default_value = "http://localhost:8080")]
    relay_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        relay_url: cli.relay_url,
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CursorCommands, JobCommands};
    use cloakx_core::domain::job::JobStatus;

    #[test]
    fn test_parse_jobs_list_with_status() {
        let cli = Cli::try_parse_from([
            "cloakx",
            "--relay-url",
            "http://relay:8080",
            "jobs",
            "list",
            "--status",
            "failed",
        ])
        .unwrap();

        assert_eq!(cli.relay_url, "http://relay:8080");
        assert!(matches!(
            cli.command,
            Commands::Jobs {
                command: JobCommands::List {
                    status: Some(JobStatus::Failed)
                }
            }
        ));
    }

    #[test]
    fn test_parse_jobs_get_requires_numeric_id() {
        assert!(Cli::try_parse_from(["cloakx", "jobs", "get", "abc"]).is_err());

        let cli = Cli::try_parse_from(["cloakx", "jobs", "get", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Jobs {
                command: JobCommands::Get { id: 7 }
            }
        ));
    }

    #[test]
    fn test_parse_cursor_reset_flag() {
        let cli = Cli::try_parse_from(["cloakx", "cursors", "reset", "--yes"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cursors {
                command: CursorCommands::Reset { yes: true }
            }
        ));
    }
}
