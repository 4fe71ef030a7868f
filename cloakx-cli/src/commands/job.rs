//! Job command handlers
//!
//! Listing and inspecting jobs, mostly to find the ones needing manual
//! recovery.

use anyhow::Result;
use clap::Subcommand;
use cloakx_client::RelayClient;
use cloakx_core::domain::job::{Job, JobId, JobStatus};
use colored::*;

use crate::config::Config;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// List jobs
    List {
        /// Only show jobs in this status (pending, in_progress, completed, failed, cancelled)
        #[arg(short, long)]
        status: Option<JobStatus>,
    },
    /// Get job details
    Get {
        /// Ledger job id
        id: JobId,
    },
}

/// Handle job commands
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = RelayClient::new(&config.relay_url);

    match command {
        JobCommands::List { status } => list_jobs(&client, status).await,
        JobCommands::Get { id } => get_job(&client, id).await,
    }
}

async fn list_jobs(client: &RelayClient, status: Option<JobStatus>) -> Result<()> {
    let jobs = client.list_jobs(status).await?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} job(s):", jobs.len()).bold());
    println!();
    for job in jobs {
        print_job_summary(&job);
    }

    Ok(())
}

async fn get_job(client: &RelayClient, id: JobId) -> Result<()> {
    let job = match client.get_job(id).await {
        Ok(job) => job,
        Err(e) if e.is_not_found() => {
            println!("{}", format!("Job {} not found.", id).yellow());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    print_job_details(&job);
    Ok(())
}

fn print_job_summary(job: &Job) {
    println!("  {} Job {}", "▸".cyan(), job.id.to_string().bold());
    println!("    Pool:     {}", job.pool_id);
    println!("    Status:   {}", colorize_status(&job.status));
    println!(
        "    Created:  {}",
        job.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if let Some(reason) = &job.failure_reason {
        println!("    Reason:   {}", reason.red());
    }
    println!();
}

fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  ID:            {}", job.id.to_string().cyan());
    println!("  Creator:       {}", job.creator);
    println!("  Pool:          {}", job.pool_id);
    println!("  Price:         {} MIST", job.price);
    println!("  Epochs:        {}", job.epochs);
    println!("  Learning Rate: {}", job.learning_rate);
    println!("  Status:        {}", colorize_status(&job.status));
    println!(
        "  Buyer Key:     {}",
        hex::encode(&job.buyer_public_key).dimmed()
    );
    if let Some(blob) = &job.model_config_blob_id {
        println!("  Model Config:  {}", blob);
    }
    println!(
        "  Created:       {}",
        job.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  Updated:       {}",
        job.updated_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(digest) = &job.completion_digest {
        println!("\n{}", "Completion:".bold());
        println!("  Transaction:   {}", digest.green());
    }

    if let Some(reason) = &job.failure_reason {
        println!("\n{}", "Failure:".bold());
        println!("  {}", reason.red());
    }
}

/// Colorize job status for display
fn colorize_status(status: &JobStatus) -> ColoredString {
    let status_str = status.as_str();
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::InProgress => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
        JobStatus::Cancelled => status_str.dimmed(),
    }
}
