//! Job command handlers
//!
//! Submission, status display and cancellation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use batchq_client::QueueClient;
use batchq_core::domain::job::{Job, JobStatus, Priority};
use batchq_core::dto::job::SubmitJob;
use colored::*;
use uuid::Uuid;

use crate::files;

const WATCH_INTERVAL: Duration = Duration::from_secs(2);

/// Submit files as a new job
pub async fn submit(
    client: &QueueClient,
    paths: Vec<PathBuf>,
    priority: Option<Priority>,
    max_retries: Option<u32>,
    reference: bool,
) -> Result<()> {
    let files = paths
        .iter()
        .map(|path| {
            if reference {
                Ok(files::reference(path.to_string_lossy().as_ref()))
            } else {
                files::read_file(path)
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let count = files.len();
    let resp = client
        .submit(SubmitJob {
            files,
            priority,
            max_retries,
        })
        .await?;

    println!(
        "{} Submitted job {} with {} file(s)",
        "✓".green(),
        resp.job_id.to_string().cyan(),
        count
    );
    if resp.position == 0 {
        println!("  Admitted, processing has started");
    } else {
        println!(
            "  Position {} in queue, estimated wait {}s",
            resp.position, resp.estimated_wait
        );
    }

    Ok(())
}

/// Show a job, optionally polling until it finishes
pub async fn status(client: &QueueClient, id: Uuid, watch: bool) -> Result<()> {
    let mut job = client.status(id).await?;

    if watch {
        let mut last_progress = None;
        while !job.status.is_terminal() {
            if last_progress != Some(job.progress) {
                println!(
                    "{} {:>3}%  {}",
                    "▸".cyan(),
                    job.progress,
                    colorize_status(job.status)
                );
                last_progress = Some(job.progress);
            }
            tokio::time::sleep(WATCH_INTERVAL).await;
            job = client.status(id).await?;
        }
        println!();
    }

    print_job_details(&job);
    Ok(())
}

/// Cancel a processing job
pub async fn cancel(client: &QueueClient, id: Uuid) -> Result<()> {
    match client.cancel(id).await {
        Ok(_) => {
            println!("{} Cancellation requested for {}", "✓".green(), id);
            Ok(())
        }
        Err(e) if e.is_conflict() => {
            println!("{} {}", "✗".red(), e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Print detailed job information
fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.id.to_string().cyan());
    println!("  Status:      {}", colorize_status(job.status));
    println!("  Priority:    {}", job.priority);
    println!("  Progress:    {}%", job.progress);
    println!(
        "  Files:       {} ({} result(s))",
        job.files.len(),
        job.results.len()
    );
    println!(
        "  Retries:     {} (budget {} per group)",
        job.retry_count, job.max_retries
    );
    println!(
        "  Created:     {}",
        job.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(started) = job.started_at {
        println!("  Started:     {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(completed) = job.completed_at {
        println!("  Completed:   {}", completed.format("%Y-%m-%d %H:%M:%S"));

        if let Some(started) = job.started_at {
            let duration = completed.signed_duration_since(started);
            println!("  Duration:    {}s", duration.num_seconds());
        }
    }

    if !job.results.is_empty() {
        println!("\n{}", "Results:".bold());
        for result in &job.results {
            match (&result.text, &result.error) {
                (_, Some(error)) => println!("  {} {}: {}", "✗".red(), result.name, error.red()),
                (Some(text), None) => println!(
                    "  {} {} ({} char(s))",
                    "✓".green(),
                    result.name,
                    text.chars().count()
                ),
                (None, None) => println!("  {} {}", "·".dimmed(), result.name),
            }
        }
    }

    if !job.errors.is_empty() {
        println!("\n{}", "Errors:".bold());
        for error in &job.errors {
            println!("  {}", error.red());
        }
    }
}

/// Colorize job status for display
fn colorize_status(status: JobStatus) -> colored::ColoredString {
    let status_str = status.to_string();
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::Processing => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
    }
}
