//! Queue command handlers

use anyhow::Result;
use batchq_client::QueueClient;
use colored::*;

/// Show queue counters
pub async fn stats(client: &QueueClient) -> Result<()> {
    let stats = client.queue_stats().await?;

    println!("{}", "Queue:".bold());
    println!("  Total:      {}", stats.total_jobs);
    println!("  Pending:    {}", stats.pending_jobs.to_string().yellow());
    println!("  Active:     {}", stats.active_jobs.to_string().cyan());
    println!("  Completed:  {}", stats.completed_jobs.to_string().green());
    println!("  Failed:     {}", stats.failed_jobs.to_string().red());

    println!("\n{}", "Limits:".bold());
    println!(
        "  API calls:        {}/{} per minute",
        stats.current_api_calls, stats.max_api_calls_per_minute
    );
    println!("  Concurrent jobs:  {}", stats.max_concurrent_jobs);
    println!(
        "  Group size:       {} file(s), {} byte(s)",
        stats.max_files_per_group, stats.max_group_bytes
    );
    println!("  Retention:        {} day(s)", stats.job_retention_days);

    Ok(())
}

/// Trigger an admission pass
pub async fn process_next(client: &QueueClient) -> Result<()> {
    let resp = client.process_next().await?;

    println!("{}", resp.message.bold());
    for id in resp.admitted {
        println!("  {} {}", "▸".cyan(), id.to_string().dimmed());
    }

    Ok(())
}

pub async fn health(client: &QueueClient) -> Result<()> {
    let status = client.health().await?;
    println!(
        "{} {} ({})",
        "✓".green(),
        status.trim(),
        client.base_url().dimmed()
    );
    Ok(())
}
