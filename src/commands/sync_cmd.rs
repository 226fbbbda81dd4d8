//! Sync CLI commands for the offline operation queue.

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use closet_core::sync::{ConnectivityProbe, Operation, OperationStatus};
use closet_core::SyncResult;

use super::OutputFormat;
use crate::config::Config;
use crate::engine::Engine;

/// Sync queued changes with the entity server
#[derive(Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Subcommand)]
enum SyncSubcommand {
    /// Drain the operation queue now (default)
    Now,

    /// Show sync state and server reachability
    Status {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Give permanently failed operations a fresh retry budget
    Retry,

    /// List queued operations
    Queue {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Keep syncing in the foreground until interrupted
    Watch {
        /// Seconds between reachability checks
        #[arg(long, default_value_t = 10)]
        probe_interval: u64,
    },
}

impl SyncCommand {
    pub async fn run(
        &self,
        engine: &Engine,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            None | Some(SyncSubcommand::Now) => sync_now(engine, config).await,
            Some(SyncSubcommand::Status { format }) => status(engine, config, format),
            Some(SyncSubcommand::Retry) => retry(engine, config).await,
            Some(SyncSubcommand::Queue { format }) => queue(engine, format),
            Some(SyncSubcommand::Watch { probe_interval }) => {
                watch(engine, Duration::from_secs((*probe_interval).max(1))).await
            }
        }
    }
}

async fn sync_now(engine: &Engine, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if !engine.network.is_online() {
        let pending = engine.queue.stats().pending;
        println!(
            "Server {} is unreachable; {} operation(s) stay queued.",
            config.api_url.value, pending
        );
        return Ok(());
    }

    println!("Syncing with {}...", config.api_url.value);
    let result = engine.coordinator.sync_now().await;
    print_result(&result);
    Ok(())
}

fn print_result(result: &SyncResult) {
    if result.synced_count == 0 && result.failed_count == 0 {
        println!("Already up to date.");
        return;
    }

    println!("  ✓ {} synced", result.synced_count);
    if result.failed_count > 0 {
        println!("  ✗ {} failed", result.failed_count);
        for error in &result.errors {
            println!("    {}", error);
        }
    }
}

fn status(
    engine: &Engine,
    config: &Config,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = engine.coordinator.status();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        OutputFormat::Text => {
            println!("Sync Status");
            println!("===========");
            println!();
            println!("Server:    {}", config.api_url.value);
            println!(
                "Reachable: {}",
                if status.is_online { "✓ yes" } else { "✗ no" }
            );
            println!(
                "Auto-sync: {}",
                if config.sync.auto_sync {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!();
            println!("State:     {}", status.state);
            println!("Pending:   {}", status.pending_count);
            println!("Failed:    {}", status.failed_count);
            if status.failed_count > 0 {
                println!();
                println!("Run `closet sync retry` to requeue failed operations.");
            }
        }
    }
    Ok(())
}

async fn retry(engine: &Engine, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let requeued = engine.coordinator.retry_failed();
    if requeued == 0 {
        println!("No failed operations.");
        return Ok(());
    }

    println!("Requeued {} operation(s).", requeued);
    sync_now(engine, config).await
}

fn queue(engine: &Engine, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let operations: Vec<Operation> = engine
        .queue
        .list()
        .into_iter()
        .filter(|op| op.status != OperationStatus::Completed)
        .collect();

    if operations.is_empty() {
        println!("Queue is empty");
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&operations)?);
        }
        OutputFormat::Text => {
            println!(
                "{:<6}  {:<6}  {:<7}  {:<41}  {:<10}  TRIES",
                "SEQ", "OP", "TYPE", "ENTITY", "STATUS"
            );
            println!("{}", "-".repeat(90));
            for op in &operations {
                println!(
                    "{:<6}  {:<6}  {:<7}  {:<41}  {:<10}  {}/{}",
                    op.sequence,
                    op.kind.to_string(),
                    op.entity_type,
                    op.entity_id.to_string(),
                    op.status.to_string(),
                    op.retry_count,
                    op.max_retries
                );
                if let Some(error) = &op.last_error {
                    println!("        last error: {}", error);
                }
            }
            println!("\nTotal: {} operation(s)", operations.len());
        }
    }
    Ok(())
}

/// Runs the background sync loop against a polled reachability probe and
/// prints every status change until Ctrl-C.
async fn watch(engine: &Engine, probe_interval: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let probe: Arc<dyn ConnectivityProbe> = engine.probe.clone();
    let poller = engine.network.clone().watch_probe(probe, probe_interval);
    let sync_loop = engine.coordinator.start();

    let mut status_rx = engine.coordinator.subscribe_status();
    println!("Watching for changes (Ctrl-C to stop)");
    println!("{}", *status_rx.borrow_and_update());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", *status_rx.borrow_and_update());
            }
        }
    }

    sync_loop.shutdown();
    poller.abort();
    println!("Stopped.");
    Ok(())
}
