//! Scan command implementation.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use backoff::{future::retry_notify, ExponentialBackoff};
use brickscan_core::{
    HistoryRecord, MockTransport, RecognitionClient, RecognitionConfig, RecognitionResult,
    ScanError, Scanner,
};
use colored::Colorize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::utils::{open_history, read_image, record_json, result_json};

/// Flags of `brickscan scan`.
pub struct ScanOptions {
    pub no_save: bool,
    pub retries: u32,
    pub json: bool,
    pub use_mock: bool,
}

/// Execute the scan command.
pub async fn execute(
    image_path: PathBuf,
    options: ScanOptions,
    database_url: &str,
    quiet: bool,
) -> Result<()> {
    let image = read_image(&image_path)?;

    let config = RecognitionConfig::from_env();
    debug!(config = ?config, "Loaded recognition config");

    let client = if options.use_mock {
        warn!("Using MOCK recognition (no request leaves this machine)");
        if !quiet && !options.json {
            eprintln!("{}", "Using MOCK recognition (offline sample result)".yellow());
        }
        RecognitionClient::new(config, Arc::new(MockTransport::sample()))
    } else {
        RecognitionClient::with_http(config).context("Failed to create recognition client")?
    };

    let (result, record) = if options.no_save {
        let result = with_retries(options.retries, quiet, || async {
            client.recognize(&image).await.map_err(ScanError::from)
        })
        .await?;
        info!(name = %result.name, "Recognized without saving");
        (result, None)
    } else {
        let history = Arc::new(open_history(database_url).await?);
        let scanner = Scanner::new(client, history);
        let outcome = with_retries(options.retries, quiet, || scanner.scan(&image)).await?;
        (outcome.result, Some(outcome.record))
    };

    if options.json {
        let output = json!({
            "result": result_json(&result),
            "record": record.as_ref().map(record_json),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize result")?
        );
    } else if !quiet {
        print_result(&result, record.as_ref());
    }

    Ok(())
}

/// Run `op`, retrying transient failures up to `retries` more times.
///
/// The recognition client never retries on its own; this is the caller-side
/// policy. Non-retryable failures are returned on first sight.
async fn with_retries<T, F, Fut>(retries: u32, quiet: bool, mut op: F) -> Result<T, ScanError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScanError>>,
{
    if retries == 0 {
        return op().await;
    }

    let backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(500),
        max_interval: Duration::from_secs(8),
        max_elapsed_time: None,
        ..Default::default()
    };

    let mut attempt = 0u32;
    retry_notify(
        backoff,
        || {
            attempt += 1;
            let exhausted = attempt > retries;
            let fut = op();
            async move {
                fut.await.map_err(|e| {
                    if !exhausted && e.is_retryable() {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        },
        |err: ScanError, wait: Duration| {
            warn!(
                error = %err,
                retry_after_ms = wait.as_millis() as u64,
                "Scan failed, retrying"
            );
            if !quiet {
                eprintln!(
                    "{}",
                    format!("{err}. Retrying in {:.1}s...", wait.as_secs_f64()).yellow()
                );
            }
        },
    )
    .await
}

fn print_result(result: &RecognitionResult, record: Option<&HistoryRecord>) {
    println!();
    println!("{}", "Part recognized!".green().bold());
    println!();
    println!("   {} {}", "Name:".dimmed(), result.name);
    if let Some(identifier) = &result.identifier {
        println!("   {} {}", "Part ID:".dimmed(), identifier);
    }
    if let Some(confidence) = result.confidence_percent() {
        println!("   {} {}", "Confidence:".dimmed(), confidence);
    }
    if let Some(url) = &result.image_reference {
        println!("   {} {}", "Reference image:".dimmed(), url);
    }
    match record {
        Some(record) => println!("   {} {}", "Saved as:".dimmed(), record.id),
        None => println!("   {}", "Not saved to history".dimmed()),
    }
}
