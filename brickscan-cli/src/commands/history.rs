//! History command implementations.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use brickscan_core::HistoryRecord;
use colored::Colorize;
use tracing::info;
use uuid::Uuid;

use crate::utils::{format_confidence, format_timestamp, open_history, record_json};

/// List recorded scans, newest first.
pub async fn list(database_url: &str, json: bool, limit: Option<usize>, quiet: bool) -> Result<()> {
    let history = open_history(database_url).await?;
    let mut records = history.list().await.context("Failed to list history")?;
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    if json {
        let values: Vec<_> = records.iter().map(record_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&values).context("Failed to serialize history")?
        );
        return Ok(());
    }

    if quiet {
        return Ok(());
    }

    if records.is_empty() {
        println!("{}", "No scans recorded yet.".dimmed());
        return Ok(());
    }

    println!("{}", format!("{} scan(s)", records.len()).bold());
    println!();
    for record in &records {
        println!(
            "  {}  {:<32} {:>5}  {}",
            format_timestamp(&record.created_at).dimmed(),
            record.recognized_name,
            format_confidence(record.confidence),
            record.id.to_string().dimmed()
        );
    }

    Ok(())
}

/// Show one record, optionally exporting its thumbnail.
pub async fn show(
    database_url: &str,
    id: Uuid,
    thumbnail_out: Option<PathBuf>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let history = open_history(database_url).await?;
    let Some(record) = history.get(id).await.context("Failed to load history record")? else {
        bail!("History record not found: {id}");
    };

    if let Some(path) = &thumbnail_out {
        let Some(thumbnail) = &record.thumbnail_jpeg else {
            bail!("History record {id} has no thumbnail");
        };
        std::fs::write(path, thumbnail)
            .with_context(|| format!("Failed to write thumbnail: {}", path.display()))?;
        info!(path = %path.display(), bytes = thumbnail.len(), "Thumbnail exported");
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&record_json(&record))
                .context("Failed to serialize history record")?
        );
    } else if !quiet {
        print_record(&record, thumbnail_out.as_deref());
    }

    Ok(())
}

/// Delete records by id. Unknown ids are skipped.
pub async fn delete(database_url: &str, ids: Vec<Uuid>, quiet: bool) -> Result<()> {
    let history = open_history(database_url).await?;
    let removed = history
        .delete(&ids)
        .await
        .context("Failed to delete history records")?;

    info!(requested = ids.len(), removed, "Deleted history records");
    if !quiet {
        println!("Deleted {} of {} record(s)", removed, ids.len());
    }

    Ok(())
}

/// Delete every record.
pub async fn clear(database_url: &str, quiet: bool) -> Result<()> {
    let history = open_history(database_url).await?;
    let removed = history.clear().await.context("Failed to clear history")?;

    if !quiet {
        println!("Cleared {removed} record(s)");
    }

    Ok(())
}

fn print_record(record: &HistoryRecord, thumbnail_out: Option<&std::path::Path>) {
    println!();
    println!("{}", record.recognized_name.bold());
    println!();
    println!("   {} {}", "Record ID:".dimmed(), record.id);
    println!(
        "   {} {}",
        "Scanned:".dimmed(),
        format_timestamp(&record.created_at)
    );
    println!(
        "   {} {}",
        "Part ID:".dimmed(),
        record.recognized_id.as_deref().unwrap_or("-")
    );
    println!(
        "   {} {}",
        "Confidence:".dimmed(),
        format_confidence(record.confidence)
    );
    if let Some(url) = &record.remote_image_url {
        println!("   {} {}", "Reference image:".dimmed(), url);
    }
    match (&record.thumbnail_jpeg, thumbnail_out) {
        (Some(_), Some(path)) => {
            println!("   {} {}", "Thumbnail saved:".dimmed(), path.display())
        }
        (Some(bytes), None) => println!("   {} {} bytes", "Thumbnail:".dimmed(), bytes.len()),
        (None, _) => println!("   {} none", "Thumbnail:".dimmed()),
    }
}
