//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use brickscan_core::{HistoryRecord, HistoryStore, RecognitionResult};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::debug;

/// History database used when neither `--database` nor
/// `BRICKSCAN_DATABASE_URL` is given.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://brickscan.db?mode=rwc";

/// Read a captured image from disk.
pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read image");
    Ok(bytes)
}

/// Open the history database, running migrations if needed.
pub async fn open_history(database_url: &str) -> Result<HistoryStore> {
    let store = HistoryStore::open(database_url)
        .await
        .context("Failed to open history database")?;
    debug!(store = ?store, "History opened");
    Ok(store)
}

/// Format a timestamp as a human-readable UTC string.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// JSON view of a recognition result.
pub fn result_json(result: &RecognitionResult) -> Value {
    json!({
        "name": result.name,
        "identifier": result.identifier,
        "confidence": result.confidence,
        "image_url": result.image_reference.as_ref().map(|url| url.as_str()),
    })
}

/// JSON view of a history record, with the thumbnail base64-encoded.
pub fn record_json(record: &HistoryRecord) -> Value {
    json!({
        "id": record.id,
        "created_at": record.created_at.to_rfc3339(),
        "name": record.recognized_name,
        "identifier": record.recognized_id,
        "confidence": record.confidence,
        "image_url": record.remote_image_url,
        "thumbnail_jpeg": record.thumbnail_jpeg.as_ref().map(|bytes| STANDARD.encode(bytes)),
    })
}

/// Confidence as a percentage, or `-` when the service sent none.
pub fn format_confidence(confidence: Option<f64>) -> String {
    confidence
        .map(|c| format!("{:.0}%", c.clamp(0.0, 1.0) * 100.0))
        .unwrap_or_else(|| "-".to_string())
}
