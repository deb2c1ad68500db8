//! Brickscan Core - photo recognition pipeline for the Brickognize service
//!
//! This crate turns a captured photo into a recognized item and keeps a local
//! history of completed scans.
//!
//! # Features
//!
//! - Multipart JPEG upload with a fresh boundary per request
//! - Two-level timeouts (response headers, whole exchange)
//! - Typed failure taxonomy ([`ErrorKind`]) for presentation code
//! - Ordered, atomic scan history on SQLite or in memory
//! - JPEG thumbnails stored alongside each record
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use brickscan_core::{HistoryStore, MockTransport, RecognitionClient, RecognitionConfig, Scanner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Use the mock transport for testing (in production, use RecognitionClient::with_http)
//! let client = RecognitionClient::new(RecognitionConfig::default(), Arc::new(MockTransport::sample()));
//! let history = Arc::new(HistoryStore::open("sqlite://brickscan.db?mode=rwc").await?);
//!
//! let scanner = Scanner::new(client, history.clone());
//! let outcome = scanner.scan(&std::fs::read("brick.jpg")?).await?;
//! println!("{} ({:?})", outcome.result.name, outcome.result.confidence_percent());
//!
//! for record in history.list().await? {
//!     println!("{} {}", record.created_at, record.recognized_name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod history;
pub mod recognition;
pub mod result;
pub mod scanner;
pub mod schema;
#[cfg(feature = "thumbnails")]
pub mod thumbnail;

// Re-export main types for convenience
pub use error::{ErrorKind, RecognitionError, Result, TimeoutPhase, TransportError};
pub use history::{HistoryError, HistoryRecord, HistoryStore};
pub use recognition::{
    MockReply, MockTransport, RecognitionClient, RecognitionConfig, RecognitionTransport,
    TransportResponse, UploadRequest,
};
pub use result::RecognitionResult;
pub use scanner::{ScanError, ScanOutcome, Scanner};
pub use schema::map_response;

#[cfg(feature = "network")]
pub use recognition::ReqwestTransport;

#[cfg(feature = "thumbnails")]
pub use thumbnail::{make_thumbnail, ThumbnailError, THUMBNAIL_MAX_SIDE};
