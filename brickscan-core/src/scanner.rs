//! Capture pipeline: recognize an image, then record the outcome.
//!
//! [`Scanner`] is the caller the recognition client expects: it owns the
//! decision to persist, so the client itself never touches storage. A record
//! is written only after recognition has fully succeeded; dropping a pending
//! [`Scanner::scan`] future (timeout, dismissed view) leaves history untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::error::RecognitionError;
use crate::history::{HistoryError, HistoryRecord, HistoryStore};
use crate::recognition::RecognitionClient;
use crate::result::RecognitionResult;

#[derive(Error, Debug)]
pub enum ScanError {
    /// Another scan on this scanner has not finished yet.
    #[error("A scan is already in progress")]
    Busy,

    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    /// Recognition succeeded but the history write failed.
    #[error("Recognized \"{}\" but could not save it: {source}", .result.name)]
    History {
        result: Box<RecognitionResult>,
        #[source]
        source: HistoryError,
    },
}

impl ScanError {
    /// Only transient recognition failures qualify; see
    /// [`RecognitionError::is_retryable`].
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Recognition(e) => e.is_retryable(),
            Self::Busy | Self::History { .. } => false,
        }
    }
}

/// Result of a successful scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub result: RecognitionResult,
    pub record: HistoryRecord,
}

/// Runs one capture at a time through recognition and into history.
pub struct Scanner {
    client: RecognitionClient,
    history: Arc<HistoryStore>,
    in_flight: AtomicBool,
}

impl Scanner {
    pub fn new(client: RecognitionClient, history: Arc<HistoryStore>) -> Self {
        Self {
            client,
            history,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn client(&self) -> &RecognitionClient {
        &self.client
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Recognize `image` and append the outcome to history.
    ///
    /// Rejects with [`ScanError::Busy`] while another scan is pending.
    #[instrument(level = "info", skip_all, fields(image_bytes = image.len()))]
    pub async fn scan(&self, image: &[u8]) -> Result<ScanOutcome, ScanError> {
        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or_else(|| {
            warn!("Capture rejected, previous scan still pending");
            ScanError::Busy
        })?;

        let result = self.client.recognize(image).await?;

        let record = HistoryRecord::from_result(&result, thumbnail_for(image).await);
        if let Err(e) = self.history.append(&record).await {
            error!(error = %e, record_id = %record.id, "Failed to save scan history");
            return Err(ScanError::History {
                result: Box::new(result),
                source: e,
            });
        }

        info!(record_id = %record.id, name = %record.recognized_name, "Scan recorded");
        Ok(ScanOutcome { result, record })
    }
}

/// Clears the in-flight flag when dropped, including on cancellation.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Decoding a full-size capture is CPU-bound, so it runs on the blocking pool.
#[cfg(feature = "thumbnails")]
async fn thumbnail_for(image: &[u8]) -> Option<Vec<u8>> {
    use crate::thumbnail::{make_thumbnail, THUMBNAIL_MAX_SIDE};

    let image = image.to_vec();
    match tokio::task::spawn_blocking(move || make_thumbnail(&image, THUMBNAIL_MAX_SIDE)).await {
        Ok(Ok(thumbnail)) => Some(thumbnail),
        Ok(Err(e)) => {
            warn!(error = %e, "Storing scan without thumbnail");
            None
        }
        Err(e) => {
            warn!(error = %e, "Thumbnail task failed, storing scan without thumbnail");
            None
        }
    }
}

#[cfg(not(feature = "thumbnails"))]
async fn thumbnail_for(_image: &[u8]) -> Option<Vec<u8>> {
    None
}
