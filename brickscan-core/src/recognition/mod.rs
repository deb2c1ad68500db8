//! Recognition client for the Brickognize visual search service.
//!
//! A [`RecognitionClient`] owns its [`RecognitionConfig`] and a
//! [`RecognitionTransport`]. The transport is the only component that does
//! I/O, so tests substitute [`MockTransport`] for the real HTTP stack.
//!
//! ## Quick Start
//!
//! ```no_run
//! use brickscan_core::recognition::{RecognitionClient, RecognitionConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RecognitionClient::with_http(RecognitionConfig::from_env())?;
//! let jpeg = std::fs::read("brick.jpg")?;
//! let result = client.recognize(&jpeg).await?;
//! println!("{} ({:?})", result.name, result.confidence);
//! # Ok(())
//! # }
//! ```
//!
//! One call is one attempt. The client never retries, caches or
//! deduplicates; retry policy belongs to the caller.

mod config;
#[cfg(feature = "network")]
mod http_client;
mod mock;
pub mod multipart;

pub use config::{
    RecognitionConfig, DEFAULT_BASE_URL, DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_TOTAL_TIMEOUT, DEFAULT_UPLOAD_FIELD,
};
#[cfg(feature = "network")]
pub use http_client::ReqwestTransport;
pub use mock::{MockReply, MockTransport};

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{RecognitionError, Result, TimeoutPhase, TransportError};
use crate::result::RecognitionResult;
use crate::schema;
use multipart::{MultipartBody, UPLOAD_CONTENT_TYPE, UPLOAD_FILE_NAME};

/// Value of the `Accept` header on every upload.
pub const ACCEPT_JSON: &str = "application/json";

/// A fully encoded upload, independent of the HTTP stack that sends it.
#[derive(Clone)]
pub struct UploadRequest {
    pub url: Url,
    /// `multipart/form-data; boundary=...`
    pub content_type: String,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

impl UploadRequest {
    /// Encode `image` as the single file part named `field_name`.
    pub fn new(url: Url, field_name: &str, authorization: Option<&str>, image: &[u8]) -> Self {
        let body =
            MultipartBody::single_file(field_name, UPLOAD_FILE_NAME, UPLOAD_CONTENT_TYPE, image);
        Self {
            url,
            content_type: body.content_type(),
            authorization: authorization.map(str::to_owned),
            body: body.into_bytes(),
        }
    }

    /// Headers to send, in order.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Content-Type", self.content_type.clone()),
            ("Accept", ACCEPT_JSON.to_string()),
        ];
        if let Some(key) = &self.authorization {
            headers.push(("Authorization", key.clone()));
        }
        headers
    }
}

impl std::fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRequest")
            .field("url", &self.url.as_str())
            .field("content_type", &self.content_type)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "[REDACTED]"),
            )
            .field("body_bytes", &self.body.len())
            .finish()
    }
}

/// Raw response as received by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Sends one encoded upload and returns the raw response.
///
/// Implementations must be thread-safe (`Send + Sync`) and must not retry.
/// The `request_timeout` phase (connection plus headers) is the transport's
/// responsibility; the client bounds the whole call by `total_timeout`.
#[async_trait]
pub trait RecognitionTransport: Send + Sync {
    async fn send(&self, request: UploadRequest) -> std::result::Result<TransportResponse, TransportError>;

    /// Short identifier for logs.
    fn name(&self) -> &'static str;
}

/// Performs single recognition attempts against the configured endpoint.
#[derive(Clone)]
pub struct RecognitionClient {
    config: RecognitionConfig,
    transport: Arc<dyn RecognitionTransport>,
}

impl RecognitionClient {
    pub fn new(config: RecognitionConfig, transport: Arc<dyn RecognitionTransport>) -> Self {
        Self { config, transport }
    }

    /// Create a client backed by [`ReqwestTransport`].
    #[cfg(feature = "network")]
    #[instrument(level = "debug", skip_all, fields(
        endpoint = %config.endpoint,
        request_timeout_ms = config.request_timeout.as_millis() as u64,
        total_timeout_ms = config.total_timeout.as_millis() as u64
    ))]
    pub fn with_http(config: RecognitionConfig) -> std::result::Result<Self, TransportError> {
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Submit one image and return the best match.
    ///
    /// Encode, send and decode happen strictly in that order. Dropping the
    /// returned future cancels the request.
    #[instrument(
        level = "info",
        skip_all,
        fields(transport = self.transport.name(), image_bytes = image.len())
    )]
    pub async fn recognize(&self, image: &[u8]) -> Result<RecognitionResult> {
        let start = Instant::now();

        let url = self.config.endpoint_url().inspect_err(|e| {
            warn!(error = %e, "Rejected endpoint configuration, no request sent");
        })?;

        let request = UploadRequest::new(
            url,
            &self.config.upload_field_name,
            self.config.authorization(),
            image,
        );
        debug!(
            url = %request.url,
            body_bytes = request.body.len(),
            "Encoded multipart upload"
        );

        let total_timeout = self.config.total_timeout;
        let response = match tokio::time::timeout(total_timeout, self.transport.send(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(
                    error = %e,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Transport failure"
                );
                return Err(RecognitionError::Network(e));
            }
            Err(_) => {
                warn!(
                    total_timeout_ms = total_timeout.as_millis() as u64,
                    "Recognition exceeded total timeout"
                );
                return Err(RecognitionError::Network(TransportError::Timeout {
                    phase: TimeoutPhase::Transfer,
                    after: total_timeout,
                }));
            }
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(status = response.status, latency_ms, "Received HTTP response");

        if !(200..300).contains(&response.status) {
            warn!(status = response.status, latency_ms, "Service returned error status");
            return Err(RecognitionError::ServerError {
                status: response.status,
                body: schema::error_body_text(&response.body),
            });
        }

        let result = schema::map_response(&response.body, response.content_type.as_deref());
        match &result {
            Ok(result) => info!(
                name = %result.name,
                confidence = ?result.confidence,
                latency_ms,
                "Recognition succeeded"
            ),
            Err(e) => info!(kind = %e.kind(), latency_ms, "Recognition produced no result"),
        }
        result
    }
}

impl std::fmt::Debug for RecognitionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionClient")
            .field("config", &self.config)
            .field("transport", &self.transport.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ErrorKind;

    const ONE_ITEM: &str = r#"{"listing_id": "l", "items": [
        {"id": "3001", "name": "Brick 2 x 4", "img_url": "https://img.example/3001.png", "type": "part", "score": 0.87}
    ]}"#;

    fn client_with(mock: &Arc<MockTransport>, config: RecognitionConfig) -> RecognitionClient {
        RecognitionClient::new(config, mock.clone())
    }

    #[tokio::test]
    async fn test_recognize_returns_first_candidate() {
        let mock = Arc::new(MockTransport::json(200, ONE_ITEM));
        let client = client_with(&mock, RecognitionConfig::default());

        let result = client.recognize(b"\xff\xd8\xff\xe0jpeg").await.unwrap();
        assert_eq!(result.name, "Brick 2 x 4");
        assert_eq!(result.confidence, Some(0.87));
        assert_eq!(result.identifier.as_deref(), Some("3001"));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_request_shape() {
        let mock = Arc::new(MockTransport::json(200, ONE_ITEM));
        let config = RecognitionConfig {
            upload_field_name: "image".into(),
            ..Default::default()
        }
        .with_api_key("key-123");
        let client = client_with(&mock, config);

        client.recognize(b"JPEGDATA").await.unwrap();

        let request = mock.last_request().expect("request recorded");
        assert_eq!(request.url.as_str(), "https://api.brickognize.com/predict/");

        let headers = request.headers();
        assert!(headers.contains(&("Accept", "application/json".to_string())));
        assert!(headers.contains(&("Authorization", "key-123".to_string())));

        let boundary = request
            .content_type
            .strip_prefix("multipart/form-data; boundary=")
            .expect("multipart content type");
        let body = String::from_utf8_lossy(&request.body);
        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.contains("name=\"image\"; filename=\"scan.jpg\""));
        assert!(body.contains("Content-Type: image/jpeg\r\n\r\nJPEGDATA\r\n"));
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[tokio::test]
    async fn test_no_authorization_without_api_key() {
        let mock = Arc::new(MockTransport::json(200, ONE_ITEM));
        let client = client_with(&mock, RecognitionConfig::default());

        client.recognize(b"x").await.unwrap();

        let request = mock.last_request().unwrap();
        assert!(request.headers().iter().all(|(name, _)| *name != "Authorization"));
    }

    #[tokio::test]
    async fn test_boundary_changes_between_calls() {
        let mock = Arc::new(MockTransport::json(200, ONE_ITEM));
        let client = client_with(&mock, RecognitionConfig::default());

        client.recognize(b"x").await.unwrap();
        client.recognize(b"x").await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_ne!(requests[0].content_type, requests[1].content_type);
    }

    #[tokio::test]
    async fn test_empty_candidates_is_no_results() {
        let mock = Arc::new(MockTransport::json(200, r#"{"listing_id": "l", "items": []}"#));
        let client = client_with(&mock, RecognitionConfig::default());

        let err = client.recognize(b"x").await.unwrap_err();
        assert_eq!(err, RecognitionError::NoResults);
    }

    #[tokio::test]
    async fn test_server_error_carries_status_and_body() {
        let mock = Arc::new(MockTransport::text(500, "boom"));
        let client = client_with(&mock, RecognitionConfig::default());

        let err = client.recognize(b"x").await.unwrap_err();
        assert_eq!(
            err,
            RecognitionError::ServerError {
                status: 500,
                body: "boom".into()
            }
        );
    }

    #[tokio::test]
    async fn test_undecodable_error_body_is_empty() {
        let mock = Arc::new(MockTransport::reply(TransportResponse {
            status: 502,
            content_type: None,
            body: vec![0xff, 0xfe, 0x00],
        }));
        let client = client_with(&mock, RecognitionConfig::default());

        let err = client.recognize(b"x").await.unwrap_err();
        assert_eq!(
            err,
            RecognitionError::ServerError {
                status: 502,
                body: String::new()
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_decoding_error() {
        let mock = Arc::new(MockTransport::json(200, "{not json"));
        let client = client_with(&mock, RecognitionConfig::default());

        match client.recognize(b"x").await.unwrap_err() {
            RecognitionError::Decoding { body } => assert!(body.contains("{not json")),
            other => panic!("expected decoding error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_endpoint_makes_no_call() {
        let mock = Arc::new(MockTransport::json(200, ONE_ITEM));
        let client = client_with(&mock, RecognitionConfig::default().with_endpoint(""));

        let err = client.recognize(b"x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_error_is_network() {
        let mock = Arc::new(MockTransport::failing(TransportError::Connect(
            "connection refused".into(),
        )));
        let client = client_with(&mock, RecognitionConfig::default());

        let err = client.recognize(b"x").await.unwrap_err();
        assert_eq!(
            err,
            RecognitionError::Network(TransportError::Connect("connection refused".into()))
        );
        assert_eq!(mock.call_count(), 1, "client must not retry");
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_timeout_is_network_failure() {
        let mock =
            Arc::new(MockTransport::json(200, ONE_ITEM).with_delay(Duration::from_secs(120)));
        let config = RecognitionConfig {
            total_timeout: Duration::from_secs(60),
            ..Default::default()
        };
        let client = client_with(&mock, config);

        let err = client.recognize(b"x").await.unwrap_err();
        assert_eq!(
            err,
            RecognitionError::Network(TransportError::Timeout {
                phase: TimeoutPhase::Transfer,
                after: Duration::from_secs(60),
            })
        );
        assert_eq!(mock.call_count(), 1);
    }
}
