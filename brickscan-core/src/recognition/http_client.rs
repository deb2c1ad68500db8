//! reqwest-backed transport with the two-phase timeout policy.
//!
//! `request_timeout` bounds connection establishment and the wait for
//! response headers. `total_timeout` is installed as the reqwest client
//! timeout and so also bounds reading the body.

use std::error::Error as _;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use super::{RecognitionConfig, RecognitionTransport, TransportResponse, UploadRequest};
use crate::error::{TimeoutPhase, TransportError};

const USER_AGENT: &str = concat!("brickscan/", env!("CARGO_PKG_VERSION"));

/// HTTP transport built on a shared [`reqwest::Client`].
pub struct ReqwestTransport {
    client: Client,
    request_timeout: Duration,
    total_timeout: Duration,
}

impl ReqwestTransport {
    #[instrument(level = "debug", skip_all, fields(
        request_timeout_ms = request_timeout.as_millis() as u64,
        total_timeout_ms = total_timeout.as_millis() as u64
    ))]
    pub fn new(request_timeout: Duration, total_timeout: Duration) -> Result<Self, TransportError> {
        debug!("Creating HTTP transport");

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(request_timeout)
            .timeout(total_timeout)
            .build()
            .map_err(|e| {
                warn!(error = %e, "Failed to create HTTP client");
                TransportError::Request(format!("Failed to create HTTP client: {e}"))
            })?;

        info!("HTTP transport created successfully");
        Ok(Self {
            client,
            request_timeout,
            total_timeout,
        })
    }

    pub fn from_config(config: &RecognitionConfig) -> Result<Self, TransportError> {
        Self::new(config.request_timeout, config.total_timeout)
    }

    fn classify(&self, error: reqwest::Error) -> TransportError {
        let detail = error_chain(&error);
        if error.is_timeout() {
            self.timeout_error(error.is_connect())
        } else if is_tls_failure(&detail) {
            TransportError::Tls(detail)
        } else if error.is_connect() {
            TransportError::Connect(detail)
        } else if error.is_body() || error.is_decode() {
            TransportError::Body(detail)
        } else {
            TransportError::Request(detail)
        }
    }

    /// Connect timeouts come from `connect_timeout(request_timeout)`; any
    /// other reqwest timeout is the client-wide `total_timeout`.
    fn timeout_error(&self, during_connect: bool) -> TransportError {
        if during_connect {
            TransportError::Timeout {
                phase: TimeoutPhase::Response,
                after: self.request_timeout,
            }
        } else {
            TransportError::Timeout {
                phase: TimeoutPhase::Transfer,
                after: self.total_timeout,
            }
        }
    }
}

#[async_trait]
impl RecognitionTransport for ReqwestTransport {
    #[instrument(level = "debug", skip_all, fields(url = %request.url))]
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse, TransportError> {
        let start = Instant::now();

        let mut builder = self.client.post(request.url.clone());
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        let pending = builder.body(request.body).send();

        let response = match tokio::time::timeout(self.request_timeout, pending).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let err = self.classify(e);
                warn!(
                    error = %err,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "HTTP request failed"
                );
                return Err(err);
            }
            Err(_) => {
                warn!(
                    request_timeout_ms = self.request_timeout.as_millis() as u64,
                    "No response headers within request timeout"
                );
                return Err(TransportError::Timeout {
                    phase: TimeoutPhase::Response,
                    after: self.request_timeout,
                });
            }
        };

        let status = response.status();
        debug!(
            status = %status,
            latency_ms = start.elapsed().as_millis() as u64,
            "Received response headers"
        );

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body = response.bytes().await.map_err(|e| {
            let err = self.classify(e);
            warn!(error = %err, "Failed to read response body");
            err
        })?;

        Ok(TransportResponse {
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Flatten an error and its sources into one message.
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn is_tls_failure(detail: &str) -> bool {
    let detail = detail.to_ascii_lowercase();
    detail.contains("certificate") || detail.contains("tls") || detail.contains("handshake")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognitionError;
    use crate::recognition::RecognitionClient;
    use std::sync::Arc;

    #[test]
    fn test_create_transport() {
        let transport = ReqwestTransport::new(Duration::from_secs(5), Duration::from_secs(10));
        assert!(transport.is_ok());
        assert_eq!(transport.unwrap().name(), "http");
    }

    #[test]
    fn test_tls_detection() {
        assert!(is_tls_failure("invalid peer certificate: UnknownIssuer"));
        assert!(is_tls_failure("TLS handshake eof"));
        assert!(!is_tls_failure("tcp connect error: Connection refused"));
    }

    #[test]
    fn test_connect_timeout_reports_request_timeout() {
        let transport =
            ReqwestTransport::new(Duration::from_secs(30), Duration::from_secs(60)).unwrap();

        assert_eq!(
            transport.timeout_error(true),
            TransportError::Timeout {
                phase: TimeoutPhase::Response,
                after: Duration::from_secs(30),
            }
        );
        assert_eq!(
            transport.timeout_error(false),
            TransportError::Timeout {
                phase: TimeoutPhase::Transfer,
                after: Duration::from_secs(60),
            }
        );
    }

    #[tokio::test]
    async fn test_silent_server_hits_request_timeout() {
        // Accepts the connection, then never sends a byte.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let config = RecognitionConfig::default().with_endpoint(format!("http://{addr}/predict/"));
        let transport =
            ReqwestTransport::new(Duration::from_millis(300), Duration::from_secs(5)).unwrap();
        let client = RecognitionClient::new(config, Arc::new(transport));

        let started = std::time::Instant::now();
        let err = client.recognize(b"x").await.unwrap_err();

        assert!(
            matches!(
                err,
                RecognitionError::Network(TransportError::Timeout {
                    phase: TimeoutPhase::Response,
                    ..
                })
            ),
            "got {err:?}"
        );
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }

    #[tokio::test]
    async fn test_connection_refused_is_network() {
        // Port 9 (discard) is closed on any sane test machine.
        let config = RecognitionConfig::default().with_endpoint("http://127.0.0.1:9/predict/");
        let transport = ReqwestTransport::new(Duration::from_secs(2), Duration::from_secs(4)).unwrap();
        let client = RecognitionClient::new(config, Arc::new(transport));

        let err = client.recognize(b"x").await.unwrap_err();
        assert!(matches!(err, RecognitionError::Network(_)), "got {err:?}");
    }

    // Run with: cargo test -p brickscan-core test_brickognize_real_api -- --ignored
    #[tokio::test]
    #[ignore = "requires network access to the Brickognize API"]
    async fn test_brickognize_real_api() {
        let client = RecognitionClient::with_http(RecognitionConfig::from_env()).unwrap();
        let result = client.recognize(b"definitely not a jpeg").await;
        println!("Brickognize answered: {result:?}");
        assert!(!matches!(result, Err(RecognitionError::InvalidUrl(_))));
    }
}
