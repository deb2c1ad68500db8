//! Recognition client configuration.
//!
//! Defaults match the public Brickognize deployment. Every option can be
//! overridden from the environment via [`RecognitionConfig::from_env`].

use std::time::Duration;

use url::Url;

use crate::error::{RecognitionError, Result};

/// Default service host.
pub const DEFAULT_BASE_URL: &str = "https://api.brickognize.com";

/// Default recognition endpoint, relative to the base URL.
pub const DEFAULT_ENDPOINT: &str = "/predict/";

/// Default multipart field carrying the image.
pub const DEFAULT_UPLOAD_FIELD: &str = "query_image";

/// Default bound on connection plus response headers.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on the whole exchange, body included.
pub const DEFAULT_TOTAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for a [`RecognitionClient`](super::RecognitionClient).
#[derive(Clone)]
pub struct RecognitionConfig {
    /// Service host the endpoint is resolved against.
    pub base_url: String,
    /// Endpoint path relative to `base_url`, or an absolute URL.
    pub endpoint: String,
    /// Name of the multipart file part.
    pub upload_field_name: String,
    /// Sent verbatim as the `Authorization` header when non-empty.
    pub api_key: Option<String>,
    /// Bound on connection plus response headers.
    pub request_timeout: Duration,
    /// Bound on the full transfer.
    pub total_timeout: Duration,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            upload_field_name: DEFAULT_UPLOAD_FIELD.to_string(),
            api_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            total_timeout: DEFAULT_TOTAL_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for RecognitionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionConfig")
            .field("base_url", &self.base_url)
            .field("endpoint", &self.endpoint)
            .field("upload_field_name", &self.upload_field_name)
            .field(
                "api_key",
                &self.api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .field("total_timeout", &self.total_timeout)
            .finish()
    }
}

impl RecognitionConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional: `BRICKOGNIZE_BASE_URL`, `BRICKOGNIZE_RECOGNIZE_PATH`,
    /// `BRICKOGNIZE_UPLOAD_FIELD`, `BRICKOGNIZE_API_KEY`,
    /// `BRICKOGNIZE_REQUEST_TIMEOUT_SECS`, `BRICKOGNIZE_TOTAL_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("BRICKOGNIZE_BASE_URL").unwrap_or(defaults.base_url);

        let endpoint = std::env::var("BRICKOGNIZE_RECOGNIZE_PATH").unwrap_or(defaults.endpoint);

        let upload_field_name = std::env::var("BRICKOGNIZE_UPLOAD_FIELD")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.upload_field_name);

        let api_key = std::env::var("BRICKOGNIZE_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let request_timeout = std::env::var("BRICKOGNIZE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let total_timeout = std::env::var("BRICKOGNIZE_TOTAL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.total_timeout);

        Self {
            base_url,
            endpoint,
            upload_field_name,
            api_key,
            request_timeout,
            total_timeout,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Resolve the endpoint against the base URL.
    ///
    /// Fails with [`RecognitionError::InvalidUrl`] for an empty endpoint, an
    /// unparsable URL, or anything that is not absolute http(s).
    pub fn endpoint_url(&self) -> Result<Url> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(RecognitionError::InvalidUrl("endpoint is empty".into()));
        }

        let url = match Url::parse(endpoint) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse(self.base_url.trim()).map_err(|e| {
                    RecognitionError::InvalidUrl(format!("base URL {:?}: {e}", self.base_url))
                })?;
                base.join(endpoint).map_err(|e| {
                    RecognitionError::InvalidUrl(format!("endpoint {endpoint:?}: {e}"))
                })?
            }
            Err(e) => {
                return Err(RecognitionError::InvalidUrl(format!(
                    "endpoint {endpoint:?}: {e}"
                )))
            }
        };

        if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
            return Err(RecognitionError::InvalidUrl(format!(
                "{url} is not an http(s) URL"
            )));
        }

        Ok(url)
    }

    /// API key to send, if one is configured and non-empty.
    pub fn authorization(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RecognitionConfig::default();
        assert_eq!(config.upload_field_name, "query_image");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.total_timeout, Duration::from_secs(60));
        assert!(config.authorization().is_none());
    }

    #[test]
    fn test_default_endpoint_resolves_against_base() {
        let url = RecognitionConfig::default().endpoint_url().unwrap();
        assert_eq!(url.as_str(), "https://api.brickognize.com/predict/");
    }

    #[test]
    fn test_absolute_endpoint_overrides_base() {
        let config = RecognitionConfig::default().with_endpoint("http://127.0.0.1:8080/predict/");
        assert_eq!(
            config.endpoint_url().unwrap().as_str(),
            "http://127.0.0.1:8080/predict/"
        );
    }

    #[test]
    fn test_empty_endpoint_is_invalid() {
        let config = RecognitionConfig::default().with_endpoint("");
        assert!(matches!(
            config.endpoint_url(),
            Err(RecognitionError::InvalidUrl(_))
        ));

        let config = RecognitionConfig::default().with_endpoint("   ");
        assert!(config.endpoint_url().is_err());
    }

    #[test]
    fn test_malformed_endpoint_is_invalid() {
        for endpoint in ["http://", "ftp://example.com/predict/", "https://exa mple.com/"] {
            let config = RecognitionConfig::default().with_endpoint(endpoint);
            assert!(
                config.endpoint_url().is_err(),
                "{endpoint:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_malformed_base_is_invalid() {
        let config = RecognitionConfig {
            base_url: "not a url".into(),
            ..Default::default()
        };
        assert!(config.endpoint_url().is_err());
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let config = RecognitionConfig::default().with_api_key("  ");
        assert!(config.authorization().is_none());

        let config = RecognitionConfig::default().with_api_key("secret");
        assert_eq!(config.authorization(), Some("secret"));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = RecognitionConfig::default().with_api_key("super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
