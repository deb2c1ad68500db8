//! Response schema mapping for the Brickognize `/predict/` endpoint.
//!
//! The service documents this payload as `LegacySearchResultsSchema` in its
//! OpenAPI description. The wire types below are private; the rest of the
//! crate only sees [`RecognitionResult`]. When the service revises its schema,
//! this module is the only thing that has to change.

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{RecognitionError, Result};
use crate::result::RecognitionResult;

/// Maximum number of bytes of response body kept for diagnostics.
pub const MAX_SNIPPET_BYTES: usize = 2048;

/// Substituted for bodies that are not printable text.
pub const NON_TEXT_PLACEHOLDER: &str = "<non-UTF8 body>";

/// Top-level response of `/predict/`.
#[derive(Debug, Deserialize)]
struct LegacySearchResults {
    #[allow(dead_code)]
    listing_id: String,
    items: Vec<LegacyCandidateItem>,
}

/// One ranked candidate. The service orders items best match first.
#[derive(Debug, Deserialize)]
struct LegacyCandidateItem {
    id: String,
    name: String,
    img_url: String,
    #[allow(dead_code)]
    category: Option<String>,
    #[serde(rename = "type")]
    #[allow(dead_code)]
    kind: String,
    score: f64,
}

impl From<LegacyCandidateItem> for RecognitionResult {
    fn from(item: LegacyCandidateItem) -> Self {
        let image_reference = parse_absolute_url(&item.img_url);
        if image_reference.is_none() {
            debug!(img_url = %item.img_url, "Candidate image URL is not a valid absolute URL");
        }

        Self {
            identifier: Some(item.id),
            name: item.name,
            confidence: Some(item.score.clamp(0.0, 1.0)),
            image_reference,
        }
    }
}

/// Map a 2xx response body to the best-match result.
///
/// The first candidate is authoritative. An empty candidate list is
/// [`RecognitionError::NoResults`], a structurally invalid body is
/// [`RecognitionError::Decoding`] with a bounded snippet of the body.
pub fn map_response(body: &[u8], content_type: Option<&str>) -> Result<RecognitionResult> {
    if let Some(content_type) = content_type {
        if !is_json_content_type(content_type) {
            warn!(content_type, "Response is not declared as JSON, decoding anyway");
        }
    }

    let envelope: LegacySearchResults = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, bytes = body.len(), "Response did not match the expected schema");
        RecognitionError::Decoding {
            body: body_snippet(body),
        }
    })?;

    let candidates = envelope.items.len();
    let first = envelope
        .items
        .into_iter()
        .next()
        .ok_or(RecognitionError::NoResults)?;

    debug!(
        candidates,
        id = %first.id,
        score = first.score,
        "Selected first candidate"
    );

    Ok(first.into())
}

/// Trimmed, length-capped text of a response body for diagnostics.
///
/// Bodies that are not valid UTF-8, or that contain control characters, are
/// replaced by [`NON_TEXT_PLACEHOLDER`].
pub fn body_snippet(body: &[u8]) -> String {
    match printable_text(body) {
        Some(text) => truncate_to_char_boundary(text.trim(), MAX_SNIPPET_BYTES).to_string(),
        None => NON_TEXT_PLACEHOLDER.to_string(),
    }
}

/// Best-effort text of an error response body; empty when not decodable.
pub fn error_body_text(body: &[u8]) -> String {
    printable_text(body)
        .map(|text| truncate_to_char_boundary(text, MAX_SNIPPET_BYTES).to_string())
        .unwrap_or_default()
}

fn printable_text(body: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(body).ok()?;
    let binary = text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'));
    (!binary).then_some(text)
}

fn truncate_to_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn parse_absolute_url(raw: &str) -> Option<Url> {
    Url::parse(raw.trim()).ok().filter(|url| url.has_host())
}

fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}
