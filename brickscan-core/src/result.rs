use serde::{Deserialize, Serialize};
use url::Url;

/// Best match returned by the recognition service.
///
/// Decoupled from the wire schema: the mapper in [`crate::schema`] is the only
/// place that knows how the service spells these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Service-side identifier of the matched item (e.g. a part number)
    pub identifier: Option<String>,
    /// Display name of the matched item
    pub name: String,
    /// Match score in `[0, 1]`
    pub confidence: Option<f64>,
    /// Reference image of the matched item, when the service sent a valid URL
    pub image_reference: Option<Url>,
}

impl RecognitionResult {
    /// Confidence rendered as a whole percentage, e.g. `"87%"`.
    pub fn confidence_percent(&self) -> Option<String> {
        self.confidence
            .map(|c| format!("{:.0}%", c.clamp(0.0, 1.0) * 100.0))
    }
}
