//! Scripted transport for tests and offline runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{RecognitionTransport, TransportResponse, UploadRequest};
use crate::error::TransportError;

/// Canned `/predict/` response used by [`MockTransport::sample`].
pub const SAMPLE_RESPONSE: &str = r#"{
  "listing_id": "mock-listing",
  "items": [
    {
      "id": "3001",
      "name": "Brick 2 x 4",
      "img_url": "https://storage.googleapis.com/brickognize-static/thumbnails-v2.14/part/3001/0.webp",
      "category": "Brick",
      "type": "part",
      "score": 0.92
    }
  ]
}"#;

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    Response(TransportResponse),
    Error(TransportError),
}

/// Transport that replays scripted replies and records every request.
///
/// Replies are consumed in order; the last one repeats once the script runs
/// out. WARNING: never talks to the network, for tests and demos only.
pub struct MockTransport {
    script: Mutex<VecDeque<MockReply>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<UploadRequest>>,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn new(reply: MockReply) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([reply])),
            delay: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answer with `status` and a JSON body.
    pub fn json(status: u16, body: &str) -> Self {
        Self::reply(TransportResponse {
            status,
            content_type: Some("application/json".to_string()),
            body: body.as_bytes().to_vec(),
        })
    }

    /// Always answer with `status` and a plain-text body.
    pub fn text(status: u16, body: &str) -> Self {
        Self::reply(TransportResponse {
            status,
            content_type: Some("text/plain; charset=utf-8".to_string()),
            body: body.as_bytes().to_vec(),
        })
    }

    pub fn reply(response: TransportResponse) -> Self {
        Self::new(MockReply::Response(response))
    }

    pub fn failing(error: TransportError) -> Self {
        Self::new(MockReply::Error(error))
    }

    /// A single confident match for part 3001.
    pub fn sample() -> Self {
        Self::json(200, SAMPLE_RESPONSE)
    }

    /// Queue another reply after the existing ones.
    pub fn then(self, reply: MockReply) -> Self {
        lock(&self.script).push_back(reply);
        self
    }

    /// Wait this long before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<UploadRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<UploadRequest> {
        lock(&self.requests).last().cloned()
    }

    fn next_reply(&self) -> Option<MockReply> {
        let mut script = lock(&self.script);
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::sample()
    }
}

#[async_trait]
impl RecognitionTransport for MockTransport {
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_reply() {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::Error(error)) => Err(error),
            None => Err(TransportError::Request("mock transport has no scripted reply".into())),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::RecognitionConfig;

    fn request() -> UploadRequest {
        let url = RecognitionConfig::default().endpoint_url().unwrap();
        UploadRequest::new(url, "query_image", None, b"img")
    }

    #[tokio::test]
    async fn test_script_replays_in_order_then_repeats_last() {
        let mock = MockTransport::text(503, "busy")
            .then(MockReply::Error(TransportError::Connect("reset".into())))
            .then(MockReply::Response(TransportResponse {
                status: 200,
                content_type: None,
                body: b"ok".to_vec(),
            }));

        assert_eq!(mock.send(request()).await.unwrap().status, 503);
        assert!(mock.send(request()).await.is_err());
        assert_eq!(mock.send(request()).await.unwrap().status, 200);
        assert_eq!(mock.send(request()).await.unwrap().status, 200);
        assert_eq!(mock.call_count(), 4);
        assert_eq!(mock.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_sample_is_success() {
        let mock = MockTransport::default();
        let response = mock.send(request()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(mock.name(), "mock");
    }
}
