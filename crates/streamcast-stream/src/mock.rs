use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use streamcast_core::errors::BridgeError;
use streamcast_core::records::StreamRecord;

use crate::client::{FetchResult, StreamApi};

/// Pre-programmed responses for deterministic testing without a backend.
pub enum MockResponse {
    /// `create_cursor` succeeds with this token.
    Cursor(String),
    /// `fetch_messages` succeeds with these records and continuation token.
    Fetch {
        records: Vec<StreamRecord>,
        next_cursor: Option<String>,
    },
    /// The call fails with this error.
    Error(BridgeError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    /// Convenience: a fetch of base64-encoded key/value pairs.
    pub fn records(pairs: &[(&str, &str)]) -> Self {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        Self::Fetch {
            records: pairs
                .iter()
                .map(|(k, v)| StreamRecord {
                    key: STANDARD.encode(k),
                    value: STANDARD.encode(v),
                })
                .collect(),
            next_cursor: None,
        }
    }

    /// Convenience: a fetch with no records and no continuation token.
    pub fn empty_fetch() -> Self {
        Self::Fetch { records: Vec::new(), next_cursor: None }
    }

    /// Convenience: wrap any response with a delay.
    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Scripted backend. Responses are consumed in order across both calls;
/// once the script runs out, `create_cursor` yields generated tokens and
/// `fetch_messages` yields empty batches, so long-running poller tests
/// don't starve.
pub struct MockStreamApi {
    responses: Mutex<VecDeque<MockResponse>>,
    create_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    fetch_cursors: Mutex<Vec<String>>,
}

impl MockStreamApi {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            create_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            fetch_cursors: Mutex::new(Vec::new()),
        }
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::Relaxed)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::Relaxed)
    }

    /// Cursors passed to `fetch_messages`, in call order.
    pub fn fetch_cursors(&self) -> Vec<String> {
        self.fetch_cursors.lock().unwrap().clone()
    }

    /// Append more scripted responses after construction.
    pub fn push(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    fn next_response(&self) -> Option<MockResponse> {
        self.responses.lock().unwrap().pop_front()
    }

    async fn resolve(&self, response: MockResponse) -> MockResponse {
        match response {
            MockResponse::Delay(delay, inner) => {
                tokio::time::sleep(delay).await;
                *inner
            }
            other => other,
        }
    }
}

#[async_trait]
impl StreamApi for MockStreamApi {
    async fn create_cursor(&self, _stream_id: &str) -> Result<String, BridgeError> {
        let n = self.create_calls.fetch_add(1, Ordering::Relaxed);
        let Some(scripted) = self.next_response() else {
            return Ok(format!("generated-cursor-{n}"));
        };
        match self.resolve(scripted).await {
            MockResponse::Cursor(token) => Ok(token),
            MockResponse::Error(e) => Err(e),
            MockResponse::Fetch { .. } => {
                panic!("mock script expected a Cursor response for create_cursor")
            }
            MockResponse::Delay(..) => unreachable!("resolved above"),
        }
    }

    async fn fetch_messages(&self, _stream_id: &str, cursor: &str) -> Result<FetchResult, BridgeError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        self.fetch_cursors.lock().unwrap().push(cursor.to_string());
        let Some(scripted) = self.next_response() else {
            return Ok(FetchResult::default());
        };
        match self.resolve(scripted).await {
            MockResponse::Fetch { records, next_cursor } => Ok(FetchResult { records, next_cursor }),
            MockResponse::Error(e) => Err(e),
            MockResponse::Cursor(_) => {
                panic!("mock script expected a Fetch response for fetch_messages")
            }
            MockResponse::Delay(..) => unreachable!("resolved above"),
        }
    }
}
