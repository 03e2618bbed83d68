//! Mock transport for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{AttemptError, ContentPart, GenerateContentRequest, RawResponse, Transport};

/// A scripted reply for [`MockTransport`].
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Success whose `candidates[0].content.parts[0].text` is the given string.
    Text(String),
    /// Arbitrary status and body.
    Raw { status: u16, body: String },
    /// Error status with an empty body.
    Status(u16),
    /// Connection-level failure.
    TransportFault,
    /// Wait on the tokio clock, then reply.
    Delayed(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }

    pub fn delayed(delay: Duration, reply: MockReply) -> Self {
        MockReply::Delayed(delay, Box::new(reply))
    }
}

type Responder = Box<dyn Fn(&GenerateContentRequest) -> MockReply + Send + Sync>;

/// A hand-rolled mock implementing [`Transport`] for tests.
///
/// Supports:
/// - A sequence of replies (one per call, repeating the last when exhausted), **or**
/// - A responder closure that picks the reply from the request.
/// - Call counting via [`call_count()`](MockTransport::call_count) and request capture.
pub struct MockTransport {
    sequence: Mutex<Vec<MockReply>>,
    responder: Option<Responder>,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerateContentRequest>>,
}

impl MockTransport {
    /// Replies in order, repeating the last one.
    pub fn sequence(replies: Vec<MockReply>) -> Self {
        Self {
            sequence: Mutex::new(replies),
            responder: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always replies with `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self::sequence(vec![MockReply::text(text)])
    }

    pub fn with_responder(
        responder: impl Fn(&GenerateContentRequest) -> MockReply + Send + Sync + 'static,
    ) -> Self {
        Self {
            sequence: Mutex::new(Vec::new()),
            responder: Some(Box::new(responder)),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerateContentRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, request: &GenerateContentRequest) -> MockReply {
        if let Some(responder) = &self.responder {
            return responder(request);
        }
        let mut sequence = self.sequence.lock().unwrap();
        if sequence.len() > 1 {
            sequence.remove(0)
        } else {
            sequence
                .first()
                .cloned()
                .unwrap_or(MockReply::Status(500))
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(&self, request: &GenerateContentRequest) -> Result<RawResponse, AttemptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let mut reply = self.next_reply(request);
        while let MockReply::Delayed(delay, inner) = reply {
            tokio::time::sleep(delay).await;
            reply = *inner;
        }

        match reply {
            MockReply::Text(text) => Ok(RawResponse {
                status: 200,
                body: serde_json::json!({
                    "candidates": [{ "content": { "parts": [{ "text": text }] } }]
                })
                .to_string(),
            }),
            MockReply::Raw { status, body } => Ok(RawResponse { status, body }),
            MockReply::Status(status) => Ok(RawResponse {
                status,
                body: String::new(),
            }),
            MockReply::TransportFault => Err(AttemptError::Transport(
                "connection reset by peer".to_string(),
            )),
            MockReply::Delayed(..) => unreachable!("delays are unwrapped above"),
        }
    }
}

/// Concatenated text parts of the user content in `request`.
pub fn user_text(request: &GenerateContentRequest) -> String {
    request
        .contents
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| match p {
            ContentPart::Text { text } => Some(text.as_str()),
            ContentPart::InlineData { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of the system instruction in `request`.
pub fn system_text(request: &GenerateContentRequest) -> String {
    request
        .system_instruction
        .parts
        .iter()
        .filter_map(|p| match p {
            ContentPart::Text { text } => Some(text.as_str()),
            ContentPart::InlineData { .. } => None,
        })
        .collect()
}
