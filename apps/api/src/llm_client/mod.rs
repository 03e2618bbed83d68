/// LLM Client: the single point of entry for all Gemini API calls in the critic.
///
/// ARCHITECTURAL RULE: No other module may call the inference endpoint directly.
/// Extraction (OCR), profile synthesis, analysis and power-ups all go through here.
///
/// Model: see [`MODEL`]. Hardcoded; do not make configurable to prevent drift.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[cfg(test)]
pub mod mock;
pub mod prompts;
pub mod tolerant_json;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// The model used for every inference call.
pub const MODEL: &str = "gemini-2.5-flash-preview-09-2025";
/// 1 initial attempt + 5 retries.
pub const MAX_ATTEMPTS: u32 = 6;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    /// The credential was rejected. Never retried.
    #[error("Inference credential rejected (HTTP 401)")]
    Unauthorized,

    #[error("Inference failed after {attempts} attempts: {cause}")]
    RetriesExhausted { attempts: u32, cause: AttemptError },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Why a single attempt failed. Everything here except a 401 is retried.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl AttemptError {
    fn is_unauthorized(&self) -> bool {
        matches!(self, AttemptError::Api { status: 401, .. })
    }
}

/// How the model is asked to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceMode {
    /// Strict JSON completion (`responseMimeType: application/json`).
    Structured,
    /// Free-form text with the live web-search tool enabled.
    SearchGrounded,
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: SystemInstruction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: &'static str,
    pub parts: Vec<ContentPart>,
}

/// A single piece of request content: plain text or base64 inline data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn inline_data(mime_type: impl Into<String>, base64_data: String) -> Self {
        ContentPart::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: base64_data,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub google_search: GoogleSearch,
}

/// Serializes as `{}`.
#[derive(Debug, Clone, Serialize)]
pub struct GoogleSearch {}

impl GenerateContentRequest {
    pub fn new(parts: Vec<ContentPart>, system_instruction: &str, mode: InferenceMode) -> Self {
        let (generation_config, tools) = match mode {
            InferenceMode::Structured => (
                Some(GenerationConfig {
                    response_mime_type: "application/json",
                }),
                None,
            ),
            InferenceMode::SearchGrounded => (
                None,
                Some(vec![Tool {
                    google_search: GoogleSearch {},
                }]),
            ),
        };

        Self {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            system_instruction: SystemInstruction {
                parts: vec![ContentPart::text(system_instruction)],
            },
            generation_config,
            tools,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl ModelResponse {
    /// `candidates[0].content.parts[0].text`, the only part of the response consumed.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Transport
// ────────────────────────────────────────────────────────────────────────────

/// Status and body of one HTTP exchange, before any interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// One POST to the inference endpoint. Swapped for a mock in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: &GenerateContentRequest) -> Result<RawResponse, AttemptError>;
}

/// `reqwest`-backed transport for the hosted endpoint.
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            url: format!("{GEMINI_API_BASE}/{MODEL}:generateContent?key={api_key}"),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: &GenerateContentRequest) -> Result<RawResponse, AttemptError> {
        let response = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptError::Transport(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Transport(e.without_url().to_string()))?;

        Ok(RawResponse { status, body })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single LLM client used by every pipeline stage.
/// Wraps the generateContent API with retry logic.
#[derive(Clone)]
pub struct LlmClient {
    transport: Arc<dyn Transport>,
}

impl LlmClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_transport(Arc::new(HttpTransport::new(api_key)))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Sends `parts` with `system_instruction`, retrying every failure except a 401.
    ///
    /// Attempt `i` (0-indexed) that fails is followed by a `2^i` second pause, so the
    /// worst case is 1 + 2 + 4 + 8 + 16 = 31s of backoff across six attempts.
    pub async fn invoke(
        &self,
        parts: Vec<ContentPart>,
        system_instruction: &str,
        mode: InferenceMode,
    ) -> Result<ModelResponse, LlmError> {
        let request = GenerateContentRequest::new(parts, system_instruction, mode);

        let mut attempt: u32 = 0;
        loop {
            let cause = match self.attempt(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_unauthorized() => return Err(LlmError::Unauthorized),
                Err(e) => e,
            };

            if attempt + 1 >= MAX_ATTEMPTS {
                return Err(LlmError::RetriesExhausted {
                    attempts: MAX_ATTEMPTS,
                    cause,
                });
            }

            let delay = backoff_delay(attempt);
            warn!(
                "LLM call attempt {} failed ({}), retrying after {}ms...",
                attempt + 1,
                cause,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Like [`invoke`](Self::invoke) but returns the response text, failing on an empty reply.
    pub async fn invoke_text(
        &self,
        parts: Vec<ContentPart>,
        system_instruction: &str,
        mode: InferenceMode,
    ) -> Result<String, LlmError> {
        let response = self.invoke(parts, system_instruction, mode).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }

    async fn attempt(&self, request: &GenerateContentRequest) -> Result<ModelResponse, AttemptError> {
        let raw = self.transport.post(request).await?;

        if !(200..300).contains(&raw.status) {
            let message = serde_json::from_str::<GeminiError>(&raw.body)
                .map(|e| e.error.message)
                .unwrap_or(raw.body);
            return Err(AttemptError::Api {
                status: raw.status,
                message,
            });
        }

        let response: ModelResponse = serde_json::from_str(&raw.body)?;
        debug!(
            "LLM call succeeded: candidates={}",
            response.candidates.len()
        );
        Ok(response)
    }
}

/// Pause after failed attempt `attempt` (0-indexed): 1s, 2s, 4s, 8s, 16s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt)
}
