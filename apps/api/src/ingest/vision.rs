use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::ingest::ExtractionError;
use crate::llm_client::prompts::{TRANSCRIBE_REQUEST, TRANSCRIBE_SYSTEM};
use crate::llm_client::{ContentPart, InferenceMode, LlmClient};

/// Transcribes an image through the LLM's vision capability.
///
/// The reply text is used verbatim; a reply without text comes back as an empty
/// string and is rejected by the caller's non-empty check.
pub async fn transcribe(
    llm: &LlmClient,
    image: &[u8],
    mime_type: &str,
) -> Result<String, ExtractionError> {
    let parts = vec![
        ContentPart::text(TRANSCRIBE_REQUEST),
        ContentPart::inline_data(mime_type, STANDARD.encode(image)),
    ];

    let response = llm
        .invoke(parts, TRANSCRIBE_SYSTEM, InferenceMode::Structured)
        .await?;

    Ok(response.text().unwrap_or_default().to_string())
}
