//! Recovers a JSON object from model output that may carry surrounding prose.
//!
//! Strategy: take the span from the first `{` to the last `}` inclusive; when there
//! is no such pair, try the whole response. Whatever candidate is chosen either
//! parses completely or fails. No partial objects are returned.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed model response: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}

/// The substring that will be handed to the JSON parser.
pub fn json_candidate(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Parses the candidate span of `text` into `T`.
pub fn parse<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    serde_json::from_str(json_candidate(text)).map_err(ParseError::MalformedResponse)
}
