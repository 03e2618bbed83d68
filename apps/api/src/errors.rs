use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::critique::critic::CritiqueError;
use crate::critique::session::SessionError;
use crate::ingest::ExtractionError;
use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Inference credential rejected")]
    InferenceUnauthorized,

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<CritiqueError> for AppError {
    fn from(err: CritiqueError) -> Self {
        match err {
            CritiqueError::Extraction(e) => match e {
                ExtractionError::NoTextDetected
                | ExtractionError::Converter(_)
                | ExtractionError::Renderer(_) => AppError::UnprocessableEntity(e.to_string()),
                ExtractionError::ConverterUnavailable | ExtractionError::RendererUnavailable => {
                    AppError::Unavailable(e.to_string())
                }
                ExtractionError::Vision(inner) => AppError::from(inner),
            },
            CritiqueError::Inference(e) => AppError::from(e),
            CritiqueError::Parse(e) => AppError::Llm(e.to_string()),
            CritiqueError::Session(e) => match e {
                SessionError::JobDescriptionEmpty => AppError::Validation(e.to_string()),
                SessionError::DocumentMissing
                | SessionError::JobMissing
                | SessionError::JobNotConfirmed
                | SessionError::PowerUpBusy { .. }
                | SessionError::Superseded => AppError::Conflict(e.to_string()),
            },
        }
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unauthorized => AppError::InferenceUnauthorized,
            other => AppError::Llm(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Unavailable(msg) => {
                tracing::warn!("Collaborator unavailable: {msg}");
                (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg.clone())
            }
            AppError::InferenceUnauthorized => {
                tracing::error!("Inference API rejected the configured credential");
                (
                    StatusCode::BAD_GATEWAY,
                    "INFERENCE_UNAUTHORIZED",
                    "The inference service rejected the API key; check GEMINI_API_KEY".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (StatusCode::BAD_GATEWAY, "LLM_ERROR", msg.clone())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critique::models::PowerUpKind;

    fn status_of(err: CritiqueError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_critique_error_status_mapping() {
        assert_eq!(
            status_of(ExtractionError::NoTextDetected.into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(ExtractionError::RendererUnavailable.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(LlmError::Unauthorized.into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(ExtractionError::Vision(LlmError::EmptyContent).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(SessionError::JobDescriptionEmpty.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                SessionError::PowerUpBusy {
                    active: PowerUpKind::Pitch
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(SessionError::Superseded.into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_unauthorized_has_distinct_code() {
        let err = AppError::from(CritiqueError::from(LlmError::Unauthorized));
        assert!(matches!(err, AppError::InferenceUnauthorized));
    }
}
