use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::critique::critic::{CritiqueError, SessionHandle, UploadOutcome};
use crate::critique::models::{AnalysisResult, PowerUpKind};
use crate::critique::session::SessionSnapshot;
use crate::errors::AppError;
use crate::ingest::{media_type_for_file_name, SourceDocument, OCTET_STREAM};
use crate::state::AppState;

const FILE_FIELD: &str = "file";

#[derive(Deserialize)]
pub struct JobRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct PowerUpResponse {
    pub kind: PowerUpKind,
    pub text: String,
}

async fn session_or_404(state: &AppState, id: Uuid) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

/// Runs `work` on its own task so a dropped connection does not abandon it midway.
async fn detached<T, F>(work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: std::future::Future<Output = Result<T, CritiqueError>> + Send + 'static,
{
    let result = tokio::spawn(work)
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
    Ok(result?)
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionSnapshot>) {
    let (id, handle) = state.sessions.create().await;
    info!(
        "Session {id} created ({} active)",
        state.sessions.len().await
    );
    let snapshot = handle.lock().await.snapshot();
    (StatusCode::CREATED, Json(snapshot))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = session_or_404(&state, id).await?;
    let snapshot = session.lock().await.snapshot();
    Ok(Json(snapshot))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(id).await {
        info!("Session {id} ended");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {id} not found")))
    }
}

/// POST /api/v1/sessions/:id/document
///
/// Multipart upload; the résumé is the `file` field.
pub async fn handle_upload_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<UploadOutcome>, AppError> {
    let session = session_or_404(&state, id).await?;

    let mut document = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let media_type = field
            .content_type()
            .filter(|ct| !ct.is_empty() && *ct != OCTET_STREAM)
            .map(str::to_string)
            .or_else(|| media_type_for_file_name(&name).map(str::to_string))
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
        document = Some(SourceDocument::new(name, media_type, bytes));
        break;
    }

    let document = document
        .ok_or_else(|| AppError::Validation(format!("Missing multipart field '{FILE_FIELD}'")))?;

    let critic = state.critic.clone();
    let outcome = detached(async move { critic.upload_document(&session, document).await }).await?;
    Ok(Json(outcome))
}

/// PUT /api/v1/sessions/:id/job
pub async fn handle_confirm_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<JobRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = session_or_404(&state, id).await?;
    let mut guard = session.lock().await;
    guard.confirm_job(&req.text).map_err(CritiqueError::from)?;
    Ok(Json(guard.snapshot()))
}

/// POST /api/v1/sessions/:id/job/reopen
pub async fn handle_reopen_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = session_or_404(&state, id).await?;
    let mut guard = session.lock().await;
    guard.reopen_job().map_err(CritiqueError::from)?;
    Ok(Json(guard.snapshot()))
}

/// POST /api/v1/sessions/:id/analysis
pub async fn handle_run_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisResult>, AppError> {
    let session = session_or_404(&state, id).await?;
    let critic = state.critic.clone();
    let result = detached(async move { critic.run_analysis(&session).await }).await?;
    Ok(Json(result))
}

/// POST /api/v1/sessions/:id/power-ups/:kind
pub async fn handle_run_power_up(
    State(state): State<AppState>,
    Path((id, kind)): Path<(Uuid, PowerUpKind)>,
) -> Result<Json<PowerUpResponse>, AppError> {
    let session = session_or_404(&state, id).await?;
    let critic = state.critic.clone();
    let text = detached(async move { critic.run_power_up(&session, kind).await }).await?;
    Ok(Json(PowerUpResponse { kind, text }))
}

/// DELETE /api/v1/sessions/:id/power-ups/:kind
pub async fn handle_clear_power_up(
    State(state): State<AppState>,
    Path((id, kind)): Path<(Uuid, PowerUpKind)>,
) -> Result<StatusCode, AppError> {
    let session = session_or_404(&state, id).await?;
    session
        .lock()
        .await
        .clear_power_up(kind)
        .map_err(CritiqueError::from)?;
    Ok(StatusCode::NO_CONTENT)
}
