//! Orchestration: extraction → profile synthesis → analysis → power-ups.
//!
//! The session lock is held only while reading or committing state, never across
//! an inference call, so a later request can supersede one still in flight.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::critique::models::{AnalysisResult, CandidateProfile, PowerUpKind};
use crate::critique::prompts;
use crate::critique::session::{Session, SessionError};
use crate::ingest::{ExtractionError, Extractor, MediaKind, SourceDocument};
use crate::llm_client::tolerant_json::{self, ParseError};
use crate::llm_client::{ContentPart, InferenceMode, LlmClient, LlmError};

pub type SessionHandle = Arc<Mutex<Session>>;

fn note_superseded(operation: &str, err: SessionError) -> SessionError {
    if err == SessionError::Superseded {
        debug!("Dropping superseded {operation} result");
    }
    err
}

#[derive(Debug, Error)]
pub enum CritiqueError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Inference(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// What an upload produced.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub name: String,
    pub kind: MediaKind,
    pub characters: usize,
    pub profile: Option<CandidateProfile>,
}

pub struct Critic {
    llm: LlmClient,
    extractor: Extractor,
    salary_currency: String,
}

impl Critic {
    pub fn new(llm: LlmClient, extractor: Extractor, salary_currency: impl Into<String>) -> Self {
        Self {
            llm,
            extractor,
            salary_currency: salary_currency.into(),
        }
    }

    /// Extracts the document's text, then synthesizes a profile from it.
    ///
    /// Profile synthesis is best effort: its failures are logged and leave the
    /// profile empty. Returns `Superseded` if a newer upload started meanwhile.
    pub async fn upload_document(
        &self,
        session: &SessionHandle,
        document: SourceDocument,
    ) -> Result<UploadOutcome, CritiqueError> {
        let ticket = session.lock().await.begin_upload(&document);
        info!(
            "Upload started: '{}' ({} bytes, {})",
            document.name,
            document.bytes.len(),
            document.media_type
        );

        let text = match self.extractor.extract(&document).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Extraction failed for '{}': {}", document.name, e);
                session
                    .lock()
                    .await
                    .fail_upload(ticket)
                    .map_err(|e| note_superseded("upload", e))?;
                return Err(e.into());
            }
        };
        let characters = text.chars().count();
        session
            .lock()
            .await
            .commit_extraction(ticket, text.clone())
            .map_err(|e| note_superseded("extraction", e))?;

        let profile = self.synthesize_profile(&text).await;
        session
            .lock()
            .await
            .commit_profile(ticket, profile.clone())
            .map_err(|e| note_superseded("profile", e))?;

        info!(
            "Upload complete: '{}' ({} chars, profile={})",
            document.name,
            characters,
            profile.is_some()
        );
        Ok(UploadOutcome {
            name: document.name.clone(),
            kind: document.kind(),
            characters,
            profile,
        })
    }

    async fn synthesize_profile(&self, resume_text: &str) -> Option<CandidateProfile> {
        let system = prompts::profile_system();
        let result = self
            .llm
            .invoke_text(
                vec![ContentPart::text(resume_text)],
                &system,
                InferenceMode::Structured,
            )
            .await
            .map_err(CritiqueError::from)
            .and_then(|raw| tolerant_json::parse::<CandidateProfile>(&raw).map_err(Into::into));

        match result {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Profile synthesis failed, continuing without profile: {}", e);
                None
            }
        }
    }

    /// Scores the résumé against the confirmed job description.
    ///
    /// On failure the session returns to `JobConfirmed` and the caller may retry.
    pub async fn run_analysis(
        &self,
        session: &SessionHandle,
    ) -> Result<AnalysisResult, CritiqueError> {
        let (ticket, inputs) = session.lock().await.begin_analysis()?;
        info!(
            "Analysis started ({} résumé chars, {} job chars)",
            inputs.resume_text.len(),
            inputs.job_text.len()
        );

        let system = prompts::analysis_system(&self.salary_currency);
        let prompt = prompts::analysis_prompt(&inputs.resume_text, &inputs.job_text);
        let outcome = self
            .llm
            .invoke(
                vec![ContentPart::text(prompt)],
                &system,
                InferenceMode::SearchGrounded,
            )
            .await
            .map_err(CritiqueError::from)
            .and_then(|response| {
                let raw = response.text().unwrap_or_default();
                tolerant_json::parse::<AnalysisResult>(raw).map_err(Into::into)
            });

        match outcome {
            Ok(result) => {
                session
                    .lock()
                    .await
                    .finish_analysis(ticket, Some(result.clone()))
                    .map_err(|e| note_superseded("analysis", e))?;
                info!("Analysis complete: match={}%", result.match_percentage);
                Ok(result)
            }
            Err(e) => {
                warn!("Analysis failed: {}", e);
                session
                    .lock()
                    .await
                    .finish_analysis(ticket, None)
                    .map_err(|e| note_superseded("analysis", e))?;
                Err(e)
            }
        }
    }

    /// Generates one power-up. Rejected with `PowerUpBusy` while another is running.
    pub async fn run_power_up(
        &self,
        session: &SessionHandle,
        kind: PowerUpKind,
    ) -> Result<String, CritiqueError> {
        let (ticket, inputs) = session.lock().await.begin_power_up(kind)?;
        info!("Power-up '{}' started", kind);

        let prompt = prompts::power_up_prompt(&inputs.resume_text, &inputs.job_text, kind.request());
        let outcome = self
            .llm
            .invoke_text(
                vec![ContentPart::text(prompt)],
                prompts::POWER_UP_SYSTEM,
                InferenceMode::Structured,
            )
            .await;

        match outcome {
            Ok(text) => {
                session
                    .lock()
                    .await
                    .finish_power_up(ticket, Ok(text.clone()))
                    .map_err(|e| note_superseded("power-up", e))?;
                info!("Power-up '{}' complete ({} chars)", kind, text.len());
                Ok(text)
            }
            Err(e) => {
                warn!("Power-up '{}' failed: {}", ticket.kind(), e);
                session
                    .lock()
                    .await
                    .finish_power_up(ticket, Err(e.to_string()))
                    .map_err(|e| note_superseded("power-up", e))?;
                Err(e.into())
            }
        }
    }
}
