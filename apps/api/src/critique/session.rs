//! Session state machine.
//!
//! Every slot that async work writes into is guarded by an epoch. Work captures a
//! ticket (the epochs current at launch) and commits only if they are still
//! current, so the most recently started operation always wins.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::critique::models::{AnalysisResult, CandidateProfile, JobDescription, PowerUpKind};
use crate::ingest::{MediaKind, SourceDocument};

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Job description cannot be empty")]
    JobDescriptionEmpty,

    #[error("No résumé text is available; upload a document first")]
    DocumentMissing,

    #[error("No job description has been provided")]
    JobMissing,

    #[error("The job description must be confirmed first")]
    JobNotConfirmed,

    #[error("Power-up '{active}' is still running")]
    PowerUpBusy { active: PowerUpKind },

    #[error("A newer request superseded this one")]
    Superseded,
}

/// Main-flow state, derived from what the session holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Empty,
    DocumentUploading,
    DocumentReady,
    JobPending,
    JobConfirmed,
    AnalysisRunning,
    AnalysisReady,
}

/// Per-kind power-up sub-state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PowerUpState {
    Idle,
    Running,
    Done { text: String },
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    pub kind: MediaKind,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct UploadTicket {
    document_epoch: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct AnalysisTicket {
    document_epoch: u64,
    job_epoch: u64,
    analysis_epoch: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct PowerUpTicket {
    kind: PowerUpKind,
    document_epoch: u64,
}

impl PowerUpTicket {
    pub fn kind(&self) -> PowerUpKind {
        self.kind
    }
}

/// Inputs captured when an analysis or power-up starts.
#[derive(Debug, Clone)]
pub struct CritiqueInputs {
    pub resume_text: String,
    pub job_text: String,
}

/// Everything a client may read about a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub phase: SessionPhase,
    pub document: Option<DocumentInfo>,
    pub extracted_text: Option<String>,
    pub profile: Option<CandidateProfile>,
    pub job: Option<JobDescription>,
    pub analysis: Option<AnalysisResult>,
    pub power_ups: BTreeMap<PowerUpKind, PowerUpState>,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,

    document_epoch: u64,
    uploading: bool,
    document: Option<DocumentInfo>,
    extracted_text: Option<String>,
    profile: Option<CandidateProfile>,

    job_epoch: u64,
    job: Option<JobDescription>,

    analysis_epoch: u64,
    analysis_running: bool,
    analysis: Option<AnalysisResult>,

    power_ups: BTreeMap<PowerUpKind, PowerUpState>,
    active_power_up: Option<PowerUpKind>,
}

impl Session {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            document_epoch: 0,
            uploading: false,
            document: None,
            extracted_text: None,
            profile: None,
            job_epoch: 0,
            job: None,
            analysis_epoch: 0,
            analysis_running: false,
            analysis: None,
            power_ups: BTreeMap::new(),
            active_power_up: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.uploading {
            return SessionPhase::DocumentUploading;
        }
        if self.analysis_running {
            return SessionPhase::AnalysisRunning;
        }
        if self.analysis.is_some() {
            return SessionPhase::AnalysisReady;
        }
        if self.extracted_text.is_none() {
            return SessionPhase::Empty;
        }
        match &self.job {
            Some(job) if job.confirmed => SessionPhase::JobConfirmed,
            Some(_) => SessionPhase::JobPending,
            None => SessionPhase::DocumentReady,
        }
    }

    #[cfg(test)]
    pub fn extracted_text(&self) -> Option<&str> {
        self.extracted_text.as_deref()
    }

    #[cfg(test)]
    pub fn profile(&self) -> Option<&CandidateProfile> {
        self.profile.as_ref()
    }

    #[cfg(test)]
    pub fn job(&self) -> Option<&JobDescription> {
        self.job.as_ref()
    }

    #[cfg(test)]
    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn power_up(&self, kind: PowerUpKind) -> PowerUpState {
        self.power_ups
            .get(&kind)
            .cloned()
            .unwrap_or(PowerUpState::Idle)
    }

    // ── Document ────────────────────────────────────────────────────────────

    /// Starts a new upload. Valid from any state; drops every downstream result.
    pub fn begin_upload(&mut self, document: &SourceDocument) -> UploadTicket {
        self.document_epoch += 1;
        self.uploading = true;
        self.document = Some(DocumentInfo {
            name: document.name.clone(),
            kind: document.kind(),
            uploaded_at: Utc::now(),
        });
        self.extracted_text = None;
        self.profile = None;
        self.invalidate_analysis();
        self.power_ups.clear();
        // The in-flight power-up keeps the slot until its finish releases it.
        if let Some(active) = self.active_power_up {
            self.power_ups.insert(active, PowerUpState::Running);
        }

        UploadTicket {
            document_epoch: self.document_epoch,
        }
    }

    pub fn commit_extraction(
        &mut self,
        ticket: UploadTicket,
        text: String,
    ) -> Result<(), SessionError> {
        self.check_upload(ticket)?;
        self.extracted_text = Some(text);
        Ok(())
    }

    /// Finishes the upload. `None` means synthesis failed; the text is kept either way.
    pub fn commit_profile(
        &mut self,
        ticket: UploadTicket,
        profile: Option<CandidateProfile>,
    ) -> Result<(), SessionError> {
        self.check_upload(ticket)?;
        self.profile = profile;
        self.uploading = false;
        Ok(())
    }

    /// Ends a failed upload. Stale failures leave the newer upload untouched.
    pub fn fail_upload(&mut self, ticket: UploadTicket) -> Result<(), SessionError> {
        self.check_upload(ticket)?;
        self.uploading = false;
        Ok(())
    }

    fn check_upload(&self, ticket: UploadTicket) -> Result<(), SessionError> {
        if ticket.document_epoch == self.document_epoch {
            Ok(())
        } else {
            Err(SessionError::Superseded)
        }
    }

    // ── Job description ─────────────────────────────────────────────────────

    /// Freezes `text` as the job description and invalidates any analysis.
    pub fn confirm_job(&mut self, text: &str) -> Result<(), SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::JobDescriptionEmpty);
        }
        self.job = Some(JobDescription {
            text: text.to_string(),
            confirmed: true,
        });
        self.job_epoch += 1;
        self.invalidate_analysis();
        Ok(())
    }

    /// Reopens a confirmed job description for editing.
    pub fn reopen_job(&mut self) -> Result<(), SessionError> {
        let job = self.job.as_mut().ok_or(SessionError::JobMissing)?;
        if !job.confirmed {
            return Err(SessionError::JobNotConfirmed);
        }
        job.confirmed = false;
        self.job_epoch += 1;
        self.invalidate_analysis();
        Ok(())
    }

    // ── Analysis ────────────────────────────────────────────────────────────

    /// Starts an analysis. A later start supersedes an earlier one still in flight.
    pub fn begin_analysis(&mut self) -> Result<(AnalysisTicket, CritiqueInputs), SessionError> {
        let resume_text = self
            .extracted_text
            .clone()
            .ok_or(SessionError::DocumentMissing)?;
        let job = self.job.as_ref().ok_or(SessionError::JobMissing)?;
        if !job.confirmed {
            return Err(SessionError::JobNotConfirmed);
        }
        let job_text = job.text.clone();

        self.analysis_epoch += 1;
        self.analysis_running = true;
        self.analysis = None;

        Ok((
            AnalysisTicket {
                document_epoch: self.document_epoch,
                job_epoch: self.job_epoch,
                analysis_epoch: self.analysis_epoch,
            },
            CritiqueInputs {
                resume_text,
                job_text,
            },
        ))
    }

    /// Stores the result (or clears the running flag on failure) if still current.
    pub fn finish_analysis(
        &mut self,
        ticket: AnalysisTicket,
        result: Option<AnalysisResult>,
    ) -> Result<(), SessionError> {
        let current = ticket.document_epoch == self.document_epoch
            && ticket.job_epoch == self.job_epoch
            && ticket.analysis_epoch == self.analysis_epoch;
        if !current {
            return Err(SessionError::Superseded);
        }
        self.analysis_running = false;
        self.analysis = result;
        Ok(())
    }

    fn invalidate_analysis(&mut self) {
        self.analysis_epoch += 1;
        self.analysis_running = false;
        self.analysis = None;
    }

    // ── Power-ups ───────────────────────────────────────────────────────────

    /// Starts a power-up. Needs résumé text and a job description (confirmed or not).
    /// Only one power-up runs at a time.
    pub fn begin_power_up(
        &mut self,
        kind: PowerUpKind,
    ) -> Result<(PowerUpTicket, CritiqueInputs), SessionError> {
        let resume_text = self
            .extracted_text
            .clone()
            .ok_or(SessionError::DocumentMissing)?;
        let job_text = self
            .job
            .as_ref()
            .map(|job| job.text.clone())
            .ok_or(SessionError::JobMissing)?;
        if let Some(active) = self.active_power_up {
            return Err(SessionError::PowerUpBusy { active });
        }

        self.active_power_up = Some(kind);
        self.power_ups.insert(kind, PowerUpState::Running);

        Ok((
            PowerUpTicket {
                kind,
                document_epoch: self.document_epoch,
            },
            CritiqueInputs {
                resume_text,
                job_text,
            },
        ))
    }

    /// Releases the power-up slot and records the outcome if the document is unchanged.
    pub fn finish_power_up(
        &mut self,
        ticket: PowerUpTicket,
        outcome: Result<String, String>,
    ) -> Result<(), SessionError> {
        let released = self.active_power_up == Some(ticket.kind);
        if released {
            self.active_power_up = None;
        }
        if ticket.document_epoch != self.document_epoch {
            if released {
                self.power_ups.remove(&ticket.kind);
            }
            return Err(SessionError::Superseded);
        }

        let state = match outcome {
            Ok(text) => PowerUpState::Done { text },
            Err(message) => PowerUpState::Failed { message },
        };
        self.power_ups.insert(ticket.kind, state);
        Ok(())
    }

    /// Clears one power-up output without touching the others.
    pub fn clear_power_up(&mut self, kind: PowerUpKind) -> Result<(), SessionError> {
        if self.active_power_up == Some(kind) {
            return Err(SessionError::PowerUpBusy { active: kind });
        }
        self.power_ups.remove(&kind);
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            created_at: self.created_at,
            phase: self.phase(),
            document: self.document.clone(),
            extracted_text: self.extracted_text.clone(),
            profile: self.profile.clone(),
            job: self.job.clone(),
            analysis: self.analysis.clone(),
            power_ups: PowerUpKind::ALL
                .iter()
                .map(|kind| (*kind, self.power_up(*kind)))
                .collect(),
        }
    }
}
