//! Submission flow state machine.
//!
//! ```text
//! Idle --submit(has files)--> Analyzing --feedback--> Completed
//!                             Analyzing --error-----> Failed --retry--> Analyzing
//! ```
//!
//! `Completed` is terminal. Analysis itself runs outside the controller: `submit`
//! hands out an `AnalysisTicket`, and whoever runs the analysis reports back via
//! `resolve`. Results for stale attempts or cancelled tickets are dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::steps::{FnGate, LinearSteps};
use crate::submission::feedback::{AnalysisError, AnalysisRequest};
use crate::submission::models::{FeedbackResult, FileDescriptor, ScoreBand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Analyzing,
    Completed,
    Failed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("No files selected: upload at least one file to submit")]
    NoFiles,

    #[error("An analysis is already in progress")]
    AnalysisInProgress,

    #[error("Submission already completed")]
    AlreadyCompleted,

    #[error("Nothing to retry: submission is {0:?}")]
    NotFailed(Phase),

    #[error("Attachments and notes cannot change while {0:?}")]
    Locked(Phase),
}

/// Learner-editable part of a submission.
#[derive(Debug, Clone, Default)]
pub struct SubmissionDraft {
    pub attachments: Vec<FileDescriptor>,
    pub notes: Option<String>,
}

fn has_attachments(draft: &SubmissionDraft) -> bool {
    !draft.attachments.is_empty()
}

#[derive(Debug, Clone)]
enum Stage {
    Idle,
    Analyzing { attempt: u32 },
    Completed(FeedbackResult),
    Failed(AnalysisError),
}

impl Stage {
    fn phase(&self) -> Phase {
        match self {
            Stage::Idle => Phase::Idle,
            Stage::Analyzing { .. } => Phase::Analyzing,
            Stage::Completed(_) => Phase::Completed,
            Stage::Failed(_) => Phase::Failed,
        }
    }
}

/// Work order for one analysis attempt.
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    pub attempt: u32,
    pub request: AnalysisRequest,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    pub phase: Phase,
    pub attachments: Vec<FileDescriptor>,
    pub total_bytes: u64,
    pub notes: Option<String>,
    pub attempts: u32,
    pub can_submit: bool,
    pub feedback: Option<FeedbackResult>,
    pub band: Option<ScoreBand>,
    pub band_label: Option<&'static str>,
    pub error: Option<AnalysisError>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

pub struct SubmissionController {
    draft: SubmissionDraft,
    steps: LinearSteps<SubmissionDraft>,
    stage: Stage,
    attempts: u32,
    in_flight: Option<CancellationToken>,
    created_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl SubmissionController {
    pub fn new() -> Self {
        Self {
            draft: SubmissionDraft::default(),
            steps: LinearSteps::new().then(FnGate::new("attachments", has_attachments)),
            stage: Stage::Idle,
            attempts: 0,
            in_flight: None,
            created_at: Utc::now(),
            submitted_at: None,
            completed_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.stage.phase()
    }

    pub fn attachments(&self) -> &[FileDescriptor] {
        &self.draft.attachments
    }

    pub fn notes(&self) -> Option<&str> {
        self.draft.notes.as_deref()
    }

    /// Present only once the phase is `Completed`.
    pub fn feedback(&self) -> Option<&FeedbackResult> {
        match &self.stage {
            Stage::Completed(feedback) => Some(feedback),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<&AnalysisError> {
        match &self.stage {
            Stage::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Attachments and notes may change only in `Idle` or `Failed`.
    pub fn ensure_editable(&self) -> Result<(), SubmissionError> {
        match self.phase() {
            Phase::Idle | Phase::Failed => Ok(()),
            phase => Err(SubmissionError::Locked(phase)),
        }
    }

    /// Appends descriptors in order. No size or type checks happen here.
    pub fn add_files(
        &mut self,
        files: impl IntoIterator<Item = FileDescriptor>,
    ) -> Result<(), SubmissionError> {
        self.ensure_editable()?;
        self.draft.attachments.extend(files);
        Ok(())
    }

    /// Removes the attachment at `index`. Out-of-range indices are a no-op.
    pub fn remove_file(&mut self, index: usize) -> Result<Option<FileDescriptor>, SubmissionError> {
        self.ensure_editable()?;
        if index >= self.draft.attachments.len() {
            debug!(index, len = self.draft.attachments.len(), "Remove ignored: index out of range");
            return Ok(None);
        }
        Ok(Some(self.draft.attachments.remove(index)))
    }

    /// Blank notes are stored as absent.
    pub fn set_notes(&mut self, notes: &str) -> Result<(), SubmissionError> {
        self.ensure_editable()?;
        let trimmed = notes.trim();
        self.draft.notes = (!trimmed.is_empty()).then(|| trimmed.to_string());
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        matches!(self.phase(), Phase::Idle | Phase::Failed) && self.steps.all_satisfied(&self.draft)
    }

    /// Starts an analysis from `Idle` (or `Failed`, after edits).
    ///
    /// Rejected without any state change when there are no attachments, when an
    /// analysis is already running, or once the submission is completed.
    pub fn submit(&mut self) -> Result<AnalysisTicket, SubmissionError> {
        match self.phase() {
            Phase::Analyzing => return Err(SubmissionError::AnalysisInProgress),
            Phase::Completed => return Err(SubmissionError::AlreadyCompleted),
            Phase::Idle | Phase::Failed => {}
        }
        if !self.steps.all_satisfied(&self.draft) {
            return Err(SubmissionError::NoFiles);
        }
        Ok(self.start_analysis())
    }

    /// The user-visible retry action after a failed analysis.
    pub fn retry(&mut self) -> Result<AnalysisTicket, SubmissionError> {
        match self.phase() {
            Phase::Failed => self.submit(),
            phase => Err(SubmissionError::NotFailed(phase)),
        }
    }

    fn start_analysis(&mut self) -> AnalysisTicket {
        self.attempts += 1;
        let cancel = CancellationToken::new();
        if let Some(previous) = self.in_flight.replace(cancel.clone()) {
            previous.cancel();
        }
        self.stage = Stage::Analyzing {
            attempt: self.attempts,
        };
        self.submitted_at = Some(Utc::now());

        info!(
            attempt = self.attempts,
            files = self.draft.attachments.len(),
            "Submission entered analysis"
        );

        AnalysisTicket {
            attempt: self.attempts,
            request: AnalysisRequest {
                files: self.draft.attachments.clone(),
                notes: self.draft.notes.clone(),
            },
            cancel,
        }
    }

    /// Applies the outcome of analysis attempt `attempt`. Returns whether it was
    /// applied; outcomes for another attempt, a cancelled ticket, or a phase
    /// other than `Analyzing` are dropped.
    pub fn resolve(
        &mut self,
        attempt: u32,
        outcome: Result<FeedbackResult, AnalysisError>,
    ) -> bool {
        let current = match self.stage {
            Stage::Analyzing { attempt: current } => current,
            _ => {
                debug!(attempt, phase = ?self.phase(), "Dropping analysis outcome: not analyzing");
                return false;
            }
        };
        if current != attempt {
            debug!(attempt, current, "Dropping stale analysis outcome");
            return false;
        }
        if self.in_flight.as_ref().map_or(true, |t| t.is_cancelled()) {
            debug!(attempt, "Dropping analysis outcome for cancelled ticket");
            return false;
        }

        self.in_flight = None;
        match outcome {
            Ok(feedback) => {
                info!(attempt, overall_score = feedback.overall_score, "Analysis completed");
                self.completed_at = Some(Utc::now());
                self.stage = Stage::Completed(feedback);
            }
            Err(e) => {
                warn!(attempt, error = %e, "Analysis failed");
                self.stage = Stage::Failed(e);
            }
        }
        true
    }

    /// Cancels a running analysis; the submission moves to `Failed(Cancelled)`
    /// so it can be retried. Returns whether anything was cancelled.
    pub fn cancel_analysis(&mut self) -> bool {
        let Some(token) = self.in_flight.take() else {
            return false;
        };
        token.cancel();
        if self.phase() == Phase::Analyzing {
            self.stage = Stage::Failed(AnalysisError::Cancelled);
        }
        true
    }

    pub fn view(&self) -> SubmissionView {
        let feedback = self.feedback().cloned();
        SubmissionView {
            phase: self.phase(),
            attachments: self.draft.attachments.clone(),
            total_bytes: self.draft.attachments.iter().map(|f| f.size_bytes).sum(),
            notes: self.draft.notes.clone(),
            attempts: self.attempts,
            can_submit: self.can_submit(),
            band: feedback.as_ref().map(FeedbackResult::band),
            band_label: feedback.as_ref().map(|f| f.band().label()),
            feedback,
            error: self.last_error().cloned(),
            created_at: self.created_at,
            submitted_at: self.submitted_at,
            completed_at: self.completed_at,
        }
    }
}

impl Default for SubmissionController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SubmissionController {
    /// A dropped flow must never receive a late result.
    fn drop(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
    }
}
