//! Feedback generation — pluggable, trait-based analysis of a submission.
//!
//! Default: `MockFeedbackGenerator` (waits a fixed delay, returns a canned payload).
//! Real analysis backends implement `FeedbackGenerator` and are swapped in at
//! startup; `AppState` holds an `Arc<dyn FeedbackGenerator>`.
//!
//! `analyze` wraps any backend with a per-attempt timeout, bounded retries with
//! exponential backoff, and cancellation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::submission::models::{CategoryScores, FeedbackResult, FileDescriptor};

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AnalysisError {
    #[error("Analysis timed out after {0}s")]
    Timeout(u64),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Feedback service unavailable: {0}")]
    Unavailable(String),

    #[error("Feedback payload rejected: {0}")]
    InvalidPayload(String),
}

impl AnalysisError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::Timeout(_) | AnalysisError::Unavailable(_))
    }
}

/// Everything the collaborator sees: the files and the learner's notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub files: Vec<FileDescriptor>,
    pub notes: Option<String>,
}

/// The feedback generator trait. Implement this to swap backends without
/// touching the controller or handlers.
#[async_trait]
pub trait FeedbackGenerator: Send + Sync {
    /// Short backend name, for logs.
    fn backend(&self) -> &'static str;

    async fn generate(&self, request: &AnalysisRequest) -> Result<FeedbackResult, AnalysisError>;
}

// ────────────────────────────────────────────────────────────────────────────
// MockFeedbackGenerator — default backend
// ────────────────────────────────────────────────────────────────────────────

/// Stand-in for a real analysis service: sleeps, then returns a fixed payload.
pub struct MockFeedbackGenerator {
    delay: Duration,
    payload: FeedbackResult,
}

impl MockFeedbackGenerator {
    pub fn new(delay: Duration) -> Self {
        Self::with_payload(delay, canned_feedback())
    }

    pub fn with_payload(delay: Duration, payload: FeedbackResult) -> Self {
        Self { delay, payload }
    }
}

#[async_trait]
impl FeedbackGenerator for MockFeedbackGenerator {
    fn backend(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, request: &AnalysisRequest) -> Result<FeedbackResult, AnalysisError> {
        debug!(
            files = request.files.len(),
            has_notes = request.notes.is_some(),
            delay_ms = self.delay.as_millis() as u64,
            "Mock analysis started"
        );
        tokio::time::sleep(self.delay).await;
        Ok(self.payload.clone())
    }
}

pub fn canned_feedback() -> FeedbackResult {
    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    FeedbackResult {
        overall_score: 85,
        category_scores: CategoryScores {
            composition: 88,
            color_theory: 82,
            typography: 90,
            technique: 85,
        },
        strengths: lines(&[
            "Excellent use of typographic contrast to establish clear hierarchy",
            "Strong grid alignment creates visual harmony",
            "Effective color palette supports readability",
            "Good spacing and white space utilization",
        ]),
        improvements: lines(&[
            "Consider increasing the contrast between secondary and tertiary text",
            "The body text could benefit from slightly increased line spacing",
            "Some elements could be aligned more precisely to the grid",
        ]),
        suggestions: lines(&[
            "Try using a more pronounced size difference between H1 and H2",
            "Consider using a different font weight for the secondary information",
            "Experiment with subtle color variations to enhance hierarchy",
        ]),
        instructor_note: "Strong foundation in typography principles. Focus on refining the \
                          details for professional-level work."
            .to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Timeout / retry / cancellation wrapper
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    /// First backoff delay; doubles on each further retry.
    pub backoff_base: Duration,
}

impl Default for AnalysisPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            backoff_base: Duration::from_millis(500),
        }
    }
}

impl AnalysisPolicy {
    fn backoff(&self, retry: u32) -> Duration {
        self.backoff_base * (1u32 << (retry - 1).min(16))
    }
}

/// Runs the generator under `policy`. Returns `Cancelled` as soon as `cancel`
/// fires, whether mid-call or mid-backoff.
pub async fn analyze(
    generator: &dyn FeedbackGenerator,
    request: &AnalysisRequest,
    policy: &AnalysisPolicy,
    cancel: &CancellationToken,
) -> Result<FeedbackResult, AnalysisError> {
    let mut last_error = AnalysisError::Unavailable("no attempt made".to_string());

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.backoff(attempt);
            warn!(
                backend = generator.backend(),
                attempt,
                error = %last_error,
                "Analysis attempt failed, retrying after {}ms...",
                delay.as_millis()
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
            res = tokio::time::timeout(policy.timeout, generator.generate(request)) => res,
        };

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::Timeout(policy.timeout.as_secs())),
        };

        match result {
            Ok(feedback) if !feedback.scores_in_range() => {
                return Err(AnalysisError::InvalidPayload(format!(
                    "score out of range (overall {})",
                    feedback.overall_score
                )));
            }
            Ok(feedback) => {
                debug!(
                    backend = generator.backend(),
                    attempt,
                    overall_score = feedback.overall_score,
                    "Analysis succeeded"
                );
                return Ok(feedback);
            }
            Err(e) if e.is_retryable() => last_error = e,
            Err(e) => return Err(e),
        }
    }

    Err(last_error)
}
