//! Axum route handlers for assignment submissions.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::submission::controller::{AnalysisTicket, SubmissionController, SubmissionView};
use crate::submission::feedback::analyze;
use crate::submission::models::{Assignment, FileDescriptor};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub id: Uuid,
    pub assignment_id: String,
    #[serde(flatten)]
    pub submission: SubmissionView,
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub accepted: Vec<FileDescriptor>,
    #[serde(flatten)]
    pub submission: SubmissionResponse,
}

async fn load(state: &AppState, id: Uuid) -> Result<Arc<Mutex<SubmissionController>>, AppError> {
    state
        .submissions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Submission {id} not found")))
}

fn respond(state: &AppState, id: Uuid, controller: &SubmissionController) -> SubmissionResponse {
    SubmissionResponse {
        id,
        assignment_id: state.assignment.id.clone(),
        submission: controller.view(),
    }
}

/// Runs the analysis for `ticket` off the request path and reports back to the
/// session. The task holds only a weak handle: once the session is dropped the
/// ticket is cancelled and the outcome is discarded.
fn spawn_analysis(
    state: &AppState,
    id: Uuid,
    session: &Arc<Mutex<SubmissionController>>,
    ticket: AnalysisTicket,
) {
    let generator = Arc::clone(&state.feedback);
    let policy = state.analysis_policy.clone();
    let session = Arc::downgrade(session);

    tokio::spawn(async move {
        let outcome = analyze(generator.as_ref(), &ticket.request, &policy, &ticket.cancel).await;

        let Some(session) = session.upgrade() else {
            debug!(submission_id = %id, attempt = ticket.attempt, "Submission gone; outcome discarded");
            return;
        };
        let applied = session.lock().await.resolve(ticket.attempt, outcome);
        debug!(submission_id = %id, attempt = ticket.attempt, applied, "Analysis task finished");
    });
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/assignment
pub async fn handle_assignment(State(state): State<AppState>) -> Json<Assignment> {
    Json(state.assignment.as_ref().clone())
}

/// POST /api/v1/submissions
pub async fn handle_start(
    State(state): State<AppState>,
) -> (StatusCode, Json<SubmissionResponse>) {
    let controller = SubmissionController::new();
    let view = controller.view();
    let id = state.submissions.insert(controller).await;
    info!(submission_id = %id, "Submission started");
    (
        StatusCode::CREATED,
        Json(SubmissionResponse {
            id,
            assignment_id: state.assignment.id.clone(),
            submission: view,
        }),
    )
}

/// GET /api/v1/submissions/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let session = load(&state, id).await?;
    let controller = session.lock().await;
    Ok(Json(respond(&state, id, &controller)))
}

/// POST /api/v1/submissions/:id/files
///
/// Multipart upload. Every part is run through the intake collaborator first;
/// one rejected part rejects the whole batch. A locked submission is refused
/// before the body is read.
pub async fn handle_upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let session = load(&state, id).await?;
    session.lock().await.ensure_editable()?;

    let mut accepted = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes: Bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read '{name}': {e}")))?;
        accepted.push(state.intake.describe(&name, &bytes)?);
    }

    if accepted.is_empty() {
        return Err(AppError::Validation("No files in upload".to_string()));
    }

    let mut controller = session.lock().await;
    controller.add_files(accepted.clone())?;
    info!(
        submission_id = %id,
        files = accepted.len(),
        total_files = controller.attachments().len(),
        "Files attached"
    );

    Ok(Json(UploadResponse {
        accepted,
        submission: respond(&state, id, &controller),
    }))
}

/// DELETE /api/v1/submissions/:id/files/:index
///
/// Out-of-range indices leave the submission unchanged.
pub async fn handle_remove_file(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let session = load(&state, id).await?;
    let mut controller = session.lock().await;
    controller.remove_file(index)?;
    Ok(Json(respond(&state, id, &controller)))
}

/// PUT /api/v1/submissions/:id/notes
pub async fn handle_set_notes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<NotesRequest>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let session = load(&state, id).await?;
    let mut controller = session.lock().await;
    controller.set_notes(&req.notes)?;
    debug!(submission_id = %id, has_notes = controller.notes().is_some(), "Notes updated");
    Ok(Json(respond(&state, id, &controller)))
}

/// POST /api/v1/submissions/:id/submit
///
/// Moves the submission to `analyzing` and returns immediately; poll
/// GET /api/v1/submissions/:id for the result.
pub async fn handle_submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SubmissionResponse>), AppError> {
    let session = load(&state, id).await?;
    let mut controller = session.lock().await;
    let ticket = controller.submit()?;
    info!(submission_id = %id, attempts = controller.attempts(), "Submission sent for analysis");
    spawn_analysis(&state, id, &session, ticket);
    Ok((StatusCode::ACCEPTED, Json(respond(&state, id, &controller))))
}

/// POST /api/v1/submissions/:id/retry
pub async fn handle_retry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SubmissionResponse>), AppError> {
    let session = load(&state, id).await?;
    let mut controller = session.lock().await;
    let ticket = controller.retry()?;
    info!(submission_id = %id, attempts = controller.attempts(), "Analysis retried");
    spawn_analysis(&state, id, &session, ticket);
    Ok((StatusCode::ACCEPTED, Json(respond(&state, id, &controller))))
}

/// DELETE /api/v1/submissions/:id
///
/// Abandons the flow; an in-flight analysis is cancelled and never applied.
pub async fn handle_abandon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let session = state
        .submissions
        .remove(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Submission {id} not found")))?;
    let cancelled = session.lock().await.cancel_analysis();
    info!(submission_id = %id, cancelled, "Submission abandoned");
    Ok(StatusCode::NO_CONTENT)
}
