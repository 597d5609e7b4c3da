//! Axum route handlers for the skill assessment wizard.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::assessment::skills::{find_skill, is_known_goal, SkillCategory, SkillLevel, GOAL_OPTIONS};
use crate::assessment::wizard::{AssessmentProfile, StepWizardController, WizardView};
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AssessmentOptions {
    pub categories: Vec<SkillCategory>,
    pub levels: Vec<SkillLevel>,
    pub goals: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AssessmentResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub wizard: WizardView,
}

#[derive(Debug, Deserialize)]
pub struct SelectLevelRequest {
    pub level: SkillLevel,
}

#[derive(Debug, Deserialize)]
pub struct ToggleGoalRequest {
    pub goal: String,
}

#[derive(Debug, Serialize)]
pub struct FinishResponse {
    pub id: Uuid,
    pub profile: AssessmentProfile,
}

async fn load(state: &AppState, id: Uuid) -> Result<Arc<Mutex<StepWizardController>>, AppError> {
    state
        .assessments
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Assessment {id} not found")))
}

fn respond(id: Uuid, wizard: &StepWizardController) -> Json<AssessmentResponse> {
    Json(AssessmentResponse {
        id,
        wizard: wizard.view(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/assessments/options
pub async fn handle_options(State(state): State<AppState>) -> Json<AssessmentOptions> {
    Json(AssessmentOptions {
        categories: state.categories.as_ref().clone(),
        levels: SkillLevel::ALL.to_vec(),
        goals: GOAL_OPTIONS.iter().map(|g| g.to_string()).collect(),
    })
}

/// POST /api/v1/assessments
pub async fn handle_start(
    State(state): State<AppState>,
) -> (StatusCode, Json<AssessmentResponse>) {
    let wizard = StepWizardController::new(state.categories.as_ref().clone());
    let view = wizard.view();
    let id = state.assessments.insert(wizard).await;
    info!(assessment_id = %id, "Assessment started");
    (StatusCode::CREATED, Json(AssessmentResponse { id, wizard: view }))
}

/// GET /api/v1/assessments/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AssessmentResponse>, AppError> {
    let session = load(&state, id).await?;
    let wizard = session.lock().await;
    Ok(respond(id, &wizard))
}

/// PUT /api/v1/assessments/:id/skills/:skill_id
pub async fn handle_select_level(
    State(state): State<AppState>,
    Path((id, skill_id)): Path<(Uuid, String)>,
    Json(req): Json<SelectLevelRequest>,
) -> Result<Json<AssessmentResponse>, AppError> {
    let session = load(&state, id).await?;
    let mut wizard = session.lock().await;
    if find_skill(wizard.categories(), &skill_id).is_none() {
        return Err(AppError::Validation(format!("Unknown skill '{skill_id}'")));
    }
    wizard.select_level(&skill_id, req.level);
    Ok(respond(id, &wizard))
}

/// POST /api/v1/assessments/:id/goals
///
/// Toggles membership of one goal.
pub async fn handle_toggle_goal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ToggleGoalRequest>,
) -> Result<Json<AssessmentResponse>, AppError> {
    if !is_known_goal(&req.goal) {
        return Err(AppError::Validation(format!("Unknown goal '{}'", req.goal)));
    }
    let session = load(&state, id).await?;
    let mut wizard = session.lock().await;
    wizard.toggle_goal(&req.goal);
    Ok(respond(id, &wizard))
}

/// POST /api/v1/assessments/:id/advance
///
/// An incomplete step is not an error: the unchanged view comes back.
pub async fn handle_advance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AssessmentResponse>, AppError> {
    let session = load(&state, id).await?;
    let mut wizard = session.lock().await;
    wizard.advance();
    Ok(respond(id, &wizard))
}

/// POST /api/v1/assessments/:id/retreat
pub async fn handle_retreat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AssessmentResponse>, AppError> {
    let session = load(&state, id).await?;
    let mut wizard = session.lock().await;
    wizard.retreat();
    Ok(respond(id, &wizard))
}

/// POST /api/v1/assessments/:id/finish
///
/// Returns the profile and closes the session.
pub async fn handle_finish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FinishResponse>, AppError> {
    let session = load(&state, id).await?;
    let profile = session.lock().await.finish()?;
    state.assessments.remove(id).await;
    info!(
        assessment_id = %id,
        goals = profile.goals.len(),
        "Assessment completed"
    );
    Ok(Json(FinishResponse { id, profile }))
}

/// DELETE /api/v1/assessments/:id
pub async fn handle_abandon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .assessments
        .remove(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Assessment {id} not found")))?;
    info!(assessment_id = %id, "Assessment abandoned");
    Ok(StatusCode::NO_CONTENT)
}
