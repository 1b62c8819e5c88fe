//! Handlers for the `/packaging` resource: one job subject per panel.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use packforge_core::artifact::ArtifactKind;
use packforge_core::subject::SubjectId;
use packforge_core::validation::{validate_package_type, EDIT_PROMPT_MIN, PROMPT_MAX};
use packforge_db::models::job_record::JobRecord;
use packforge_pipeline::{Dimensions, JobPayload};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{accepted, artifact_response, validate_input};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct GeneratePanelRequest {
    pub panel_id: String,
    #[validate(length(min = EDIT_PROMPT_MIN, max = PROMPT_MAX))]
    pub prompt: String,
    #[validate(custom(function = validate_package_type))]
    pub package_type: String,
    pub panel_dimensions: Dimensions,
    pub package_dimensions: Dimensions,
}

#[derive(Debug, Serialize)]
pub struct PackagingState {
    pub panels: Vec<JobRecord>,
}

fn check_dimensions(name: &str, dims: &Dimensions) -> AppResult<()> {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if positive(dims.width) && positive(dims.height) && dims.depth.map_or(true, positive) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "{name} must be positive finite numbers"
        )))
    }
}

/// GET /api/v1/packaging/state
pub async fn packaging_state(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let panels = state.orchestrator.panels().await?;
    Ok(Json(DataResponse {
        data: PackagingState { panels },
    }))
}

/// POST /api/v1/packaging/panels/generate
///
/// Returns 202, or 409 if the panel already has a job running. Other panels
/// are unaffected.
pub async fn generate_panel_texture(
    State(state): State<AppState>,
    Json(input): Json<GeneratePanelRequest>,
) -> AppResult<impl IntoResponse> {
    validate_input(&input)?;
    check_dimensions("panel_dimensions", &input.panel_dimensions)?;
    check_dimensions("package_dimensions", &input.package_dimensions)?;
    let subject = SubjectId::panel(&input.panel_id)?;

    let payload = JobPayload::PanelTexture {
        prompt: input.prompt.trim().to_string(),
        package_type: input.package_type,
        panel_dimensions: input.panel_dimensions,
        package_dimensions: input.package_dimensions,
    };
    let record = state.orchestrator.start_job(subject, payload).await?;
    Ok(accepted(&record))
}

/// GET /api/v1/packaging/panels/{panel_id}/status
pub async fn panel_status(
    State(state): State<AppState>,
    Path(panel_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let subject = SubjectId::panel(&panel_id)?;
    let record = state.orchestrator.status(&subject).await?;
    Ok(Json(DataResponse {
        data: record.to_status_payload(),
    }))
}

/// GET /api/v1/packaging/panels/{panel_id}/texture
///
/// 200 with the reference, 202 while generating, 404 if none exists.
pub async fn panel_texture(
    State(state): State<AppState>,
    Path(panel_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let subject = SubjectId::panel(&panel_id)?;
    let payload = state
        .orchestrator
        .artifact(&subject, ArtifactKind::Texture)
        .await?;
    Ok(artifact_response(payload))
}

/// DELETE /api/v1/packaging/panels/{panel_id}/texture
pub async fn delete_panel_texture(
    State(state): State<AppState>,
    Path(panel_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let subject = SubjectId::panel(&panel_id)?;
    let record = state.orchestrator.clear(&subject).await?;
    Ok(Json(DataResponse {
        data: record.to_status_payload(),
    }))
}
