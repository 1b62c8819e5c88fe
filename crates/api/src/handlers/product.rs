//! Handlers for the `/product` resource.
//!
//! Create and edit return 202 as soon as the job is claimed; clients poll
//! `/product/status` until it reports `complete` or `error`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use packforge_core::artifact::ArtifactKind;
use packforge_core::error::CoreError;
use packforge_core::protocol::{RecoverPayload, RewindPayload};
use packforge_core::subject::SubjectId;
use packforge_core::validation::{
    CREATE_PROMPT_MIN, EDIT_PROMPT_MIN, IMAGE_COUNT_MAX, IMAGE_COUNT_MIN, PROMPT_MAX,
};
use packforge_db::models::iteration::Iteration;
use packforge_db::models::job_record::JobRecord;
use packforge_pipeline::{ExportError, ExportFiles, ExportFormat, Exporter, JobPayload};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{accepted, artifact_response, validate_input};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

const DEFAULT_IMAGE_COUNT: u8 = 3;

fn default_image_count() -> u8 {
    DEFAULT_IMAGE_COUNT
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = CREATE_PROMPT_MIN, max = PROMPT_MAX))]
    pub prompt: String,
    #[serde(default = "default_image_count")]
    #[validate(range(min = IMAGE_COUNT_MIN, max = IMAGE_COUNT_MAX))]
    pub image_count: u8,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditProductRequest {
    #[validate(length(min = EDIT_PROMPT_MIN, max = PROMPT_MAX))]
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ExportPayload {
    pub files: ExportFiles,
}

#[derive(Debug, Serialize)]
pub struct ExportFilePayload {
    pub format: ExportFormat,
    pub reference: String,
}

/// Full product state: the job record plus its iteration history.
#[derive(Debug, Serialize)]
pub struct ProductState {
    #[serde(flatten)]
    pub record: JobRecord,
    pub iterations: Vec<Iteration>,
}

/// GET /api/v1/product
pub async fn get_product(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let subject = SubjectId::product();
    let record = state.orchestrator.status(&subject).await?;
    let iterations = state.orchestrator.history(&subject).await?;
    Ok(Json(DataResponse {
        data: ProductState { record, iterations },
    }))
}

/// GET /api/v1/product/status
pub async fn product_status(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let record = state.orchestrator.status(&SubjectId::product()).await?;
    Ok(Json(DataResponse {
        data: record.to_status_payload(),
    }))
}

/// POST /api/v1/product/create
///
/// Returns 202, or 409 if a job is already running for the product.
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProductRequest>,
) -> AppResult<impl IntoResponse> {
    validate_input(&input)?;
    let payload = JobPayload::Create {
        prompt: input.prompt.trim().to_string(),
        image_count: input.image_count,
    };
    let record = state
        .orchestrator
        .start_job(SubjectId::product(), payload)
        .await?;
    Ok(accepted(&record))
}

/// POST /api/v1/product/edit
///
/// Edits build on the active artifacts, so a product must exist.
pub async fn edit_product(
    State(state): State<AppState>,
    Json(input): Json<EditProductRequest>,
) -> AppResult<impl IntoResponse> {
    validate_input(&input)?;
    let payload = JobPayload::Edit {
        prompt: input.prompt.trim().to_string(),
    };
    let record = state
        .orchestrator
        .start_job(SubjectId::product(), payload)
        .await?;
    Ok(accepted(&record))
}

/// POST /api/v1/product/rewind/{index}
pub async fn rewind_product(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> AppResult<impl IntoResponse> {
    let subject = SubjectId::product();
    let (record, total_iterations) = state.orchestrator.rewind(&subject, index).await?;
    Ok(Json(DataResponse {
        data: RewindPayload {
            subject_id: subject,
            iteration_index: index,
            total_iterations,
            status: record.to_status_payload(),
        },
    }))
}

/// POST /api/v1/product/recover
pub async fn recover_product(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let subject = SubjectId::product();
    let (recovered, record) = state.orchestrator.recover(&subject).await?;
    Ok(Json(DataResponse {
        data: RecoverPayload {
            subject_id: subject,
            recovered,
            status: record.to_status_payload(),
        },
    }))
}

/// GET /api/v1/product/artifacts/{kind}
pub async fn product_artifact(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> AppResult<impl IntoResponse> {
    let kind: ArtifactKind = kind.parse()?;
    let payload = state
        .orchestrator
        .artifact(&SubjectId::product(), kind)
        .await?;
    Ok(artifact_response(payload))
}

/// DELETE /api/v1/product
///
/// Drops the active artifacts; history is kept.
pub async fn reset_product(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let record = state.orchestrator.clear(&SubjectId::product()).await?;
    Ok(Json(DataResponse {
        data: record.to_status_payload(),
    }))
}

/// The active model and the exporter to send it to.
async fn export_source(state: &AppState) -> AppResult<(Arc<dyn Exporter>, String)> {
    let subject = SubjectId::product();
    let record = state.orchestrator.status(&subject).await?;
    if record.is_in_progress() {
        return Err(CoreError::already_generating(subject.as_str()).into());
    }
    let model = record
        .current_artifact_refs
        .get(&ArtifactKind::Model)
        .cloned()
        .ok_or_else(|| AppError::BadRequest("No product model available for export".into()))?;
    let exporter = state
        .exporter
        .clone()
        .ok_or_else(|| AppError::Unavailable("Export service not configured".into()))?;
    Ok((exporter, model))
}

/// POST /api/v1/product/export
///
/// Exports the active model to every supported format.
pub async fn export_product(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let (exporter, model) = export_source(&state).await?;
    let files = exporter.export(&model, &ExportFormat::ALL).await?;
    Ok(Json(DataResponse {
        data: ExportPayload { files },
    }))
}

/// GET /api/v1/product/export/{format}
pub async fn export_product_format(
    State(state): State<AppState>,
    Path(format): Path<String>,
) -> AppResult<impl IntoResponse> {
    let format: ExportFormat = format.parse().map_err(AppError::BadRequest)?;
    let (exporter, model) = export_source(&state).await?;
    let reference = exporter
        .export(&model, &[format])
        .await?
        .remove(&format)
        .ok_or(ExportError::MissingFormat(format))?;
    Ok(Json(DataResponse {
        data: ExportFilePayload { format, reference },
    }))
}
