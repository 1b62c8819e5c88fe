pub mod demo;
pub mod events;
pub mod packaging;
pub mod product;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use packforge_core::protocol::{AcceptedPayload, ArtifactPayload};
use packforge_db::models::job_record::JobRecord;
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;

/// Run `validator` rules on a request body.
fn validate_input<T: Validate>(input: &T) -> AppResult<()> {
    input.validate()?;
    Ok(())
}

/// 202 acknowledgement for a job that was started.
fn accepted(record: &JobRecord) -> Response {
    let payload = AcceptedPayload {
        subject_id: record.subject_id.clone(),
        accepted: true,
        status: record.to_status_payload(),
    };
    (StatusCode::ACCEPTED, Json(DataResponse { data: payload })).into_response()
}

/// 200 with the reference when ready, 202 while a job is running.
fn artifact_response(payload: ArtifactPayload) -> Response {
    let status = match payload {
        ArtifactPayload::Ready { .. } => StatusCode::OK,
        ArtifactPayload::NotReady { .. } => StatusCode::ACCEPTED,
    };
    (status, Json(DataResponse { data: payload })).into_response()
}
