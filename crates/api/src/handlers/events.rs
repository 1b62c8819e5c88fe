use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use packforge_db::models::job_event::JobEventQuery;
use packforge_db::repositories::JobEventRepo;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/events
///
/// Most recent job lifecycle events first. Optional `subject_id` and
/// `limit` (default 50, max 200) query parameters.
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<JobEventQuery>,
) -> AppResult<impl IntoResponse> {
    let events = JobEventRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: events }))
}
