use axum::routing::get;
use axum::Router;

use crate::handlers::events;
use crate::state::AppState;

/// Routes mounted at `/events`.
///
/// ```text
/// GET    /    -> list_events (?subject_id, ?limit)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(events::list_events))
}
