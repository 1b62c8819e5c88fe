use axum::routing::{get, post};
use axum::Router;

use crate::handlers::packaging;
use crate::state::AppState;

/// Routes mounted at `/packaging`.
///
/// ```text
/// GET    /state                        -> packaging_state
/// POST   /panels/generate              -> generate_panel_texture
/// GET    /panels/{panel_id}/status     -> panel_status
/// GET    /panels/{panel_id}/texture    -> panel_texture
/// DELETE /panels/{panel_id}/texture    -> delete_panel_texture
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/state", get(packaging::packaging_state))
        .route("/panels/generate", post(packaging::generate_panel_texture))
        .route("/panels/{panel_id}/status", get(packaging::panel_status))
        .route(
            "/panels/{panel_id}/texture",
            get(packaging::panel_texture).delete(packaging::delete_panel_texture),
        )
}
