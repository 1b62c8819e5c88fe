use axum::routing::post;
use axum::Router;

use crate::handlers::demo;
use crate::state::AppState;

/// Routes mounted at `/demo`.
///
/// ```text
/// POST   /seed-product          -> seed_product
/// POST   /seed-packaging        -> seed_packaging
/// POST   /seed-from-fixtures    -> seed_from_fixtures
/// POST   /clear                 -> clear_demo
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/seed-product", post(demo::seed_product))
        .route("/seed-packaging", post(demo::seed_packaging))
        .route("/seed-from-fixtures", post(demo::seed_from_fixtures))
        .route("/clear", post(demo::clear_demo))
}
