use axum::routing::{get, post};
use axum::Router;

use crate::handlers::product;
use crate::state::AppState;

/// Routes mounted at `/product`.
///
/// ```text
/// GET    /                    -> get_product
/// DELETE /                    -> reset_product
/// GET    /status              -> product_status
/// POST   /create              -> create_product
/// POST   /edit                -> edit_product
/// POST   /rewind/{index}      -> rewind_product
/// POST   /recover             -> recover_product
/// GET    /artifacts/{kind}    -> product_artifact
/// POST   /export              -> export_product
/// GET    /export/{format}     -> export_product_format
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(product::get_product).delete(product::reset_product))
        .route("/status", get(product::product_status))
        .route("/create", post(product::create_product))
        .route("/edit", post(product::edit_product))
        .route("/rewind/{index}", post(product::rewind_product))
        .route("/recover", post(product::recover_product))
        .route("/artifacts/{kind}", get(product::product_artifact))
        .route("/export", post(product::export_product))
        .route("/export/{format}", get(product::export_product_format))
}
