pub mod demo;
pub mod events;
pub mod health;
pub mod packaging;
pub mod product;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /product                                   get state, reset (DELETE)
/// /product/status                            poll status
/// /product/create                            start create (POST, 202)
/// /product/edit                              start edit (POST, 202)
/// /product/rewind/{index}                    rewind (POST)
/// /product/recover                           reconcile stale job (POST)
/// /product/artifacts/{kind}                  artifact reference (200/202/404)
/// /product/export                            export every format (POST)
/// /product/export/{format}                   export one format
///
/// /packaging/state                           every panel record
/// /packaging/panels/generate                 start texture (POST, 202)
/// /packaging/panels/{panel_id}/status        poll status
/// /packaging/panels/{panel_id}/texture       texture reference, discard (DELETE)
///
/// /events                                    job event log
///
/// /demo/seed-product                         seed product (POST)
/// /demo/seed-packaging                       seed panel textures (POST)
/// /demo/seed-from-fixtures                   seed from fixtures file (POST)
/// /demo/clear                                reset everything (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/product", product::router())
        .nest("/packaging", packaging::router())
        .nest("/events", events::router())
        .nest("/demo", demo::router())
}
