//! Job event log models.

use packforge_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `job_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobEventRow {
    pub id: DbId,
    pub event_type: String,
    pub subject_id: Option<String>,
    pub payload: Json<serde_json::Value>,
    pub created_at: Timestamp,
}

/// Query parameters for `GET /api/v1/events`.
#[derive(Debug, Default, Deserialize)]
pub struct JobEventQuery {
    /// Restrict to one subject (e.g. `product`, `panel:front`).
    pub subject_id: Option<String>,
    /// Maximum number of results. Defaults to 50, capped at 200.
    pub limit: Option<i64>,
}
