//! Repository for the `job_events` log.

use packforge_core::types::{DbId, Timestamp};
use sqlx::types::Json;

use crate::models::job_event::{JobEventQuery, JobEventRow};
use crate::DbPool;

/// Maximum page size for event listing.
const MAX_LIMIT: i64 = 200;

/// Default page size for event listing.
const DEFAULT_LIMIT: i64 = 50;

pub struct JobEventRepo;

impl JobEventRepo {
    /// Append one event. Returns the new row id.
    pub async fn insert(
        pool: &DbPool,
        event_type: &str,
        subject_id: Option<&str>,
        payload: &serde_json::Value,
        created_at: Timestamp,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO job_events (event_type, subject_id, payload, created_at) \
             VALUES (?1, ?2, ?3, ?4) RETURNING id",
        )
        .bind(event_type)
        .bind(subject_id)
        .bind(Json(payload))
        .bind(created_at)
        .fetch_one(pool)
        .await
    }

    /// Most recent events first, optionally filtered by subject.
    pub async fn list(pool: &DbPool, params: &JobEventQuery) -> Result<Vec<JobEventRow>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        sqlx::query_as::<_, JobEventRow>(
            "SELECT id, event_type, subject_id, payload, created_at FROM job_events \
             WHERE (?1 IS NULL OR subject_id = ?1) \
             ORDER BY id DESC LIMIT ?2",
        )
        .bind(params.subject_id.as_deref())
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
