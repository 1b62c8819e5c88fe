//! Repository for the append-only `iterations` table.
//!
//! Rows are only ever inserted, inside the transaction that completes the
//! owning job (see [`JobRecordRepo`](super::JobRecordRepo)).

use packforge_core::subject::SubjectId;
use packforge_core::types::{IterationId, Timestamp};
use sqlx::types::Json;
use sqlx::SqliteConnection;

use crate::models::iteration::{Iteration, IterationRow, NewIteration};
use crate::DbPool;

/// Column list for `iterations` queries.
const COLUMNS: &str = "\
    id, subject_id, kind_id, prompt, artifact_refs, note, duration_seconds, created_at";

pub struct IterationRepo;

impl IterationRepo {
    /// Insert an iteration on an open connection (normally a transaction).
    pub(crate) async fn insert(
        conn: &mut SqliteConnection,
        id: IterationId,
        subject: &SubjectId,
        new: &NewIteration,
        created_at: Timestamp,
    ) -> Result<Iteration, sqlx::Error> {
        let query = format!(
            "INSERT INTO iterations \
                 (id, subject_id, kind_id, prompt, artifact_refs, note, duration_seconds, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, IterationRow>(&query)
            .bind(id)
            .bind(subject.as_str())
            .bind(new.kind.id())
            .bind(&new.prompt)
            .bind(Json(&new.artifact_refs))
            .bind(&new.note)
            .bind(new.duration_seconds)
            .bind(created_at)
            .fetch_one(conn)
            .await?;
        Iteration::try_from(row)
    }

    /// All iterations of a subject, oldest first.
    pub async fn list_for_subject(
        pool: &DbPool,
        subject: &SubjectId,
    ) -> Result<Vec<Iteration>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM iterations WHERE subject_id = ?1 ORDER BY seq ASC"
        );
        sqlx::query_as::<_, IterationRow>(&query)
            .bind(subject.as_str())
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(Iteration::try_from)
            .collect()
    }

    /// The iteration at a 0-based position in the subject's history.
    pub async fn find_by_index(
        pool: &DbPool,
        subject: &SubjectId,
        index: usize,
    ) -> Result<Option<Iteration>, sqlx::Error> {
        let Ok(offset) = i64::try_from(index) else {
            return Ok(None);
        };
        let query = format!(
            "SELECT {COLUMNS} FROM iterations WHERE subject_id = ?1 \
             ORDER BY seq ASC LIMIT 1 OFFSET ?2"
        );
        sqlx::query_as::<_, IterationRow>(&query)
            .bind(subject.as_str())
            .bind(offset)
            .fetch_optional(pool)
            .await?
            .map(Iteration::try_from)
            .transpose()
    }

    pub async fn count_for_subject(pool: &DbPool, subject: &SubjectId) -> Result<usize, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM iterations WHERE subject_id = ?1")
            .bind(subject.as_str())
            .fetch_one(pool)
            .await?;
        Ok(count.max(0) as usize)
    }
}
