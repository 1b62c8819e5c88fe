//! Repository for the `job_records` table.
//!
//! Every status change goes through a conditional `UPDATE ... WHERE
//! status_id = ?` so that concurrent writers cannot both win; callers learn
//! the outcome from `rows_affected`. The terminal transition of a job and the
//! append of its iteration share one transaction.

use chrono::Utc;
use packforge_core::artifact::ArtifactRefs;
use packforge_core::job_events::INTERRUPTED_ERROR;
use packforge_core::status::JobStatus;
use packforge_core::subject::SubjectId;
use packforge_core::types::IterationId;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::iteration::{Iteration, NewIteration};
use crate::models::job_record::{JobRecord, JobRecordRow, StatusTransition};
use crate::repositories::IterationRepo;
use crate::DbPool;

/// Column list for `job_records` queries.
const COLUMNS: &str = "\
    subject_id, status_id, job_kind_id, progress, message, last_error, \
    current_artifact_refs, current_iteration_id, started_at, created_at, updated_at";

/// Message recorded when a job completes.
const MSG_COMPLETE: &str = "Generation complete";
/// Message recorded when a job is reconciled after a crash or restart.
const MSG_INTERRUPTED: &str = "Recovered from interrupted generation";
/// Message recorded on rewind.
const MSG_REWOUND: &str = "Rewound to previous version";
/// Message recorded when artifacts are cleared.
const MSG_CLEARED: &str = "Cleared";

/// Outcome of [`JobRecordRepo::rewind`].
#[derive(Debug, Clone, PartialEq)]
pub enum RewindOutcome {
    /// The active state now points at the requested iteration.
    Rewound {
        record: JobRecord,
        total_iterations: usize,
    },
    /// The subject has a job in flight.
    InProgress,
    /// No iteration exists at that index.
    IndexOutOfRange { total_iterations: usize },
}

/// Outcome of [`JobRecordRepo::clear_artifacts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    /// Nothing stored for the subject yet.
    NothingStored,
    /// The subject has a job in flight.
    InProgress,
}

/// Keyed store of per-subject job records.
pub struct JobRecordRepo;

impl JobRecordRepo {
    /// Find the stored record for a subject.
    pub async fn find(pool: &DbPool, subject: &SubjectId) -> Result<Option<JobRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM job_records WHERE subject_id = ?1");
        sqlx::query_as::<_, JobRecordRow>(&query)
            .bind(subject.as_str())
            .fetch_optional(pool)
            .await?
            .map(JobRecord::try_from)
            .transpose()
    }

    /// Get the record for a subject, or the idle zero-value if none exists.
    pub async fn get(pool: &DbPool, subject: &SubjectId) -> Result<JobRecord, sqlx::Error> {
        Ok(Self::find(pool, subject)
            .await?
            .unwrap_or_else(|| JobRecord::idle(subject.clone())))
    }

    /// List records whose subject id starts with `prefix`, ordered by subject.
    pub async fn list_by_prefix(pool: &DbPool, prefix: &str) -> Result<Vec<JobRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM job_records \
             WHERE substr(subject_id, 1, length(?1)) = ?1 \
             ORDER BY subject_id"
        );
        sqlx::query_as::<_, JobRecordRow>(&query)
            .bind(prefix)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(JobRecord::try_from)
            .collect()
    }

    /// Atomically move a subject from `expected` to `transition.next`.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// stored status was not `expected`. A subject with no row counts as
    /// `idle`, so claiming an unknown subject inserts its record.
    pub async fn compare_and_swap_status(
        pool: &DbPool,
        subject: &SubjectId,
        expected: JobStatus,
        transition: &StatusTransition,
    ) -> Result<bool, sqlx::Error> {
        let now = Utc::now();
        let started_at = transition.starts_job().then_some(now);

        let result = if expected == JobStatus::Idle {
            sqlx::query(
                "INSERT INTO job_records \
                     (subject_id, status_id, job_kind_id, progress, message, last_error, \
                      started_at, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, 0, ?5, ?6, ?7, ?8, ?8) \
                 ON CONFLICT(subject_id) DO UPDATE SET \
                     status_id = excluded.status_id, \
                     job_kind_id = COALESCE(excluded.job_kind_id, job_records.job_kind_id), \
                     progress = CASE WHEN ?4 THEN 0 ELSE job_records.progress END, \
                     message = excluded.message, \
                     last_error = excluded.last_error, \
                     started_at = excluded.started_at, \
                     updated_at = excluded.updated_at \
                 WHERE job_records.status_id = ?9",
            )
            .bind(subject.as_str())
            .bind(transition.next.id())
            .bind(transition.job_kind.map(|k| k.id()))
            .bind(transition.starts_job())
            .bind(&transition.message)
            .bind(&transition.last_error)
            .bind(started_at)
            .bind(now)
            .bind(expected.id())
            .execute(pool)
            .await?
        } else {
            sqlx::query(
                "UPDATE job_records SET \
                     status_id = ?2, \
                     job_kind_id = COALESCE(?3, job_kind_id), \
                     progress = CASE WHEN ?4 THEN 0 ELSE progress END, \
                     message = ?5, \
                     last_error = ?6, \
                     started_at = ?7, \
                     updated_at = ?8 \
                 WHERE subject_id = ?1 AND status_id = ?9",
            )
            .bind(subject.as_str())
            .bind(transition.next.id())
            .bind(transition.job_kind.map(|k| k.id()))
            .bind(transition.starts_job())
            .bind(&transition.message)
            .bind(&transition.last_error)
            .bind(started_at)
            .bind(now)
            .bind(expected.id())
            .execute(pool)
            .await?
        };

        Ok(result.rows_affected() > 0)
    }

    /// Record a progress milestone for an in-flight job.
    ///
    /// Progress never decreases: a lower percentage only updates the message.
    /// Returns `false` if the subject is not `in_progress`.
    pub async fn update_progress(
        pool: &DbPool,
        subject: &SubjectId,
        percent: u8,
        message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE job_records \
             SET progress = MAX(progress, ?2), message = ?3, updated_at = ?4 \
             WHERE subject_id = ?1 AND status_id = ?5",
        )
        .bind(subject.as_str())
        .bind(i16::from(percent.min(100)))
        .bind(message)
        .bind(Utc::now())
        .bind(JobStatus::InProgress.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Complete an in-flight job: append its iteration and point the record
    /// at it in one transaction.
    ///
    /// Returns `None` (and writes nothing) if the subject is no longer
    /// `in_progress`, e.g. because it was reconciled as interrupted.
    pub async fn complete_with_iteration(
        pool: &DbPool,
        subject: &SubjectId,
        new: &NewIteration,
    ) -> Result<Option<Iteration>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let id = Uuid::now_v7();
        let now = Utc::now();

        let updated = sqlx::query(
            "UPDATE job_records SET \
                 status_id = ?2, progress = 100, message = ?3, last_error = NULL, \
                 current_artifact_refs = ?4, current_iteration_id = ?5, \
                 started_at = NULL, updated_at = ?6 \
             WHERE subject_id = ?1 AND status_id = ?7",
        )
        .bind(subject.as_str())
        .bind(JobStatus::Complete.id())
        .bind(MSG_COMPLETE)
        .bind(Json(&new.artifact_refs))
        .bind(id)
        .bind(now)
        .bind(JobStatus::InProgress.id())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let iteration = IterationRepo::insert(&mut *tx, id, subject, new, now).await?;
        tx.commit().await?;
        Ok(Some(iteration))
    }

    /// Append a pre-generated iteration and mark the subject complete.
    ///
    /// Used by demo seeding. Returns `None` if the subject has a job in
    /// flight.
    pub async fn seed_iteration(
        pool: &DbPool,
        subject: &SubjectId,
        new: &NewIteration,
    ) -> Result<Option<Iteration>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let id = Uuid::now_v7();
        let now = Utc::now();

        let updated = sqlx::query(
            "INSERT INTO job_records \
                 (subject_id, status_id, progress, message, current_artifact_refs, \
                  current_iteration_id, created_at, updated_at) \
             VALUES (?1, ?2, 100, ?3, ?4, ?5, ?6, ?6) \
             ON CONFLICT(subject_id) DO UPDATE SET \
                 status_id = excluded.status_id, progress = 100, \
                 message = excluded.message, last_error = NULL, \
                 current_artifact_refs = excluded.current_artifact_refs, \
                 current_iteration_id = excluded.current_iteration_id, \
                 started_at = NULL, updated_at = excluded.updated_at \
             WHERE job_records.status_id <> ?7",
        )
        .bind(subject.as_str())
        .bind(JobStatus::Complete.id())
        .bind(MSG_COMPLETE)
        .bind(Json(&new.artifact_refs))
        .bind(id)
        .bind(now)
        .bind(JobStatus::InProgress.id())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let iteration = IterationRepo::insert(&mut *tx, id, subject, new, now).await?;
        tx.commit().await?;
        Ok(Some(iteration))
    }

    /// Point the active state at the iteration with the given 0-based index.
    ///
    /// History is never modified. Refused while a job is in flight.
    pub async fn rewind(
        pool: &DbPool,
        subject: &SubjectId,
        iteration_index: usize,
    ) -> Result<RewindOutcome, sqlx::Error> {
        let total_iterations = IterationRepo::count_for_subject(pool, subject).await?;
        let Some(target) = IterationRepo::find_by_index(pool, subject, iteration_index).await?
        else {
            return Ok(RewindOutcome::IndexOutOfRange { total_iterations });
        };

        let updated = Self::point_at(pool, subject, &target.artifact_refs, Some(target.id)).await?;
        if !updated {
            return Ok(RewindOutcome::InProgress);
        }

        let record = Self::get(pool, subject).await?;
        Ok(RewindOutcome::Rewound {
            record,
            total_iterations,
        })
    }

    /// Conditional pointer move used by rewind.
    async fn point_at(
        pool: &DbPool,
        subject: &SubjectId,
        refs: &ArtifactRefs,
        iteration_id: Option<IterationId>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE job_records SET \
                 status_id = ?2, progress = 100, message = ?3, last_error = NULL, \
                 current_artifact_refs = ?4, current_iteration_id = ?5, updated_at = ?6 \
             WHERE subject_id = ?1 AND status_id <> ?7",
        )
        .bind(subject.as_str())
        .bind(JobStatus::Complete.id())
        .bind(MSG_REWOUND)
        .bind(Json(refs))
        .bind(iteration_id)
        .bind(Utc::now())
        .bind(JobStatus::InProgress.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark an in-flight job as failed. Artifacts and history are untouched.
    pub async fn fail(pool: &DbPool, subject: &SubjectId, error: &str) -> Result<bool, sqlx::Error> {
        Self::compare_and_swap_status(
            pool,
            subject,
            JobStatus::InProgress,
            &StatusTransition::fail(error),
        )
        .await
    }

    /// Reconcile one subject's in-progress record to `error("interrupted")`.
    pub async fn mark_interrupted(pool: &DbPool, subject: &SubjectId) -> Result<bool, sqlx::Error> {
        let mut transition = StatusTransition::fail(INTERRUPTED_ERROR);
        transition.message = MSG_INTERRUPTED.to_string();
        Self::compare_and_swap_status(pool, subject, JobStatus::InProgress, &transition).await
    }

    /// Reconcile every in-progress record to `error("interrupted")`.
    ///
    /// Called at startup, when no job of this process can be running yet.
    /// Returns the affected subjects.
    pub async fn reconcile_all_interrupted(pool: &DbPool) -> Result<Vec<SubjectId>, sqlx::Error> {
        let subjects: Vec<String> = sqlx::query_scalar(
            "UPDATE job_records SET \
                 status_id = ?1, last_error = ?2, message = ?3, started_at = NULL, updated_at = ?4 \
             WHERE status_id = ?5 \
             RETURNING subject_id",
        )
        .bind(JobStatus::Error.id())
        .bind(INTERRUPTED_ERROR)
        .bind(MSG_INTERRUPTED)
        .bind(Utc::now())
        .bind(JobStatus::InProgress.id())
        .fetch_all(pool)
        .await?;

        subjects
            .into_iter()
            .map(|s| s.parse().map_err(crate::models::decode_error))
            .collect()
    }

    /// Clear a subject's current artifacts and return it to `idle`.
    ///
    /// Iteration history is kept.
    pub async fn clear_artifacts(pool: &DbPool, subject: &SubjectId) -> Result<ClearOutcome, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE job_records SET \
                 status_id = ?2, progress = 0, message = ?3, last_error = NULL, \
                 current_artifact_refs = '{}', current_iteration_id = NULL, \
                 started_at = NULL, updated_at = ?4 \
             WHERE subject_id = ?1 AND status_id <> ?5",
        )
        .bind(subject.as_str())
        .bind(JobStatus::Idle.id())
        .bind(MSG_CLEARED)
        .bind(Utc::now())
        .bind(JobStatus::InProgress.id())
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(ClearOutcome::Cleared);
        }
        match Self::find(pool, subject).await? {
            Some(record) if record.is_in_progress() => Ok(ClearOutcome::InProgress),
            Some(_) => Ok(ClearOutcome::Cleared),
            None => Ok(ClearOutcome::NothingStored),
        }
    }
}
