//! Job record model: the current generation state of one subject.

use packforge_core::artifact::ArtifactRefs;
use packforge_core::protocol::StatusPayload;
use packforge_core::status::{JobKind, JobStatus, StatusId};
use packforge_core::subject::SubjectId;
use packforge_core::types::{IterationId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

use super::decode_error;

/// A row from the `job_records` table, as stored.
#[derive(Debug, Clone, FromRow)]
pub struct JobRecordRow {
    pub subject_id: String,
    pub status_id: StatusId,
    pub job_kind_id: Option<StatusId>,
    pub progress: i16,
    pub message: String,
    pub last_error: Option<String>,
    pub current_artifact_refs: Json<ArtifactRefs>,
    pub current_iteration_id: Option<IterationId>,
    pub started_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Current generation state of a subject.
///
/// A subject that has never been mutated is represented by [`JobRecord::idle`]
/// with no timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub subject_id: SubjectId,
    pub status: JobStatus,
    pub job_kind: Option<JobKind>,
    pub progress: u8,
    pub message: String,
    pub last_error: Option<String>,
    pub current_artifact_refs: ArtifactRefs,
    pub current_iteration_id: Option<IterationId>,
    pub started_at: Option<Timestamp>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

impl JobRecord {
    /// Zero-value record for a subject with no stored state.
    pub fn idle(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            status: JobStatus::Idle,
            job_kind: None,
            progress: 0,
            message: String::new(),
            last_error: None,
            current_artifact_refs: ArtifactRefs::new(),
            current_iteration_id: None,
            started_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == JobStatus::InProgress
    }

    /// Poll-friendly projection served by the status endpoints.
    pub fn to_status_payload(&self) -> StatusPayload {
        StatusPayload {
            subject_id: self.subject_id.clone(),
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            last_error: self.last_error.clone(),
            job_kind: self.job_kind,
            current_iteration_id: self.current_iteration_id,
            started_at: self.started_at,
            updated_at: self.updated_at,
        }
    }
}

impl TryFrom<JobRecordRow> for JobRecord {
    type Error = sqlx::Error;

    fn try_from(row: JobRecordRow) -> Result<Self, Self::Error> {
        let subject_id: SubjectId = row.subject_id.parse().map_err(decode_error)?;
        let status = JobStatus::from_id(row.status_id).ok_or_else(|| {
            decode_error(format!("unknown job status id {}", row.status_id))
        })?;
        let job_kind = match row.job_kind_id {
            Some(id) => Some(
                JobKind::from_id(id)
                    .ok_or_else(|| decode_error(format!("unknown job kind id {id}")))?,
            ),
            None => None,
        };

        Ok(Self {
            subject_id,
            status,
            job_kind,
            progress: row.progress.clamp(0, 100) as u8,
            message: row.message,
            last_error: row.last_error,
            current_artifact_refs: row.current_artifact_refs.0,
            current_iteration_id: row.current_iteration_id,
            started_at: row.started_at,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        })
    }
}

/// A status change applied through compare-and-swap.
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub next: JobStatus,
    /// Kind of the job being started; `None` keeps the stored kind.
    pub job_kind: Option<JobKind>,
    pub message: String,
    pub last_error: Option<String>,
}

impl StatusTransition {
    /// Claim the in-flight slot for a new job.
    pub fn start(kind: JobKind, message: impl Into<String>) -> Self {
        Self {
            next: JobStatus::InProgress,
            job_kind: Some(kind),
            message: message.into(),
            last_error: None,
        }
    }

    /// Record a terminal failure.
    pub fn fail(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            next: JobStatus::Error,
            job_kind: None,
            message: format!("Generation failed: {error}"),
            last_error: Some(error),
        }
    }

    /// Resets progress and stamps `started_at` when entering `in_progress`.
    pub(crate) fn starts_job(&self) -> bool {
        self.next == JobStatus::InProgress
    }
}
