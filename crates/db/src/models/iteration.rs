//! Iteration model: one immutable entry in a subject's history.

use packforge_core::artifact::ArtifactRefs;
use packforge_core::status::{IterationKind, StatusId};
use packforge_core::subject::SubjectId;
use packforge_core::types::{IterationId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

use super::decode_error;

/// A row from the `iterations` table, as stored.
#[derive(Debug, Clone, FromRow)]
pub struct IterationRow {
    pub id: IterationId,
    pub subject_id: String,
    pub kind_id: StatusId,
    pub prompt: String,
    pub artifact_refs: Json<ArtifactRefs>,
    pub note: Option<String>,
    pub duration_seconds: Option<f64>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Iteration {
    pub id: IterationId,
    pub subject_id: SubjectId,
    pub kind: IterationKind,
    pub prompt: String,
    pub artifact_refs: ArtifactRefs,
    pub note: Option<String>,
    pub duration_seconds: Option<f64>,
    pub created_at: Timestamp,
}

impl TryFrom<IterationRow> for Iteration {
    type Error = sqlx::Error;

    fn try_from(row: IterationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            subject_id: row.subject_id.parse().map_err(decode_error)?,
            kind: IterationKind::from_id(row.kind_id).ok_or_else(|| {
                decode_error(format!("unknown iteration kind id {}", row.kind_id))
            })?,
            prompt: row.prompt,
            artifact_refs: row.artifact_refs.0,
            note: row.note,
            duration_seconds: row.duration_seconds,
            created_at: row.created_at,
        })
    }
}

/// Data for appending a new iteration.
#[derive(Debug, Clone)]
pub struct NewIteration {
    pub kind: IterationKind,
    pub prompt: String,
    pub artifact_refs: ArtifactRefs,
    pub note: Option<String>,
    pub duration_seconds: Option<f64>,
}
