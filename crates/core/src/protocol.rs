//! Wire payloads of the status/poll protocol.
//!
//! The server produces these inside its `{ "data": ... }` envelope and the
//! client deserializes them, so both ends share one definition.

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactKind;
use crate::status::{JobKind, JobStatus};
use crate::subject::SubjectId;
use crate::types::{IterationId, Timestamp};

/// Lightweight, poll-friendly view of a job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub subject_id: SubjectId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub last_error: Option<String>,
    pub job_kind: Option<JobKind>,
    pub current_iteration_id: Option<IterationId>,
    pub started_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

/// Acknowledgement returned by every mutating endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedPayload {
    pub subject_id: SubjectId,
    pub accepted: bool,
    pub status: StatusPayload,
}

/// Result of an artifact fetch.
///
/// `Ready` is served with 200, `NotReady` with 202; "not found" is a 404
/// error response and never a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ArtifactPayload {
    Ready {
        subject_id: SubjectId,
        kind: ArtifactKind,
        reference: String,
    },
    NotReady {
        subject_id: SubjectId,
        kind: ArtifactKind,
    },
}

/// Result of a rewind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewindPayload {
    pub subject_id: SubjectId,
    pub iteration_index: usize,
    pub total_iterations: usize,
    pub status: StatusPayload,
}

/// Result of an explicit recovery request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoverPayload {
    pub subject_id: SubjectId,
    pub recovered: bool,
    pub status: StatusPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_payload_is_tagged_by_state() {
        let ready = ArtifactPayload::Ready {
            subject_id: SubjectId::product(),
            kind: ArtifactKind::Model,
            reference: "https://cdn/m.glb".into(),
        };
        let json = serde_json::to_value(&ready).unwrap();
        assert_eq!(json["state"], "ready");
        assert_eq!(json["kind"], "model");

        let pending: ArtifactPayload = serde_json::from_value(serde_json::json!({
            "state": "not_ready",
            "subject_id": "panel:front",
            "kind": "texture",
        }))
        .unwrap();
        assert!(matches!(pending, ArtifactPayload::NotReady { .. }));
    }
}
