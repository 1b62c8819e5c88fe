//! The generator seam.
//!
//! A [`Generator`] turns one [`GenerationRequest`] into a set of artifact
//! references. It is opaque to the rest of the system: the orchestrator only
//! sees progress milestones and the final result.

use async_trait::async_trait;
use packforge_core::artifact::ArtifactRefs;
use packforge_core::status::JobKind;
use packforge_core::subject::SubjectId;
use serde::{Deserialize, Serialize};

/// Physical dimensions in millimetres. `depth` is absent for flat panels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
}

/// What a job was asked to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    Create {
        prompt: String,
        image_count: u8,
    },
    Edit {
        prompt: String,
    },
    PanelTexture {
        prompt: String,
        package_type: String,
        panel_dimensions: Dimensions,
        package_dimensions: Dimensions,
    },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Create { .. } => JobKind::Create,
            JobPayload::Edit { .. } => JobKind::Edit,
            JobPayload::PanelTexture { .. } => JobKind::PanelTexture,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            JobPayload::Create { prompt, .. }
            | JobPayload::Edit { prompt }
            | JobPayload::PanelTexture { prompt, .. } => prompt,
        }
    }
}

/// Input handed to a [`Generator`].
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub subject_id: SubjectId,
    pub payload: JobPayload,
    /// Active artifacts at the time the job was claimed. Edits build on
    /// these; other kinds ignore them.
    pub base_artifacts: ArtifactRefs,
}

/// Failure reported by a generator. The message is recorded as the job's
/// `last_error`.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("{0}")]
    Failed(String),

    #[error("generation service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("generation service error ({status}): {body}")]
    Service { status: u16, body: String },

    #[error("demo fixtures not configured for {0}")]
    MissingFixture(String),
}

/// Receives coarse progress milestones from a running generator.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, percent: u8, message: &str);
}

/// One opaque generation call.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<ArtifactRefs, GenerationError>;
}
