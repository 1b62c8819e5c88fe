//! Demo generator that simulates staged progress and returns fixture
//! artifacts instead of calling a model.

use std::time::Duration;

use async_trait::async_trait;
use packforge_core::artifact::{ArtifactKind, ArtifactRefs};
use packforge_core::status::JobKind;

use crate::fixtures::DemoFixtures;
use crate::generator::{GenerationError, GenerationRequest, Generator, ProgressReporter};

/// Total simulated duration per job kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockDelays {
    pub create: Duration,
    pub edit: Duration,
    pub texture: Duration,
}

impl MockDelays {
    pub const ZERO: MockDelays = MockDelays {
        create: Duration::ZERO,
        edit: Duration::ZERO,
        texture: Duration::ZERO,
    };

    fn for_kind(&self, kind: JobKind) -> Duration {
        match kind {
            JobKind::Create => self.create,
            JobKind::Edit => self.edit,
            JobKind::PanelTexture => self.texture,
        }
    }
}

/// Progress milestones; each is followed by a fifth of the total delay.
fn stages(kind: JobKind) -> [(u8, &'static str); 5] {
    match kind {
        JobKind::Create => [
            (10, "Generating product images..."),
            (25, "Creating multiple views..."),
            (45, "Generating 3D model..."),
            (65, "Processing geometry and textures..."),
            (85, "Finalizing 3D asset..."),
        ],
        JobKind::Edit => [
            (10, "Applying edit to product images..."),
            (25, "Regenerating views..."),
            (45, "Rebuilding 3D model..."),
            (65, "Processing geometry and textures..."),
            (85, "Finalizing edited asset..."),
        ],
        JobKind::PanelTexture => [
            (10, "Composing panel prompt..."),
            (25, "Generating texture..."),
            (45, "Generating texture..."),
            (65, "Upscaling texture..."),
            (85, "Finalizing texture..."),
        ],
    }
}

pub struct MockGenerator {
    fixtures: DemoFixtures,
    delays: MockDelays,
}

impl MockGenerator {
    pub fn new(fixtures: DemoFixtures, delays: MockDelays) -> Self {
        Self { fixtures, delays }
    }

    /// Fixture refs for the request. A mock job without a fixture fails
    /// rather than produce a reference nothing can fetch.
    fn artifacts_for(&self, request: &GenerationRequest) -> Result<ArtifactRefs, GenerationError> {
        match request.payload.kind() {
            JobKind::Create => self
                .fixtures
                .create_refs()
                .ok_or_else(|| GenerationError::MissingFixture("product create".into())),
            JobKind::Edit => self
                .fixtures
                .edit_refs()
                .ok_or_else(|| GenerationError::MissingFixture("product edit".into())),
            JobKind::PanelTexture => {
                let panel_id = request.subject_id.panel_id().unwrap_or_default();
                self.fixtures
                    .panel_texture_ref(panel_id)
                    .map(|url| ArtifactRefs::from([(ArtifactKind::Texture, url)]))
                    .ok_or_else(|| GenerationError::MissingFixture(format!("panel '{panel_id}'")))
            }
        }
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<ArtifactRefs, GenerationError> {
        let kind = request.payload.kind();
        let step = self.delays.for_kind(kind) / 5;
        let artifacts = self.artifacts_for(request).inspect_err(|e| {
            tracing::error!(subject_id = %request.subject_id, %kind, error = %e, "Mock generation unavailable");
        })?;
        tracing::info!(subject_id = %request.subject_id, %kind, "Starting mock generation");

        for (percent, message) in stages(kind) {
            progress.report(percent, message).await;
            if !step.is_zero() {
                tokio::time::sleep(step).await;
            }
        }

        Ok(artifacts)
    }
}
