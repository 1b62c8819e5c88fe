//! Demo helpers: preload pre-generated artifacts so a presentation never
//! waits on the generator, and reset everything afterwards.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use packforge_core::artifact::{ArtifactKind, ArtifactRefs};
use packforge_core::error::CoreError;
use packforge_core::status::IterationKind;
use packforge_core::subject::SubjectId;
use packforge_pipeline::fixtures::{PanelSeed, DEFAULT_SEED_PROMPT};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Note attached to every seeded iteration.
const SEED_NOTE: &str = "Pre-loaded for demo";

fn default_seed_prompt() -> String {
    DEFAULT_SEED_PROMPT.to_string()
}

#[derive(Debug, Deserialize)]
pub struct SeedProductRequest {
    #[serde(default = "default_seed_prompt")]
    pub prompt: String,
    pub model_url: String,
    #[serde(default)]
    pub preview_images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedPanelTexture {
    pub texture_url: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedPackagingRequest {
    #[serde(default)]
    pub panel_textures: BTreeMap<String, SeedPanelTexture>,
}

#[derive(Debug, Default, Serialize)]
pub struct SeedResponse {
    pub product: Option<SubjectId>,
    pub panels: Vec<SubjectId>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: Vec<SubjectId>,
    pub busy: Vec<SubjectId>,
}

async fn seed_product_refs(state: &AppState, prompt: &str, refs: ArtifactRefs) -> AppResult<SubjectId> {
    let subject = SubjectId::product();
    state
        .orchestrator
        .seed(&subject, IterationKind::Create, prompt, refs, SEED_NOTE)
        .await?;
    Ok(subject)
}

/// Resolve every panel id up front so one bad id seeds nothing.
fn panel_subjects(seeds: Vec<PanelSeed>) -> AppResult<Vec<(SubjectId, PanelSeed)>> {
    seeds
        .into_iter()
        .map(|seed| -> AppResult<_> { Ok((SubjectId::panel(&seed.panel_id)?, seed)) })
        .collect()
}

async fn seed_panels(
    state: &AppState,
    seeds: Vec<(SubjectId, PanelSeed)>,
) -> AppResult<Vec<SubjectId>> {
    let mut seeded = Vec::with_capacity(seeds.len());
    for (subject, seed) in seeds {
        state
            .orchestrator
            .seed(&subject, IterationKind::Create, &seed.prompt, seed.refs, SEED_NOTE)
            .await?;
        seeded.push(subject);
    }
    Ok(seeded)
}

/// POST /api/v1/demo/seed-product
pub async fn seed_product(
    State(state): State<AppState>,
    Json(input): Json<SeedProductRequest>,
) -> AppResult<impl IntoResponse> {
    if input.model_url.trim().is_empty() {
        return Err(AppError::BadRequest("model_url must not be empty".into()));
    }

    let mut refs = ArtifactRefs::from([(ArtifactKind::Model, input.model_url)]);
    if let Some(preview) = input.preview_images.into_iter().next() {
        refs.insert(ArtifactKind::PreviewImage, preview);
    }

    let subject = seed_product_refs(&state, &input.prompt, refs).await?;
    tracing::info!(subject_id = %subject, "Seeded demo product");
    Ok(Json(DataResponse {
        data: SeedResponse {
            product: Some(subject),
            panels: Vec::new(),
        },
    }))
}

/// POST /api/v1/demo/seed-packaging
pub async fn seed_packaging(
    State(state): State<AppState>,
    Json(input): Json<SeedPackagingRequest>,
) -> AppResult<impl IntoResponse> {
    let seeds: Vec<PanelSeed> = input
        .panel_textures
        .into_iter()
        .filter(|(_, t)| !t.texture_url.trim().is_empty())
        .map(|(panel_id, t)| PanelSeed {
            prompt: t.prompt.unwrap_or_else(|| format!("Demo {panel_id} panel")),
            refs: ArtifactRefs::from([(ArtifactKind::Texture, t.texture_url)]),
            panel_id,
        })
        .collect();

    let panels = seed_panels(&state, panel_subjects(seeds)?).await?;
    tracing::info!(count = panels.len(), "Seeded demo panels");
    Ok(Json(DataResponse {
        data: SeedResponse {
            product: None,
            panels,
        },
    }))
}

/// POST /api/v1/demo/seed-from-fixtures
///
/// Seeds whatever the configured fixtures file provides. 404 if it provides
/// nothing usable.
pub async fn seed_from_fixtures(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let product_seed = state.fixtures.product_seed();
    let panel_seeds = state.fixtures.panel_seeds();
    if product_seed.is_none() && panel_seeds.is_empty() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "demo fixtures",
            id: "configured fixtures file".into(),
        }));
    }

    let panel_seeds = panel_subjects(panel_seeds)?;
    let mut response = SeedResponse::default();
    if let Some((prompt, refs)) = product_seed {
        response.product = Some(seed_product_refs(&state, &prompt, refs).await?);
    }
    response.panels = seed_panels(&state, panel_seeds).await?;

    tracing::info!(
        product = response.product.is_some(),
        panels = response.panels.len(),
        "Seeded demo state from fixtures",
    );
    Ok(Json(DataResponse { data: response }))
}

/// POST /api/v1/demo/clear
///
/// Clears the product and every panel. Subjects with a running job are
/// skipped and reported as busy.
pub async fn clear_demo(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let outcome = state.orchestrator.clear_all().await?;
    tracing::info!(
        cleared = outcome.cleared.len(),
        busy = outcome.busy.len(),
        "Demo state cleared",
    );
    Ok(Json(DataResponse {
        data: ClearResponse {
            cleared: outcome.cleared,
            busy: outcome.busy,
        },
    }))
}
