//! Pre-generated demo artifacts.
//!
//! Loaded from a JSON file (`DEMO_FIXTURES_PATH`) shaped like:
//!
//! ```json
//! {
//!   "product_create": { "model_url": "...", "preview_images": ["..."] },
//!   "product_edit":   { "model_url": "..." },
//!   "product":        { "prompt": "Demo Product", "model_url": "..." },
//!   "packaging": {
//!     "package_type": "box",
//!     "panel_textures": { "front": { "texture_url": "...", "prompt": "..." } }
//!   }
//! }
//! ```
//!
//! URLs that are empty or still start with the `PASTE` placeholder count as
//! missing.

use std::collections::BTreeMap;
use std::path::Path;

use packforge_core::artifact::{ArtifactKind, ArtifactRefs};
use packforge_core::validation::PANEL_ID_RE;
use serde::Deserialize;

const PLACEHOLDER_PREFIX: &str = "PASTE";

/// Prompt recorded for a seeded product without one.
pub const DEFAULT_SEED_PROMPT: &str = "Demo Product";

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read fixtures file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid fixtures JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFixture {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model_url: String,
    #[serde(default)]
    pub preview_images: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PanelTextureFixture {
    #[serde(default)]
    pub texture_url: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackagingFixture {
    #[serde(default)]
    pub package_type: Option<String>,
    #[serde(default)]
    pub panel_textures: BTreeMap<String, PanelTextureFixture>,
}

/// A panel texture ready to be seeded.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSeed {
    pub panel_id: String,
    pub prompt: String,
    pub refs: ArtifactRefs,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DemoFixtures {
    #[serde(default)]
    pub product: Option<ProductFixture>,
    #[serde(default)]
    pub product_create: Option<ProductFixture>,
    #[serde(default)]
    pub product_edit: Option<ProductFixture>,
    #[serde(default)]
    pub packaging: Option<PackagingFixture>,
}

fn is_usable(url: &str) -> bool {
    !url.is_empty() && !url.starts_with(PLACEHOLDER_PREFIX)
}

impl ProductFixture {
    /// Model plus the first preview image, if the model URL is usable.
    fn refs(&self) -> Option<ArtifactRefs> {
        if !is_usable(&self.model_url) {
            return None;
        }
        let mut refs = ArtifactRefs::new();
        refs.insert(ArtifactKind::Model, self.model_url.clone());
        if let Some(preview) = self.preview_images.iter().find(|u| is_usable(u)) {
            refs.insert(ArtifactKind::PreviewImage, preview.clone());
        }
        Some(refs)
    }
}

impl DemoFixtures {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load fixtures, falling back to an empty set (and logging why) when
    /// the file is absent or malformed.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(fixtures) => {
                tracing::info!(path = %path.display(), "Loaded demo fixtures");
                fixtures
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Demo fixtures unavailable");
                Self::default()
            }
        }
    }

    pub fn create_refs(&self) -> Option<ArtifactRefs> {
        self.product_create.as_ref().and_then(ProductFixture::refs)
    }

    pub fn edit_refs(&self) -> Option<ArtifactRefs> {
        self.product_edit.as_ref().and_then(ProductFixture::refs)
    }

    pub fn panel_texture_ref(&self, panel_id: &str) -> Option<String> {
        self.packaging
            .as_ref()?
            .panel_textures
            .get(panel_id)
            .filter(|t| is_usable(&t.texture_url))
            .map(|t| t.texture_url.clone())
    }

    /// Prompt and refs for seeding the product: `product`, else
    /// `product_create`.
    pub fn product_seed(&self) -> Option<(String, ArtifactRefs)> {
        let fixture = self.product.as_ref().or(self.product_create.as_ref())?;
        let refs = fixture.refs()?;
        let prompt = fixture
            .prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SEED_PROMPT.to_string());
        Some((prompt, refs))
    }

    /// Every panel texture with a usable URL and a well-formed panel id.
    pub fn panel_seeds(&self) -> Vec<PanelSeed> {
        let Some(packaging) = &self.packaging else {
            return Vec::new();
        };
        packaging
            .panel_textures
            .iter()
            .filter(|(panel_id, t)| PANEL_ID_RE.is_match(panel_id) && is_usable(&t.texture_url))
            .map(|(panel_id, t)| {
                let mut refs = ArtifactRefs::new();
                refs.insert(ArtifactKind::Texture, t.texture_url.clone());
                PanelSeed {
                    panel_id: panel_id.clone(),
                    prompt: t
                        .prompt
                        .clone()
                        .unwrap_or_else(|| format!("Demo {panel_id} panel")),
                    refs,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURES: &str = r#"{
        "product_create": {
            "model_url": "https://cdn/create.glb",
            "preview_images": ["https://cdn/create.png"]
        },
        "product_edit": { "model_url": "PASTE_EDIT_URL_HERE" },
        "packaging": {
            "panel_textures": {
                "front": { "texture_url": "https://cdn/front.png", "prompt": "gold foil" },
                "back": { "texture_url": "" },
                "Bad Id": { "texture_url": "https://cdn/bad.png" }
            }
        }
    }"#;

    fn fixtures() -> DemoFixtures {
        serde_json::from_str(FIXTURES).unwrap()
    }

    #[test]
    fn placeholder_urls_count_as_missing() {
        let fixtures = fixtures();
        assert!(fixtures.edit_refs().is_none());
        assert_eq!(fixtures.panel_texture_ref("back"), None);
    }

    #[test]
    fn create_refs_include_first_preview() {
        let refs = fixtures().create_refs().unwrap();
        assert_eq!(refs[&ArtifactKind::Model], "https://cdn/create.glb");
        assert_eq!(refs[&ArtifactKind::PreviewImage], "https://cdn/create.png");
    }

    #[test]
    fn product_seed_falls_back_to_create_fixture() {
        let (prompt, refs) = fixtures().product_seed().unwrap();
        assert_eq!(prompt, DEFAULT_SEED_PROMPT);
        assert_eq!(refs[&ArtifactKind::Model], "https://cdn/create.glb");
    }

    #[test]
    fn panel_seeds_skip_unusable_entries() {
        let seeds = fixtures().panel_seeds();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].panel_id, "front");
        assert_eq!(seeds[0].prompt, "gold foil");
    }

    #[test]
    fn missing_or_broken_file_yields_empty_fixtures() {
        assert!(DemoFixtures::load_or_default(None).create_refs().is_none());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(DemoFixtures::load(file.path()).is_err());
        assert!(DemoFixtures::load_or_default(Some(file.path()))
            .panel_seeds()
            .is_empty());
    }
}
