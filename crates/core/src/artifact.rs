//! Artifact kinds and reference sets.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The kind of a generated binary artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// 3D model (GLB).
    Model,
    /// Panel texture image.
    Texture,
    /// Preview image of the product.
    PreviewImage,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Texture => "texture",
            ArtifactKind::PreviewImage => "preview_image",
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(ArtifactKind::Model),
            "texture" => Ok(ArtifactKind::Texture),
            "preview_image" => Ok(ArtifactKind::PreviewImage),
            other => Err(CoreError::Validation(format!(
                "Unknown artifact kind '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from artifact kind to a remote reference (URL or data URI).
pub type ArtifactRefs = BTreeMap<ArtifactKind, String>;
