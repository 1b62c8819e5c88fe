//! Format export seam.
//!
//! An [`Exporter`] turns the active product model into downloadable files.
//! [`HttpExporter`] sends `POST {base_url}/export` with
//! `{"model": "...", "formats": ["stl", ...]}` and expects
//! `{"files": {"stl": "...", ...}}` back, one reference per format.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http::client_builder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Blend,
    Stl,
    Jpg,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Blend, ExportFormat::Stl, ExportFormat::Jpg];

    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Blend => "blend",
            ExportFormat::Stl => "stl",
            ExportFormat::Jpg => "jpg",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExportFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| {
                format!("Invalid format '{s}'. Must be one of: blend, stl, jpg")
            })
    }
}

/// File reference per exported format.
pub type ExportFiles = BTreeMap<ExportFormat, String>;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("export service error ({status}): {body}")]
    Service { status: u16, body: String },

    #[error("export service returned no {0} file")]
    MissingFormat(ExportFormat),
}

#[async_trait]
pub trait Exporter: Send + Sync {
    /// Export `model_ref` to every format in `formats`.
    async fn export(
        &self,
        model_ref: &str,
        formats: &[ExportFormat],
    ) -> Result<ExportFiles, ExportError>;
}

#[derive(Debug, Deserialize)]
struct ExportResponse {
    #[serde(default)]
    files: ExportFiles,
}

pub struct HttpExporter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExporter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ExportError> {
        let client = client_builder(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Exporter for HttpExporter {
    async fn export(
        &self,
        model_ref: &str,
        formats: &[ExportFormat],
    ) -> Result<ExportFiles, ExportError> {
        let response = self
            .client
            .post(format!("{}/export", self.base_url))
            .json(&serde_json::json!({ "model": model_ref, "formats": formats }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ExportError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let mut returned = response.json::<ExportResponse>().await?.files;
        let mut files = ExportFiles::new();
        for &format in formats {
            let reference = returned
                .remove(&format)
                .ok_or(ExportError::MissingFormat(format))?;
            files.insert(format, reference);
        }
        tracing::info!(formats = files.len(), "Exported product model");
        Ok(files)
    }
}
