//! Generator backed by an external generation service over HTTP.
//!
//! Sends `POST {base_url}/generate` with `{kind, prompt, context}` and
//! expects `{"artifacts": {"model": "...", ...}}` back.

use std::time::Duration;

use async_trait::async_trait;
use packforge_core::artifact::ArtifactRefs;
use serde::Deserialize;

use crate::generator::{
    GenerationError, GenerationRequest, Generator, JobPayload, ProgressReporter,
};

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    artifacts: ArtifactRefs,
}

/// Client settings shared by the outbound service calls. The timeout bounds
/// the whole request, including reading the body.
pub(crate) fn client_builder(timeout: Duration) -> reqwest::ClientBuilder {
    reqwest::Client::builder().timeout(timeout)
}

pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGenerator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GenerationError> {
        let client = client_builder(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Request body for the generation service.
    fn body(request: &GenerationRequest) -> serde_json::Value {
        let context = match &request.payload {
            JobPayload::Create { image_count, .. } => serde_json::json!({
                "image_count": image_count,
            }),
            JobPayload::Edit { .. } => serde_json::json!({
                "base_artifacts": request.base_artifacts,
            }),
            JobPayload::PanelTexture {
                package_type,
                panel_dimensions,
                package_dimensions,
                ..
            } => serde_json::json!({
                "panel_id": request.subject_id.panel_id(),
                "package_type": package_type,
                "panel_dimensions": panel_dimensions,
                "package_dimensions": package_dimensions,
            }),
        };

        serde_json::json!({
            "kind": request.payload.kind(),
            "prompt": request.payload.prompt(),
            "context": context,
        })
    }

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GenerationError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenerationError::Service {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<ArtifactRefs, GenerationError> {
        progress.report(10, "Submitting to generation service...").await;

        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&Self::body(request))
            .send()
            .await?;

        progress.report(90, "Receiving artifacts...").await;

        let parsed: GenerateResponse = Self::ensure_success(response).await?.json().await?;
        Ok(parsed.artifacts)
    }
}
