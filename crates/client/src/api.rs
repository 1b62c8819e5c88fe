//! Typed client for the Packforge HTTP API.

use packforge_core::artifact::ArtifactKind;
use packforge_core::protocol::{AcceptedPayload, ArtifactPayload, RewindPayload, StatusPayload};
use packforge_core::subject::SubjectId;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

/// What the artifact endpoint said about one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLookup {
    /// 200: the remote reference to resolve.
    Ready(String),
    /// 202: a job for the subject is still running.
    NotReady,
    /// 404: the subject has no such artifact.
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
}

/// Body of `POST /packaging/panels/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct PanelTextureRequest {
    pub panel_id: String,
    pub prompt: String,
    pub package_type: String,
    pub panel_dimensions: Dimensions,
    pub package_dimensions: Dimensions,
}

pub struct PackforgeApi {
    client: reqwest::Client,
    base_url: String,
}

impl PackforgeApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    /// GET the poll-friendly status of a subject.
    pub async fn status(&self, subject: &SubjectId) -> Result<StatusPayload, ClientError> {
        let response = self.client.get(self.url(&status_path(subject))).send().await?;
        Self::data(response).await
    }

    /// GET an artifact reference. Panels only expose their texture.
    pub async fn artifact(
        &self,
        subject: &SubjectId,
        kind: ArtifactKind,
    ) -> Result<ArtifactLookup, ClientError> {
        let response = self
            .client
            .get(self.url(&artifact_path(subject, kind)))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(ArtifactLookup::Missing),
            StatusCode::ACCEPTED => Ok(ArtifactLookup::NotReady),
            _ => match Self::data::<ArtifactPayload>(response).await? {
                ArtifactPayload::Ready { reference, .. } => Ok(ArtifactLookup::Ready(reference)),
                ArtifactPayload::NotReady { .. } => Ok(ArtifactLookup::NotReady),
            },
        }
    }

    pub async fn create_product(
        &self,
        prompt: &str,
        image_count: u8,
    ) -> Result<AcceptedPayload, ClientError> {
        let body = serde_json::json!({ "prompt": prompt, "image_count": image_count });
        self.post("/product/create", &body).await
    }

    pub async fn edit_product(&self, prompt: &str) -> Result<AcceptedPayload, ClientError> {
        self.post("/product/edit", &serde_json::json!({ "prompt": prompt }))
            .await
    }

    pub async fn rewind_product(&self, index: usize) -> Result<RewindPayload, ClientError> {
        self.post(&format!("/product/rewind/{index}"), &serde_json::json!({}))
            .await
    }

    pub async fn generate_panel(
        &self,
        request: &PanelTextureRequest,
    ) -> Result<AcceptedPayload, ClientError> {
        self.post("/packaging/panels/generate", request).await
    }

    /// Drop a subject's active artifacts on the server.
    pub async fn reset(&self, subject: &SubjectId) -> Result<StatusPayload, ClientError> {
        let path = match subject.panel_id() {
            Some(panel_id) => format!("/packaging/panels/{panel_id}/texture"),
            None => "/product".to_string(),
        };
        let response = self.client.delete(self.url(&path)).send().await?;
        Self::data(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::data(response).await
    }

    /// Unwrap the `{ "data": ... }` envelope of a successful response.
    async fn data<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.data)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (body.code, body.error),
            Err(_) => ("UNKNOWN".to_string(), text),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

fn status_path(subject: &SubjectId) -> String {
    match subject.panel_id() {
        Some(panel_id) => format!("/packaging/panels/{panel_id}/status"),
        None => "/product/status".to_string(),
    }
}

fn artifact_path(subject: &SubjectId, kind: ArtifactKind) -> String {
    match subject.panel_id() {
        Some(panel_id) => format!("/packaging/panels/{panel_id}/texture"),
        None => format!("/product/artifacts/{kind}"),
    }
}
