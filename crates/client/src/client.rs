//! High-level client: start jobs, wait for them, and resolve their artifacts
//! through the local cache.

use std::sync::Arc;

use packforge_core::artifact::ArtifactKind;
use packforge_core::protocol::StatusPayload;
use packforge_core::subject::SubjectId;
use tokio_util::sync::CancellationToken;

use crate::api::PackforgeApi;
use crate::cache::{ArtifactCache, ArtifactHandle, HttpFetcher};
use crate::config::{ClientConfig, PollPolicy};
use crate::error::ClientError;
use crate::poll::{PollOutcome, Poller, StatusSource};

pub struct PackforgeClient {
    api: Arc<PackforgeApi>,
    poller: Poller,
    cache: ArtifactCache,
}

impl PackforgeClient {
    pub fn new(api: Arc<PackforgeApi>, cache: ArtifactCache, policy: PollPolicy) -> Self {
        let source: Arc<dyn StatusSource> = api.clone();
        Self {
            poller: Poller::new(source, policy),
            api,
            cache,
        }
    }

    pub async fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let api = Arc::new(PackforgeApi::new(config.api_url.clone()));
        let cache = ArtifactCache::open(&config.cache_dir, Arc::new(HttpFetcher::new())).await?;
        Ok(Self::new(api, cache, config.poll))
    }

    pub fn api(&self) -> &PackforgeApi {
        &self.api
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Wait for the subject's job to end and resolve its `kind` artifact.
    ///
    /// `None` means the subject is idle and has nothing to resolve.
    pub async fn await_artifact(
        &self,
        subject: &SubjectId,
        kind: ArtifactKind,
        cancel: &CancellationToken,
    ) -> Result<Option<ArtifactHandle>, ClientError> {
        match self.poller.wait_for(subject, kind, cancel).await? {
            PollOutcome::Ready { reference } => {
                Ok(Some(self.cache.resolve(subject, &reference).await?))
            }
            PollOutcome::Stopped => Ok(None),
        }
    }

    /// Reset the subject on the server and drop its cached artifacts.
    pub async fn reset(&self, subject: &SubjectId) -> Result<StatusPayload, ClientError> {
        let status = self.api.reset(subject).await?;
        self.cache.evict(subject).await?;
        Ok(status)
    }
}
