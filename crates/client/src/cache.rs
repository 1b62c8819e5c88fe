//! Two-layer artifact cache.
//!
//! Remote artifact references (URLs, data URIs) are resolved to an
//! [`ArtifactHandle`] through one entry point, [`ArtifactCache::resolve`]:
//!
//! 1. in-process layer: one `OnceCell` slot per [`CacheKey`]; concurrent
//!    resolves of a key share a single load,
//! 2. durable layer: `{cache_key}.bin` files under the cache directory,
//!    written with temp-file + rename so a key is either absent or complete,
//! 3. remote fetch through a [`Fetcher`].
//!
//! The key covers the reference itself, so a subject whose artifact moved to
//! a new URL gets a new key instead of a stale handle.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use packforge_core::hashing::short_digest;
use packforge_core::subject::SubjectId;
use tokio::sync::OnceCell;

use crate::error::{ClientError, FetchError};

const BLOB_EXTENSION: &str = ".bin";

/// Prefix shared by every key of one subject.
fn subject_prefix(subject: &SubjectId) -> String {
    format!("{}_", short_digest(subject.as_str().as_bytes()))
}

/// `{subject digest}_{reference digest}`, both truncated SHA-256 hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(subject: &SubjectId, reference: &str) -> Self {
        CacheKey(format!(
            "{}{}",
            subject_prefix(subject),
            short_digest(reference.as_bytes())
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn file_name(&self) -> String {
        format!("{}{BLOB_EXTENSION}", self.0)
    }
}

#[derive(Debug)]
struct HandleInner {
    key: CacheKey,
    path: PathBuf,
    bytes: Vec<u8>,
}

/// Shared, immutable view of a cached artifact. Clones point at the same
/// allocation.
#[derive(Debug, Clone)]
pub struct ArtifactHandle(Arc<HandleInner>);

impl ArtifactHandle {
    fn new(key: CacheKey, path: PathBuf, bytes: Vec<u8>) -> Self {
        Self(Arc::new(HandleInner { key, path, bytes }))
    }

    pub fn key(&self) -> &CacheKey {
        &self.0.key
    }

    /// Location of the durable copy.
    pub fn path(&self) -> &Path {
        &self.0.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0.bytes
    }

    pub fn len(&self) -> usize {
        self.0.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.bytes.is_empty()
    }

    /// True if both handles are the same live handle.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

/// Retrieves the bytes behind a remote reference.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetches `http(s)://` references with reqwest and decodes `data:` URIs
/// in place.
#[derive(Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(rest) = reference.strip_prefix("data:") {
            return decode_data_uri(rest);
        }
        if !(reference.starts_with("http://") || reference.starts_with("https://")) {
            return Err(FetchError::UnsupportedScheme(reference.to_string()));
        }

        let response = self.client.get(reference).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Decode the part of a data URI after `data:`.
fn decode_data_uri(rest: &str) -> Result<Vec<u8>, FetchError> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::InvalidDataUri("missing ',' separator".into()))?;
    if meta.ends_with(";base64") {
        STANDARD
            .decode(payload)
            .map_err(|e| FetchError::InvalidDataUri(e.to_string()))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

type Slot = Arc<OnceCell<ArtifactHandle>>;

pub struct ArtifactCache {
    dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl ArtifactCache {
    /// Open a cache rooted at `dir`, creating the directory if needed.
    pub async fn open(
        dir: impl Into<PathBuf>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, ClientError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = %dir.display(), "Opened artifact cache");
        Ok(Self {
            dir,
            fetcher,
            slots: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live handles held by the in-process layer.
    pub fn live_handles(&self) -> usize {
        self.slots().values().filter(|s| s.initialized()).count()
    }

    /// Resolve a remote reference for `subject` to a local handle.
    ///
    /// A failed load leaves no slot and no durable file behind, so the call
    /// can be retried.
    pub async fn resolve(
        &self,
        subject: &SubjectId,
        reference: &str,
    ) -> Result<ArtifactHandle, ClientError> {
        let key = CacheKey::new(subject, reference);
        let slot = self.slots().entry(key.clone()).or_default().clone();

        let result = slot
            .get_or_try_init(|| self.load(&key, reference))
            .await
            .cloned();
        if result.is_err() {
            self.discard_slot(&key, &slot);
        }
        result
    }

    fn discard_slot(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = self.slots();
        let stale = slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.initialized());
        if stale {
            slots.remove(key);
        }
    }

    /// Durable layer, then remote fetch.
    async fn load(&self, key: &CacheKey, reference: &str) -> Result<ArtifactHandle, ClientError> {
        let path = self.dir.join(key.file_name());

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                tracing::debug!(cache_key = key.as_str(), size = bytes.len(), "Durable cache hit");
                return Ok(ArtifactHandle::new(key.clone(), path, bytes));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let bytes = self
            .fetcher
            .fetch(reference)
            .await
            .map_err(|source| ClientError::CacheFetchFailure {
                reference: reference.to_string(),
                source,
            })?;
        let bytes = write_durable(self.dir.clone(), path.clone(), bytes).await?;
        self.drop_if_evicted(key, &path)?;

        tracing::info!(cache_key = key.as_str(), size = bytes.len(), "Cached remote artifact");
        Ok(ArtifactHandle::new(key.clone(), path, bytes))
    }

    /// An eviction that ran while `key` was loading removed its slot, and the
    /// file just written must not outlive it. The caller still gets its
    /// handle. If a newer resolve registered the key again, that slot owns
    /// the file.
    fn drop_if_evicted(&self, key: &CacheKey, path: &Path) -> std::io::Result<()> {
        let slots = self.slots();
        if slots.contains_key(key) {
            return Ok(());
        }
        // Held across the unlink so a new resolve cannot adopt the file first.
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(cache_key = key.as_str(), "Dropped blob written after eviction");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Drop every handle and durable entry of `subject`. Returns the number
    /// of durable entries removed.
    pub async fn evict(&self, subject: &SubjectId) -> Result<usize, ClientError> {
        let prefix = subject_prefix(subject);
        self.slots().retain(|key, _| !key.0.starts_with(&prefix));
        let removed = remove_blobs(&self.dir, |name| name.starts_with(&prefix)).await?;
        tracing::info!(subject_id = %subject, removed, "Evicted subject artifacts");
        Ok(removed)
    }

    /// Drop every handle and clear durable storage.
    pub async fn evict_all(&self) -> Result<usize, ClientError> {
        self.slots().clear();
        let removed = remove_blobs(&self.dir, |_| true).await?;
        tracing::info!(removed, "Cleared artifact cache");
        Ok(removed)
    }
}

/// Write `bytes` to `path` through a temp file in the same directory.
async fn write_durable(dir: PathBuf, path: PathBuf, bytes: Vec<u8>) -> std::io::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(bytes)
    })
    .await
    .map_err(std::io::Error::other)?
}

async fn remove_blobs(dir: &Path, matches: impl Fn(&str) -> bool) -> std::io::Result<usize> {
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.ends_with(BLOB_EXTENSION) || !matches(name) {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn key_depends_on_subject_and_reference() {
        let product = SubjectId::product();
        let front = SubjectId::panel("front").unwrap();

        let a = CacheKey::new(&product, "https://cdn/a.glb");
        assert_eq!(a, CacheKey::new(&product, "https://cdn/a.glb"));
        assert_ne!(a, CacheKey::new(&product, "https://cdn/b.glb"));
        assert_ne!(a, CacheKey::new(&front, "https://cdn/a.glb"));
    }

    #[test]
    fn key_is_fixed_length_and_prefixed_by_subject() {
        let subject = SubjectId::panel("front").unwrap();
        let long_ref = format!("data:image/png;base64,{}", "A".repeat(10_000));

        let key = CacheKey::new(&subject, &long_ref);
        assert_eq!(key.as_str().len(), 16 + 1 + 16);
        assert!(key.as_str().starts_with(&subject_prefix(&subject)));
        assert_eq!(key.file_name(), format!("{}.bin", key.as_str()));
    }

    #[test]
    fn base64_data_uri_is_decoded() {
        assert_eq!(
            decode_data_uri("image/png;base64,aGVsbG8=").unwrap(),
            b"hello".to_vec()
        );
        assert_eq!(decode_data_uri("text/plain,hi").unwrap(), b"hi".to_vec());
    }

    #[test]
    fn malformed_data_uri_is_rejected() {
        assert_matches!(
            decode_data_uri("image/png;base64"),
            Err(FetchError::InvalidDataUri(_))
        );
        assert_matches!(
            decode_data_uri("image/png;base64,@@@"),
            Err(FetchError::InvalidDataUri(_))
        );
    }

    #[tokio::test]
    async fn unsupported_scheme_is_rejected() {
        let fetcher = HttpFetcher::new();
        assert_matches!(
            fetcher.fetch("mock://product/x.glb").await,
            Err(FetchError::UnsupportedScheme(_))
        );
    }
}
