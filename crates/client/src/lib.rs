//! Client side of the generation job protocol: a typed HTTP client for the
//! Packforge API, the status poll loop, and a two-layer artifact cache that
//! turns remote artifact references into stable local handles.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod poll;

pub use api::{ArtifactLookup, Dimensions, PackforgeApi, PanelTextureRequest};
pub use cache::{ArtifactCache, ArtifactHandle, CacheKey, Fetcher, HttpFetcher};
pub use client::PackforgeClient;
pub use config::{ClientConfig, PollPolicy};
pub use error::{ClientError, FetchError};
pub use poll::{Observation, PollMachine, PollOutcome, PollState, Poller, StatusSource, Step};
