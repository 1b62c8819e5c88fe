use std::path::PathBuf;
use std::time::Duration;

/// Poll cadence and bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed delay between two status requests.
    pub interval: Duration,
    /// Status requests made before giving up with `PollTimeout`.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_attempts: 150,
        }
    }
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Packforge API, without the `/api/v1` suffix.
    pub api_url: String,
    /// Directory of the durable artifact cache.
    pub cache_dir: PathBuf,
    pub poll: PollPolicy,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                  |
    /// |-------------------------------|--------------------------|
    /// | `PACKFORGE_API_URL`           | `http://localhost:3000`  |
    /// | `PACKFORGE_CACHE_DIR`         | `.packforge-cache`       |
    /// | `PACKFORGE_POLL_INTERVAL_MS`  | `2000`                   |
    /// | `PACKFORGE_POLL_MAX_ATTEMPTS` | `150`                    |
    pub fn from_env() -> Self {
        let api_url = std::env::var("PACKFORGE_API_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into());

        let cache_dir = std::env::var("PACKFORGE_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".packforge-cache"));

        let interval_ms: u64 = std::env::var("PACKFORGE_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "2000".into())
            .parse()
            .expect("PACKFORGE_POLL_INTERVAL_MS must be a valid u64");

        let max_attempts: u32 = std::env::var("PACKFORGE_POLL_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "150".into())
            .parse()
            .expect("PACKFORGE_POLL_MAX_ATTEMPTS must be a valid u32");

        Self {
            api_url,
            cache_dir,
            poll: PollPolicy {
                interval: Duration::from_millis(interval_ms),
                max_attempts,
            },
        }
    }
}
