use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::export::{ExportError, Exporter, HttpExporter};
use crate::fixtures::DemoFixtures;
use crate::generator::{GenerationError, Generator};
use crate::http::HttpGenerator;
use crate::mock::{MockDelays, MockGenerator};

/// Which generator implementation backs the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorMode {
    /// Staged fake progress with fixture artifacts.
    Mock,
    /// External generation service.
    Http,
}

impl std::str::FromStr for GeneratorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(GeneratorMode::Mock),
            "http" => Ok(GeneratorMode::Http),
            other => Err(format!("unknown generator mode '{other}'")),
        }
    }
}

/// Generator configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub mode: GeneratorMode,
    /// Base URL of the generation service; required in `http` mode.
    pub url: Option<String>,
    /// Upper bound on one outbound generation or export request.
    pub timeout: Duration,
    /// Base URL of the format export service. Export is unavailable without it.
    pub export_url: Option<String>,
    /// JSON file with pre-generated demo artifacts.
    pub fixtures_path: Option<PathBuf>,
    pub delays: MockDelays,
}

fn secs_var(name: &str, default: u64) -> Duration {
    let secs: u64 = std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid u64"));
    Duration::from_secs(secs)
}

impl GeneratorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `GENERATOR_MODE`          | `mock`  |
    /// | `GENERATOR_URL`           | none    |
    /// | `GENERATOR_TIMEOUT_SECS`  | `300`   |
    /// | `EXPORTER_URL`            | none    |
    /// | `DEMO_FIXTURES_PATH`      | none    |
    /// | `DEMO_CREATE_DELAY_SECS`  | `8`     |
    /// | `DEMO_EDIT_DELAY_SECS`    | `6`     |
    /// | `DEMO_TEXTURE_DELAY_SECS` | `4`     |
    pub fn from_env() -> Self {
        let mode: GeneratorMode = std::env::var("GENERATOR_MODE")
            .unwrap_or_else(|_| "mock".into())
            .parse()
            .expect("GENERATOR_MODE must be 'mock' or 'http'");

        let url = std::env::var("GENERATOR_URL").ok().filter(|s| !s.is_empty());
        if mode == GeneratorMode::Http && url.is_none() {
            panic!("GENERATOR_URL must be set when GENERATOR_MODE=http");
        }

        let timeout = secs_var("GENERATOR_TIMEOUT_SECS", 300);
        let export_url = std::env::var("EXPORTER_URL").ok().filter(|s| !s.is_empty());

        let fixtures_path = std::env::var("DEMO_FIXTURES_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let delays = MockDelays {
            create: secs_var("DEMO_CREATE_DELAY_SECS", 8),
            edit: secs_var("DEMO_EDIT_DELAY_SECS", 6),
            texture: secs_var("DEMO_TEXTURE_DELAY_SECS", 4),
        };

        Self {
            mode,
            url,
            timeout,
            export_url,
            fixtures_path,
            delays,
        }
    }

    /// Demo fixtures, used by the mock generator and demo seeding.
    pub fn load_fixtures(&self) -> DemoFixtures {
        DemoFixtures::load_or_default(self.fixtures_path.as_deref())
    }

    /// Build the configured generator.
    pub fn build_generator(
        &self,
        fixtures: DemoFixtures,
    ) -> Result<Arc<dyn Generator>, GenerationError> {
        let generator: Arc<dyn Generator> = match (self.mode, &self.url) {
            (GeneratorMode::Http, Some(url)) => {
                tracing::info!(url = %url, timeout = ?self.timeout, "Using HTTP generator");
                Arc::new(HttpGenerator::new(url.clone(), self.timeout)?)
            }
            _ => {
                tracing::info!(delays = ?self.delays, "Using mock generator");
                Arc::new(MockGenerator::new(fixtures, self.delays))
            }
        };
        Ok(generator)
    }

    /// Build the exporter, if an export service is configured.
    pub fn build_exporter(&self) -> Result<Option<Arc<dyn Exporter>>, ExportError> {
        let Some(url) = &self.export_url else {
            tracing::info!("No export service configured");
            return Ok(None);
        };
        tracing::info!(url = %url, "Using HTTP exporter");
        let exporter: Arc<dyn Exporter> = Arc::new(HttpExporter::new(url.clone(), self.timeout)?);
        Ok(Some(exporter))
    }
}
