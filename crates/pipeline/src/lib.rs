//! Generation pipeline: the opaque generator seam and the job orchestrator
//! that supervises background generation for each subject.

pub mod config;
pub mod export;
pub mod fixtures;
pub mod generator;
pub mod http;
pub mod mock;
pub mod orchestrator;

pub use config::{GeneratorConfig, GeneratorMode};
pub use export::{ExportError, ExportFiles, ExportFormat, Exporter, HttpExporter};
pub use fixtures::DemoFixtures;
pub use generator::{
    Dimensions, GenerationError, GenerationRequest, Generator, JobPayload, ProgressReporter,
};
pub use http::HttpGenerator;
pub use mock::{MockDelays, MockGenerator};
pub use orchestrator::{JobOrchestrator, OrchestratorError};
