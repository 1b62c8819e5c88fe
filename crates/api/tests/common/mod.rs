#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use packforge_api::config::ServerConfig;
use packforge_api::router::build_app_router;
use packforge_api::state::AppState;
use packforge_events::EventBus;
use packforge_pipeline::{
    DemoFixtures, Exporter, Generator, JobOrchestrator, MockDelays, MockGenerator,
};
use sqlx::SqlitePool;
use tower::ServiceExt;

/// Test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: "sqlite::memory:".to_string(),
    }
}

pub const CREATE_MODEL: &str = "data:model/gltf-binary;base64,Y3JlYXRl";
pub const EDIT_MODEL: &str = "data:model/gltf-binary;base64,ZWRpdA==";

/// Inline artifacts for every job kind the API tests run.
pub fn test_fixtures() -> DemoFixtures {
    serde_json::from_value(serde_json::json!({
        "product_create": {
            "model_url": CREATE_MODEL,
            "preview_images": ["data:image/png;base64,cHJldmlldw=="]
        },
        "product_edit": { "model_url": EDIT_MODEL },
        "packaging": {
            "panel_textures": {
                "front": { "texture_url": "data:image/png;base64,ZnJvbnQ=" },
                "back": { "texture_url": "data:image/png;base64,YmFjaw==" },
                "lid": { "texture_url": "data:image/png;base64,bGlk" }
            }
        }
    }))
    .unwrap()
}

fn mock_generator() -> Arc<dyn Generator> {
    Arc::new(MockGenerator::new(test_fixtures(), MockDelays::ZERO))
}

/// Full application router backed by an instant mock generator. The demo
/// endpoints see no fixtures.
pub fn build_test_app(pool: SqlitePool) -> Router {
    build_test_app_with(pool, mock_generator(), DemoFixtures::default()).0
}

/// Mock-backed router with an export service.
pub fn build_test_app_with_exporter(pool: SqlitePool, exporter: Arc<dyn Exporter>) -> Router {
    build_app(pool, mock_generator(), DemoFixtures::default(), Some(exporter)).0
}

/// Full application router with a custom generator and fixtures.
pub fn build_test_app_with(
    pool: SqlitePool,
    generator: Arc<dyn Generator>,
    fixtures: DemoFixtures,
) -> (Router, Arc<JobOrchestrator>) {
    build_app(pool, generator, fixtures, None)
}

fn build_app(
    pool: SqlitePool,
    generator: Arc<dyn Generator>,
    fixtures: DemoFixtures,
    exporter: Option<Arc<dyn Exporter>>,
) -> (Router, Arc<JobOrchestrator>) {
    let config = test_config();
    let event_bus = Arc::new(EventBus::default());
    tokio::spawn(packforge_events::EventPersistence::run(
        pool.clone(),
        event_bus.subscribe(),
    ));
    let orchestrator = Arc::new(JobOrchestrator::new(pool.clone(), generator, event_bus));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
        fixtures: Arc::new(fixtures),
        exporter,
    };
    (build_app_router(state, &config), orchestrator)
}

pub async fn send(app: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response {
    send(app, Method::POST, uri, Some(json)).await
}

pub async fn post_empty(app: Router, uri: &str) -> Response {
    send(app, Method::POST, uri, None).await
}

pub async fn delete(app: Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll a status endpoint until it reports `complete` or `error`.
pub async fn poll_until_terminal(app: &Router, uri: &str) -> serde_json::Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let response = get(app.clone(), uri).await;
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            let status = json["data"]["status"].as_str().unwrap_or_default().to_string();
            if status == "complete" || status == "error" {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("status should become terminal")
}

/// Generator that blocks until the test releases it, so requests can be
/// made while a job is still running.
pub struct GatedGenerator {
    gate: tokio::sync::Semaphore,
}

impl GatedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: tokio::sync::Semaphore::new(0),
        })
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait::async_trait]
impl Generator for GatedGenerator {
    async fn generate(
        &self,
        request: &packforge_pipeline::GenerationRequest,
        progress: &dyn packforge_pipeline::ProgressReporter,
    ) -> Result<packforge_core::artifact::ArtifactRefs, packforge_pipeline::GenerationError> {
        use packforge_core::artifact::{ArtifactKind, ArtifactRefs};

        progress.report(50, "Halfway").await;
        let permit = self.gate.acquire().await.map_err(|e| {
            packforge_pipeline::GenerationError::Failed(e.to_string())
        })?;
        permit.forget();

        let kind = match request.subject_id.panel_id() {
            Some(_) => ArtifactKind::Texture,
            None => ArtifactKind::Model,
        };
        Ok(ArtifactRefs::from([(
            kind,
            format!("https://cdn.test/{}.bin", request.subject_id.as_str().replace(':', "_")),
        )]))
    }
}

/// Wait until a gated job has reported its first progress.
pub async fn wait_for_progress(app: &Router, uri: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let json = body_json(get(app.clone(), uri).await).await;
            if json["data"]["progress"] == 50 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job should report progress");
}
