//! End-to-end: the packforge client against a live server socket, through
//! the poll loop and into the artifact cache.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use packforge_client::{
    ArtifactCache, ClientError, HttpFetcher, PackforgeApi, PackforgeClient, PollPolicy,
};
use packforge_core::artifact::ArtifactKind;
use packforge_core::subject::SubjectId;
use packforge_pipeline::fixtures::ProductFixture;
use packforge_pipeline::{DemoFixtures, Generator, MockDelays, MockGenerator};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

/// `hello-model`, base64-encoded.
const MODEL_DATA_URI: &str = "data:model/gltf-binary;base64,aGVsbG8tbW9kZWw=";

async fn serve(
    pool: SqlitePool,
    generator: Arc<dyn Generator>,
    fixtures: DemoFixtures,
    cache_dir: &tempfile::TempDir,
) -> PackforgeClient {
    let (app, _) = common::build_test_app_with(pool, generator, fixtures);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    let api = Arc::new(PackforgeApi::with_client(http, format!("http://{addr}")));
    let cache = ArtifactCache::open(cache_dir.path(), Arc::new(HttpFetcher::new()))
        .await
        .unwrap();
    let policy = PollPolicy {
        interval: Duration::from_millis(10),
        max_attempts: 500,
    };
    PackforgeClient::new(api, cache, policy)
}

fn fixtures() -> DemoFixtures {
    DemoFixtures {
        product_create: Some(ProductFixture {
            prompt: None,
            model_url: MODEL_DATA_URI.into(),
            preview_images: Vec::new(),
        }),
        ..DemoFixtures::default()
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn create_then_resolve_model(pool: SqlitePool) {
    let cache_dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(MockGenerator::new(fixtures(), MockDelays::ZERO));
    let client = serve(pool, generator, fixtures(), &cache_dir).await;
    let product = SubjectId::product();

    let accepted = client
        .api()
        .create_product("A hiking water bottle", 3)
        .await
        .unwrap();
    assert!(accepted.accepted);

    let handle = client
        .await_artifact(&product, ArtifactKind::Model, &CancellationToken::new())
        .await
        .unwrap()
        .expect("product should have a model");
    assert_eq!(handle.bytes(), b"hello-model");
    assert!(handle.path().exists());

    let status = client.reset(&product).await.unwrap();
    assert_eq!(status.status.as_str(), "idle");
    assert_eq!(client.cache().live_handles(), 0);

    let after_reset = client
        .await_artifact(&product, ArtifactKind::Model, &CancellationToken::new())
        .await
        .unwrap();
    assert!(after_reset.is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn missing_demo_fixtures_surface_as_a_server_error(pool: SqlitePool) {
    let cache_dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(MockGenerator::new(DemoFixtures::default(), MockDelays::ZERO));
    let client = serve(pool, generator, DemoFixtures::default(), &cache_dir).await;
    let product = SubjectId::product();

    client
        .api()
        .create_product("A hiking water bottle", 3)
        .await
        .unwrap();
    let err = client
        .await_artifact(&product, ArtifactKind::Model, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ClientError::ServerReportedError { ref message, .. }
            if message == "demo fixtures not configured for product create"
    );
    assert_eq!(client.cache().live_handles(), 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn busy_subject_is_reported_as_conflict(pool: SqlitePool) {
    let cache_dir = tempfile::tempdir().unwrap();
    let generator = common::GatedGenerator::new();
    let client = serve(pool, generator.clone(), DemoFixtures::default(), &cache_dir).await;

    client
        .api()
        .create_product("A ceramic planter", 2)
        .await
        .unwrap();
    let err = client
        .api()
        .edit_product("add a drainage hole")
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "unexpected error: {err}");

    generator.release();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = client.api().status(&SubjectId::product()).await.unwrap();
            if status.status.is_terminal() {
                assert_eq!(status.status.as_str(), "complete");
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job should finish once released");
}
