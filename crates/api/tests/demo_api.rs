//! HTTP-level tests for the demo seeding helpers and the event log.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, get, poll_until_terminal, post_empty, post_json};
use packforge_pipeline::fixtures::{PackagingFixture, PanelTextureFixture, ProductFixture};
use packforge_pipeline::{DemoFixtures, MockDelays, MockGenerator};
use serde_json::json;
use sqlx::SqlitePool;

fn fixtures() -> DemoFixtures {
    DemoFixtures {
        product: Some(ProductFixture {
            prompt: Some("Trail running shoe".into()),
            model_url: "https://cdn.test/shoe.glb".into(),
            preview_images: vec!["https://cdn.test/shoe.png".into()],
        }),
        packaging: Some(PackagingFixture {
            package_type: Some("box".into()),
            panel_textures: BTreeMap::from([
                (
                    "front".to_string(),
                    PanelTextureFixture {
                        texture_url: "https://cdn.test/front.png".into(),
                        prompt: None,
                    },
                ),
                (
                    "back".to_string(),
                    PanelTextureFixture {
                        texture_url: "PASTE_URL_HERE".into(),
                        prompt: None,
                    },
                ),
            ]),
        }),
        ..DemoFixtures::default()
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn seed_product_creates_completed_iteration(pool: SqlitePool) {
    let app = common::build_test_app(pool);

    let response = post_json(
        app.clone(),
        "/api/v1/demo/seed-product",
        json!({ "model_url": "https://cdn.test/seed.glb" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["product"], "product");

    let state = body_json(get(app.clone(), "/api/v1/product").await).await;
    assert_eq!(state["data"]["status"], "complete");
    assert_eq!(state["data"]["iterations"][0]["prompt"], "Demo Product");
    assert_eq!(state["data"]["iterations"][0]["note"], "Pre-loaded for demo");

    // A seeded product can be edited.
    let response = post_json(
        app.clone(),
        "/api/v1/product/edit",
        json!({ "prompt": "make it blue" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let done = poll_until_terminal(&app, "/api/v1/product/status").await;
    assert_eq!(done["data"]["status"], "complete");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn seed_product_requires_model_url(pool: SqlitePool) {
    let app = common::build_test_app(pool);

    let response = post_json(
        app,
        "/api/v1/demo/seed-product",
        json!({ "model_url": "  " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn seed_packaging_skips_empty_urls(pool: SqlitePool) {
    let app = common::build_test_app(pool);

    let response = post_json(
        app.clone(),
        "/api/v1/demo/seed-packaging",
        json!({
            "panel_textures": {
                "front": { "texture_url": "https://cdn.test/front.png" },
                "side": { "texture_url": "" }
            }
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["panels"], json!(["panel:front"]));

    let response = get(app, "/api/v1/packaging/panels/front/texture").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["data"]["reference"],
        "https://cdn.test/front.png"
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn seed_packaging_with_a_bad_panel_id_seeds_nothing(pool: SqlitePool) {
    let app = common::build_test_app(pool);

    let response = post_json(
        app.clone(),
        "/api/v1/demo/seed-packaging",
        json!({
            "panel_textures": {
                "front": { "texture_url": "https://cdn.test/front.png" },
                "zz top!": { "texture_url": "https://cdn.test/top.png" }
            }
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let state = body_json(get(app.clone(), "/api/v1/packaging/state").await).await;
    assert_eq!(state["data"]["panels"], json!([]));
    let response = get(app, "/api/v1/packaging/panels/front/texture").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn seed_from_fixtures_uses_usable_entries(pool: SqlitePool) {
    let generator = Arc::new(MockGenerator::new(fixtures(), MockDelays::ZERO));
    let (app, _) = common::build_test_app_with(pool, generator, fixtures());

    let response = post_empty(app.clone(), "/api/v1/demo/seed-from-fixtures").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["product"], "product");
    assert_eq!(json["data"]["panels"], json!(["panel:front"]));

    let response = get(app, "/api/v1/product/artifacts/model").await;
    assert_eq!(
        body_json(response).await["data"]["reference"],
        "https://cdn.test/shoe.glb"
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn seed_from_empty_fixtures_is_404(pool: SqlitePool) {
    let app = common::build_test_app(pool);

    let response = post_empty(app, "/api/v1/demo/seed-from-fixtures").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn clear_resets_every_subject(pool: SqlitePool) {
    let generator = Arc::new(MockGenerator::new(fixtures(), MockDelays::ZERO));
    let (app, _) = common::build_test_app_with(pool, generator, fixtures());
    post_empty(app.clone(), "/api/v1/demo/seed-from-fixtures").await;

    let response = post_empty(app.clone(), "/api/v1/demo/clear").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["cleared"], json!(["product", "panel:front"]));
    assert_eq!(json["data"]["busy"], json!([]));

    let response = get(app.clone(), "/api/v1/product/artifacts/model").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = get(app, "/api/v1/packaging/panels/front/texture").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn job_events_are_recorded(pool: SqlitePool) {
    let app = common::build_test_app(pool);

    post_json(
        app.clone(),
        "/api/v1/product/create",
        json!({ "prompt": "A steel lunch box" }),
    )
    .await;
    poll_until_terminal(&app, "/api/v1/product/status").await;

    let events = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            let json = body_json(get(app.clone(), "/api/v1/events?subject_id=product").await).await;
            let types: Vec<String> = json["data"]
                .as_array()
                .unwrap()
                .iter()
                .map(|e| e["event_type"].as_str().unwrap().to_string())
                .collect();
            if types.iter().any(|t| t == "job.completed") {
                return types;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("completion event should be persisted");

    assert!(events.contains(&"job.started".to_string()));
}
