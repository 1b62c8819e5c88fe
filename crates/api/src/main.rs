use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use packforge_api::config::ServerConfig;
use packforge_api::router::build_app_router;
use packforge_api::state::AppState;
use packforge_events::{EventBus, EventPersistence};
use packforge_pipeline::{GeneratorConfig, JobOrchestrator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "packforge_api=debug,packforge_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let generator_config = GeneratorConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        generator_mode = ?generator_config.mode,
        "Loaded server configuration",
    );

    // --- Database ---
    let pool = packforge_db::create_pool(&config.database_url)
        .await
        .expect("Failed to open database");
    tracing::info!("Database connection pool created");

    packforge_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    packforge_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let persistence_handle = tokio::spawn(EventPersistence::run(pool.clone(), event_bus.subscribe()));

    // --- Orchestrator ---
    let fixtures = Arc::new(generator_config.load_fixtures());
    let generator = generator_config
        .build_generator(fixtures.as_ref().clone())
        .expect("Failed to build generator");
    let exporter = generator_config
        .build_exporter()
        .expect("Failed to build exporter");
    let orchestrator = Arc::new(JobOrchestrator::new(
        pool.clone(),
        generator,
        Arc::clone(&event_bus),
    ));

    // Nothing from a previous process can still be running.
    let reconciled = orchestrator
        .reconcile_at_startup()
        .await
        .expect("Failed to reconcile interrupted jobs");
    if !reconciled.is_empty() {
        tracing::warn!(count = reconciled.len(), "Interrupted jobs reconciled at startup");
    }

    // --- App state & router ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
        fixtures,
        exporter,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, draining jobs");

    let drained = orchestrator
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    if !drained {
        tracing::warn!(
            running = orchestrator.running_jobs(),
            "Shutdown timeout elapsed with jobs still running; they will be reconciled on restart",
        );
    }

    // Dropping the last bus handle closes the channel and stops persistence.
    drop(orchestrator);
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), persistence_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
