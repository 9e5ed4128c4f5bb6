// Orchestrator server
// Decision: the HTTP reconciliation surface plus the two background control
// loops (Scheduler, WorkerSpawner) that make up the orchestrator process.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use orchestrator_core::{
    PluginRegistry, Queue, Scheduler, SqliteMetadataStore, StaticClusterClient, WorkerSpawner,
};
use orchestrator_server::routes::ApiDoc;
use orchestrator_server::{routes, AppState, OrchestratorConfig};
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("orchestrator_server=info,tower_http=info")),
        )
        .init();

    tracing::info!("orchestrator-server starting...");

    let config = OrchestratorConfig::from_env();
    std::fs::create_dir_all(&config.storage_dir)
        .context("Failed to create storage directory")?;

    let store = Arc::new(
        SqliteMetadataStore::connect(&config.sqlite_path())
            .await
            .context("Failed to connect to metadata store")?,
    );
    tracing::info!(path = %config.sqlite_path(), "Connected to metadata store");

    let queue = Arc::new(Queue::new(store.clone()));
    let plugins = PluginRegistry::new();
    let cluster = Arc::new(StaticClusterClient::default());

    let state = AppState::new(
        store.clone() as Arc<dyn orchestrator_core::MetadataStore>,
        queue.clone(),
        plugins,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = Scheduler::new(store.clone(), queue.clone(), config.scheduler.clone());
    let scheduler_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        scheduler.run(scheduler_shutdown).await;
    });

    let spawner = WorkerSpawner::new(
        store.clone(),
        queue.clone(),
        cluster as Arc<dyn orchestrator_core::ClusterClient>,
        config.spawner.clone(),
    );
    let spawner_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        spawner.run(spawner_shutdown).await;
    });

    let cors_origins: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| s.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();

    let app = routes::routes(state);
    let app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    let app = if !cors_origins.is_empty() {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
        )
    } else {
        app
    };

    let app = app.layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!(addr = %config.bind_addr, "HTTP server listening");

    let serve = axum::serve(listener, app);
    tokio::select! {
        result = serve => {
            result.context("Server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    }

    tracing::info!("orchestrator-server shutdown complete");
    Ok(())
}
