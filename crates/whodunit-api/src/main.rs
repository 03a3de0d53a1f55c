//! Whodunit API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use whodunit_api::config::AppConfig;
use whodunit_api::routes;
use whodunit_api::state::AppState;
use whodunit_core::clock::SystemClock;
use whodunit_core::repository::SnapshotRepository;
use whodunit_core::rng::StdDeterministicRng;
use whodunit_generation::http::HttpGenerationService;
use whodunit_generation::{GenerationAdapter, GenerationService, UnconfiguredGenerationService};
use whodunit_session::application::engine::SessionEngine;
use whodunit_snapshot_store::schema::ensure_schema;
use whodunit_snapshot_store::{InMemorySnapshotRepository, PgSnapshotRepository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    info!("Starting Whodunit API server");

    let config = AppConfig::from_env()?;

    let catalog = config.load_catalog()?;
    if catalog.is_empty() {
        warn!("no scripts loaded, set SCRIPTS_PATH to make sessions startable");
    } else {
        info!(scripts = catalog.len(), "script catalog loaded");
    }

    let repository: Arc<dyn SnapshotRepository> = if let Some(database_url) = &config.database_url
    {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        ensure_schema(&pool).await?;
        Arc::new(PgSnapshotRepository::new(pool))
    } else {
        warn!("DATABASE_URL not set, sessions are kept in memory only");
        Arc::new(InMemorySnapshotRepository::new())
    };

    let service: Arc<dyn GenerationService> = if let Some(generation) = config.generation.clone() {
        Arc::new(HttpGenerationService::new(generation))
    } else {
        warn!("generation endpoints not set, every monologue and answer will be fallback text");
        Arc::new(UnconfiguredGenerationService)
    };
    let generation = Arc::new(GenerationAdapter::new(
        service,
        config.retry,
        Box::new(StdDeterministicRng::from_os()),
    ));

    let engine = Arc::new(SessionEngine::new(
        Arc::new(catalog),
        repository,
        generation,
        Arc::new(SystemClock),
        config.engine,
    ));
    info!(
        max_acts = engine.config().max_acts,
        qna_limit_per_act = engine.config().qna_limit_per_act,
        "session engine ready"
    );
    let app = routes::build_router(AppState::new(Arc::clone(&engine)));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("invalid HOST:PORT combination: {e}"))?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("waiting for pending broadcasts before exit");
    engine.wait_for_broadcasts().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
