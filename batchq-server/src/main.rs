use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod repository;
pub mod scheduler;
pub mod service;

use crate::app::App;
use crate::config::{Config, StoreBackend};
use crate::repository::{InMemoryJobStore, JobStore, PgJobStore};
use crate::service::extraction::HttpExtractionClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "batchq_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting batchq server...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Limits: {} call(s)/min, {} concurrent job(s), {} file(s) or {} byte(s) per group",
        config.max_api_calls_per_minute,
        config.max_concurrent_jobs,
        config.max_files_per_group,
        config.max_group_bytes
    );

    let store = open_store(&config).await?;

    let extractor = HttpExtractionClient::new(&config.extraction_url, config.extraction_timeout)
        .context("Failed to create extraction client")?;
    tracing::info!("Extraction service: {}", extractor.endpoint());

    let bind_addr = config.bind_addr.clone();
    let app = App::start(config, store, Arc::new(extractor))
        .await
        .context("Failed to recover interrupted jobs")?;

    // Build router with all API endpoints
    let router = api::create_router(app.service());

    tracing::info!("Listening on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    app.shutdown().await;

    tracing::info!("batchq server stopped");
    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn JobStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is not set")?;

            tracing::info!("Connecting to database...");
            let pool = db::create_pool(database_url)
                .await
                .context("Failed to create database pool")?;
            tracing::info!("Database connection pool created");

            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            Ok(Arc::new(PgJobStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory job store, jobs are lost on restart");
            Ok(Arc::new(InMemoryJobStore::new()))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
