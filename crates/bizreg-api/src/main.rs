//! # bizreg-api: Binary Entry Point
//!
//! Parses configuration, connects the store, starts the admission sweeper,
//! and serves until Ctrl-C. The sweeper is stopped after the server drains.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use bizreg_admission::{AdmissionRegistry, SweepConfig, SystemClock};
use bizreg_api::cli::Cli;
use bizreg_api::state::AppState;
use bizreg_store::{MemoryStore, PgStore, Store, StoreOptions};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize structured tracing.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let sweep = SweepConfig::every(cli.sweep_interval);
    let config = cli.into_config();
    config.validate().context("invalid configuration")?;

    let store: Arc<dyn Store> = if config.db.dsn.is_empty() {
        tracing::warn!("no database DSN configured; using the in-memory store");
        Arc::new(MemoryStore::new(StoreOptions {
            statement_timeout: config.db.statement_timeout,
            ..StoreOptions::default()
        }))
    } else {
        let store = PgStore::connect(&config.db).await.map_err(|e| {
            tracing::error!("Database initialization failed: {e}");
            e
        })?;
        Arc::new(store)
    };

    let control = AdmissionRegistry::start(
        config.rate_limiter.clone(),
        sweep,
        Arc::new(SystemClock),
    );

    let port = config.port;
    let env = config.env.clone();
    let state = AppState::new(store, control.registry(), config);
    let app = bizreg_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, env = %env, "bizreg API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    control.shutdown().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
    tracing::info!("shutting down");
}
