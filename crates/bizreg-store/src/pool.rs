//! Connection pool setup.

use std::time::Duration;

use bizreg_core::DbConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::StoreError;

/// Open a pool for `cfg.dsn` and apply embedded migrations.
///
/// SQLx has no separate cap on idle connections; `max_idle_conns` is only
/// validated against `max_open_conns`. A zero `max_idle_time` keeps idle
/// connections open indefinitely.
pub async fn connect(cfg: &DbConfig) -> Result<PgPool, StoreError> {
    let idle_timeout = (cfg.max_idle_time > Duration::ZERO).then_some(cfg.max_idle_time);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_open_conns)
        .idle_timeout(idle_timeout)
        .acquire_timeout(cfg.statement_timeout)
        .connect(&cfg.dsn)
        .await?;

    tracing::info!(
        max_open_conns = cfg.max_open_conns,
        max_idle_time_secs = cfg.max_idle_time.as_secs(),
        "connected to PostgreSQL"
    );

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(pool)
}
