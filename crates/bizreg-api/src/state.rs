//! # Application State
//!
//! Shared state for the Axum application, passed to route handlers via the
//! `State` extractor. Every field is cheap to clone; the store and the
//! admission registry are shared behind `Arc`.

use std::sync::Arc;

use bizreg_admission::{AdmissionRegistry, SweepConfig, SystemClock};
use bizreg_core::AppConfig;
use bizreg_store::{MemoryStore, Store, StoreOptions};

use crate::middleware::metrics::ApiMetrics;
use crate::password::{PasswordHasher, SaltedSha256};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend.
    pub store: Arc<dyn Store>,
    /// Per-client admission control.
    pub admission: Arc<AdmissionRegistry>,
    /// Hashes passwords before they reach the store.
    pub hasher: Arc<dyn PasswordHasher>,
    /// Process-wide configuration, immutable after startup.
    pub config: Arc<AppConfig>,
    /// Request counters.
    pub metrics: ApiMetrics,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store)
            .field("admission_clients", &self.admission.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Assemble state from already-built components.
    pub fn new(store: Arc<dyn Store>, admission: Arc<AdmissionRegistry>, config: AppConfig) -> Self {
        Self {
            store,
            admission,
            hasher: Arc::new(SaltedSha256),
            config: Arc::new(config),
            metrics: ApiMetrics::new(),
        }
    }

    /// State backed by a [`MemoryStore`] and a registry without a background
    /// sweeper. Used by tests and by local runs without a database.
    pub fn in_memory(config: AppConfig) -> Self {
        let store = MemoryStore::new(StoreOptions {
            statement_timeout: config.db.statement_timeout,
            ..StoreOptions::default()
        });
        let admission = AdmissionRegistry::new(
            config.rate_limiter.clone(),
            SweepConfig::default().stale_after,
            Arc::new(SystemClock),
        );
        Self::new(Arc::new(store), Arc::new(admission), config)
    }
}
