//! # bizreg-store: Optimistic-Concurrency Persistence
//!
//! Every mutating operation runs as one transaction that checks and stamps
//! a monotonic `version`, so of two writers racing on the same version at
//! most one succeeds and the other observes [`DomainError::EditConflict`]
//! instead of silently overwriting.
//!
//! ## Rules applied by every backend
//!
//! - Updates and soft deletes match `id`, `version`, and `deleted = false`
//!   and must touch exactly one row. On zero rows a visibility check inside
//!   the same transaction tells apart a record the caller cannot see
//!   ([`DomainError::RecordNotFound`]) from a stale version
//!   ([`DomainError::EditConflict`]).
//! - Business mutations fuse the membership check into the same statement
//!   as the write, so there is no gap between "is a member" and "apply".
//!   Non-members see `RecordNotFound`, never `EditConflict`.
//! - Creating a Business requires a live, activated acting user and inserts
//!   the creator's membership row in the same transaction; a Business never
//!   exists without a member.
//! - Tombstoned rows are invisible to reads and to uniqueness checks.
//! - Uniqueness violations are translated through the injected
//!   [`DuplicateConstraints`]; anything unrecognized stays a server error.
//!
//! ## Backends
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`PgStore`] | Postgres via SQLx; production. |
//! | [`MemoryStore`] | Same semantics over a locked table set; tests and local runs without `DATABASE_URL`. |
//!
//! [`DomainError::EditConflict`]: bizreg_core::DomainError::EditConflict
//! [`DomainError::RecordNotFound`]: bizreg_core::DomainError::RecordNotFound
//! [`DuplicateConstraints`]: bizreg_core::DuplicateConstraints

pub mod activation;
pub mod error;
pub mod memory;
pub mod pg;
pub mod pool;
pub mod store;
pub mod tx;

use std::sync::Arc;
use std::time::Duration;

use bizreg_core::DuplicateConstraints;

pub use error::StoreError;
pub use memory::{MemoryStore, MemoryTx};
pub use pg::PgStore;
pub use store::Store;
pub use tx::{bounded, run_in_transaction, TxFuture};

/// Settings shared by every statement a store issues.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Bound on each begin/statement/commit.
    pub statement_timeout: Duration,
    /// Uniqueness-constraint lookup used to translate driver errors.
    pub constraints: Arc<DuplicateConstraints>,
}

impl StoreOptions {
    /// Options with the given timeout and constraint table.
    pub fn new(statement_timeout: Duration, constraints: DuplicateConstraints) -> Self {
        Self {
            statement_timeout,
            constraints: Arc::new(constraints),
        }
    }

    /// Translate a uniqueness violation into its domain duplicate error.
    pub fn translate(&self, err: StoreError) -> StoreError {
        err.translate(&self.constraints)
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), DuplicateConstraints::default())
    }
}
