//! # Scoped Transactions and Statement Timeouts
//!
//! [`run_in_transaction`] begins a transaction, hands the connection to a
//! unit of work, and commits only if the work succeeds. `sqlx::Transaction`
//! rolls back when dropped, so every other exit path (an `Err` from the
//! work, a timeout, a panic unwinding through the future, or the caller
//! dropping the future) leaves nothing committed.
//!
//! Every begin, statement, and commit is bounded by [`bounded`]; expiry is
//! reported as [`StoreError::Timeout`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use sqlx::{PgConnection, PgPool};

use crate::error::StoreError;

/// Future returned by a unit of work, borrowing the transaction's connection.
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'c>>;

/// Run `fut` with a deadline of `limit`.
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "database operation timed out"
            );
            Err(StoreError::Timeout { operation })
        }
    }
}

/// Execute `work` inside one transaction.
///
/// Errors returned by `work` propagate unchanged after rollback. A commit
/// failure surfaces as a server error.
///
/// ```ignore
/// let business = run_in_transaction(&pool, timeout, move |conn| {
///     Box::pin(async move {
///         let business = businesses::insert(conn, &opts, &draft, actor).await?;
///         memberships::insert(conn, &opts, business.id, actor, actor).await?;
///         Ok(business)
///     })
/// })
/// .await?;
/// ```
pub async fn run_in_transaction<T, F>(pool: &PgPool, limit: Duration, work: F) -> Result<T, StoreError>
where
    T: Send,
    F: for<'c> FnOnce(&'c mut PgConnection) -> TxFuture<'c, T> + Send,
{
    let mut tx = bounded("begin", limit, pool.begin()).await?;
    let value = work(&mut *tx).await?;
    bounded("commit", limit, tx.commit()).await?;
    Ok(value)
}
