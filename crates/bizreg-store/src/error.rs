//! Store error type and constraint translation.

use bizreg_core::{DomainError, DuplicateConstraints};
use thiserror::Error;

/// Everything a store operation can fail with.
///
/// [`StoreError::Domain`] is caller-visible and never retried here. Every
/// other variant is an infrastructure fault that the API reports as an
/// opaque server error.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Not found, edit conflict, duplicate, or invalid data.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A begin/statement/commit exceeded the statement timeout.
    #[error("{operation} timed out")]
    Timeout {
        /// Which step timed out.
        operation: &'static str,
    },

    /// Driver or server error, passed through unchanged.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Embedded migrations failed to apply.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A uniqueness constraint with no entry in the duplicate map was
    /// violated by the in-memory backend.
    #[error("unique constraint {0} violated")]
    UnmappedConstraint(String),
}

impl StoreError {
    /// The domain error, if this is one.
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(err) => Some(err),
            _ => None,
        }
    }

    /// The acting user is unknown, tombstoned, or not yet activated.
    pub fn inactive_actor() -> Self {
        DomainError::invalid("actor", "must be an activated user").into()
    }

    /// True for infrastructure faults.
    pub fn is_server_error(&self) -> bool {
        !matches!(self, Self::Domain(_))
    }

    /// Replace a driver-reported uniqueness violation with its domain
    /// duplicate error. Unknown constraints and every other error pass
    /// through unchanged.
    pub fn translate(self, constraints: &DuplicateConstraints) -> Self {
        let Self::Database(err) = self else {
            return self;
        };
        let mapped = err
            .as_database_error()
            .filter(|db| db.is_unique_violation())
            .and_then(|db| db.constraint())
            .and_then(|name| constraints.lookup(name));
        match mapped {
            Some(domain) => Self::Domain(domain),
            None => Self::Database(err),
        }
    }
}

impl PartialEq<DomainError> for StoreError {
    fn eq(&self, other: &DomainError) -> bool {
        self.domain() == Some(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_are_not_server_errors() {
        assert!(!StoreError::from(DomainError::EditConflict).is_server_error());
        assert!(StoreError::Timeout { operation: "commit" }.is_server_error());
        assert!(StoreError::UnmappedConstraint("x".into()).is_server_error());
    }

    #[test]
    fn non_database_errors_are_not_translated() {
        let constraints = DuplicateConstraints::default();
        let err = StoreError::Timeout { operation: "begin" }.translate(&constraints);
        assert!(matches!(err, StoreError::Timeout { operation: "begin" }));

        let err = StoreError::Database(sqlx::Error::PoolTimedOut).translate(&constraints);
        assert!(matches!(err, StoreError::Database(sqlx::Error::PoolTimedOut)));
    }

    #[test]
    fn compares_against_domain_errors() {
        assert_eq!(StoreError::from(DomainError::RecordNotFound), DomainError::RecordNotFound);
        assert_ne!(StoreError::from(DomainError::EditConflict), DomainError::RecordNotFound);
    }
}
