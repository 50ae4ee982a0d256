//! Admission failures that are not rate-limit decisions.

use thiserror::Error;

/// Server-side faults raised before a rate decision can be made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// The remote address has no usable host part.
    #[error("cannot derive client identifier from remote address \"{0}\"")]
    UnresolvableClient(String),
}
