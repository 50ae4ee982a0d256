//! Request middleware: admission control and metrics.

pub mod metrics;
pub mod rate_limit;
