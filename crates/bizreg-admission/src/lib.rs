//! # bizreg-admission: Per-Client Admission Control
//!
//! Decides, synchronously on the request path, whether a request from a
//! given client may proceed. Each client identifier (the host part of the
//! remote address) gets its own [`TokenBucket`]; entries idle for longer
//! than the staleness window are evicted by a background [`Sweeper`] so
//! memory stays bounded by the number of recently active clients.
//!
//! ## Locking
//!
//! One `parking_lot::Mutex` guards the client map. `allow` evaluates the
//! bucket while holding it, so a client can never be checked against an
//! entry the sweeper is concurrently removing. Bucket evaluation is a few
//! float operations; nothing blocks or awaits under the lock.
//!
//! ## Lifecycle
//!
//! [`AdmissionRegistry::start`] returns an [`AdmissionControl`] that owns
//! the registry and its sweeper task. Call [`AdmissionControl::shutdown`]
//! to stop the task and wait for it; dropping the control also signals it.

pub mod bucket;
pub mod client;
pub mod clock;
pub mod error;
pub mod registry;
pub mod sweeper;

pub use bucket::TokenBucket;
pub use client::client_id_from_remote_addr;
pub use clock::{Clock, MockClock, SystemClock};
pub use error::AdmissionError;
pub use registry::{AdmissionControl, AdmissionRegistry, SweepConfig};
pub use sweeper::Sweeper;
