//! # API Route Modules
//!
//! - `users`: registration, activation, and the caller's own account.
//! - `businesses`: membership-scoped business records: list/search, create,
//!   read, versioned update and delete, membership management.
//! - `debug`: in-process counters at `/v1/debug/vars`.

pub mod businesses;
pub mod debug;
pub mod users;
