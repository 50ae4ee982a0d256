#![deny(missing_docs)]

//! # bizreg-core: Foundational Types for the Business Registry
//!
//! Every other crate in the workspace depends on this one. It has no internal
//! crate dependencies and performs no I/O. Its external dependencies are
//! `serde`, `thiserror` and `chrono`.
//!
//! ## Design Principles
//!
//! 1. **Newtype identifiers.** [`UserId`] and [`BusinessId`] are distinct
//!    types; you cannot pass one where the other is expected.
//!
//! 2. **Closed error set.** [`DomainError`] is the only vocabulary the store
//!    and the admission layer use to describe caller-visible failures. The
//!    HTTP collaborator maps it to status codes and nothing else.
//!
//! 3. **Injected lookups, not globals.** The [`DuplicateConstraints`] table
//!    is an immutable value handed to the store at construction.

pub mod config;
pub mod constraints;
pub mod error;
pub mod model;
pub mod paging;

pub use config::{AppConfig, ConfigError, DbConfig, LimiterConfig};
pub use constraints::DuplicateConstraints;
pub use error::{DomainError, ValidationErrors};
pub use model::{
    ActivationCode, AuditFields, Business, BusinessDraft, BusinessId, NewUser, PasswordHash, User,
    UserId,
};
pub use paging::{
    BusinessFilter, Filters, Metadata, Page, SortDirection, SortSpec, BUSINESS_SORT_SAFELIST,
};
