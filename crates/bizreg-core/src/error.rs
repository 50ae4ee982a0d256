//! # Domain Error Set
//!
//! The closed set of caller-visible failures raised by the admission layer
//! and the store. Infrastructure failures (timeouts, I/O, driver errors) are
//! deliberately absent: they belong to the store's own error type and are
//! always reported as opaque server errors.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Caller-visible failure kinds.
///
/// None of these are retried automatically. A conflict is resolved by the
/// caller re-reading the record and reapplying the change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// No live record is visible to the caller. Also returned when the
    /// caller is not a member of the Business it addressed.
    #[error("record not found")]
    RecordNotFound,

    /// The record exists but the supplied version is stale.
    #[error("edit conflict")]
    EditConflict,

    /// Another live record already uses this email.
    #[error("duplicate email")]
    DuplicateEmail,

    /// Another live record already uses this name.
    #[error("duplicate name")]
    DuplicateName,

    /// Another live record already uses this taxpayer identifier.
    #[error("duplicate cnpj")]
    DuplicateCnpj,

    /// Another live record already uses this phone number.
    #[error("duplicate phone")]
    DuplicatePhone,

    /// Input failed validation; carries per-field messages.
    #[error("invalid data: {0}")]
    InvalidData(ValidationErrors),

    /// The caller exceeded its admission rate.
    #[error("rate limit exceeded")]
    RateLimitExceeded,
}

impl DomainError {
    /// Build an [`DomainError::InvalidData`] with a single field message.
    pub fn invalid(field: &str, message: &str) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        Self::InvalidData(errors)
    }

    /// The field a duplicate error refers to, if this is one.
    pub fn duplicate_field(&self) -> Option<&'static str> {
        match self {
            Self::DuplicateEmail => Some("email"),
            Self::DuplicateName => Some("name"),
            Self::DuplicateCnpj => Some("cnpj"),
            Self::DuplicatePhone => Some("phone"),
            _ => None,
        }
    }
}

/// Per-field validation messages.
///
/// Only the first message recorded for a field is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` for `field` unless the field already has one.
    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.to_string());
    }

    /// Record `message` for `field` when `ok` is false.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    /// True when no field has failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Message recorded for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Convert into `Err(InvalidData)` if any field failed.
    pub fn into_result(self) -> Result<(), DomainError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DomainError::InvalidData(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = ValidationErrors::new();
        errors.add("page", "must be greater than zero");
        errors.add("page", "must be a maximum of 10 million");
        assert_eq!(errors.get("page"), Some("must be greater than zero"));
    }

    #[test]
    fn check_only_records_failures() {
        let mut errors = ValidationErrors::new();
        errors.check(true, "name", "must be provided");
        assert!(errors.is_empty());
        errors.check(false, "name", "must be provided");
        assert!(!errors.is_empty());
    }

    #[test]
    fn into_result_wraps_invalid_data() {
        assert_eq!(ValidationErrors::new().into_result(), Ok(()));
        let err = DomainError::invalid("sort", "invalid sort value")
            .to_string();
        assert!(err.contains("sort: invalid sort value"), "got: {err}");
    }

    #[test]
    fn duplicate_field_names() {
        assert_eq!(DomainError::DuplicateCnpj.duplicate_field(), Some("cnpj"));
        assert_eq!(DomainError::DuplicatePhone.duplicate_field(), Some("phone"));
        assert_eq!(DomainError::EditConflict.duplicate_field(), None);
    }

    #[test]
    fn validation_errors_serialize_as_flat_map() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "must be provided");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({"email": "must be provided"}));
    }
}
