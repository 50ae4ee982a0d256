//! # Duplicate-Constraint Map
//!
//! Maps the names of backing-store uniqueness constraints to the domain
//! duplicate error they represent. The table is built once and handed to
//! the store at construction; it is never mutated afterwards.
//!
//! Unknown constraint names map to `None`, and the store passes the
//! original driver error through as an opaque server error.

use std::collections::HashMap;

use crate::error::DomainError;

/// Unique index on live users' email.
pub const USERS_EMAIL_KEY: &str = "users_email_key";
/// Unique index on live users' phone.
pub const USERS_PHONE_KEY: &str = "users_phone_key";
/// Unique index on live businesses' name.
pub const BUSINESS_NAME_KEY: &str = "unique_business_name";
/// Unique index on live businesses' CNPJ.
pub const BUSINESS_CNPJ_KEY: &str = "unique_business_cnpj";
/// Unique index on live businesses' email.
pub const BUSINESS_EMAIL_KEY: &str = "unique_business_email";
/// Unique index on live businesses' phone.
pub const BUSINESS_PHONE_KEY: &str = "unique_business_phone";

/// Immutable constraint-name → duplicate-error lookup.
#[derive(Debug, Clone)]
pub struct DuplicateConstraints {
    by_name: HashMap<String, DomainError>,
}

impl DuplicateConstraints {
    /// An empty table: every constraint violation is opaque.
    pub fn empty() -> Self {
        Self {
            by_name: HashMap::new(),
        }
    }

    /// Build a table from explicit pairs.
    ///
    /// Only duplicate kinds are meaningful targets; any other error kind is
    /// rejected so a constraint can never masquerade as, say, a conflict.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (&'a str, DomainError)>,
    {
        let mut by_name = HashMap::new();
        for (name, kind) in pairs {
            if kind.duplicate_field().is_none() {
                return Err(format!("constraint {name} must map to a duplicate error, got {kind}"));
            }
            by_name.insert(name.to_string(), kind);
        }
        Ok(Self { by_name })
    }

    /// Domain error for `constraint`, if it is a known uniqueness constraint.
    pub fn lookup(&self, constraint: &str) -> Option<DomainError> {
        self.by_name.get(constraint).cloned()
    }

    /// Number of known constraints.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True when no constraint is mapped.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for DuplicateConstraints {
    /// The table matching the shipped migrations.
    fn default() -> Self {
        let by_name = [
            (USERS_EMAIL_KEY, DomainError::DuplicateEmail),
            (USERS_PHONE_KEY, DomainError::DuplicatePhone),
            (BUSINESS_NAME_KEY, DomainError::DuplicateName),
            (BUSINESS_CNPJ_KEY, DomainError::DuplicateCnpj),
            (BUSINESS_EMAIL_KEY, DomainError::DuplicateEmail),
            (BUSINESS_PHONE_KEY, DomainError::DuplicatePhone),
        ]
        .into_iter()
        .map(|(name, kind)| (name.to_string(), kind))
        .collect();
        Self { by_name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_every_duplicate_kind() {
        let table = DuplicateConstraints::default();
        assert_eq!(table.lookup(USERS_EMAIL_KEY), Some(DomainError::DuplicateEmail));
        assert_eq!(table.lookup(USERS_PHONE_KEY), Some(DomainError::DuplicatePhone));
        assert_eq!(table.lookup(BUSINESS_NAME_KEY), Some(DomainError::DuplicateName));
        assert_eq!(table.lookup(BUSINESS_CNPJ_KEY), Some(DomainError::DuplicateCnpj));
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn unknown_constraint_is_opaque() {
        let table = DuplicateConstraints::default();
        assert_eq!(table.lookup("business_members_pkey"), None);
        assert_eq!(table.lookup(""), None);
    }

    #[test]
    fn from_pairs_rejects_non_duplicate_targets() {
        let err = DuplicateConstraints::from_pairs([("x", DomainError::EditConflict)]).unwrap_err();
        assert!(err.contains("x"), "got: {err}");

        let table = DuplicateConstraints::from_pairs([("x", DomainError::DuplicateName)]).unwrap();
        assert_eq!(table.lookup("x"), Some(DomainError::DuplicateName));
        assert!(DuplicateConstraints::empty().is_empty());
    }
}
