//! # Versioned Records
//!
//! Persisted entities share [`AuditFields`]: a `version` counter that starts
//! at 1 and grows by exactly one on every successful update or soft delete,
//! a `deleted` tombstone flag, and created/updated audit stamps.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;

/// Maximum byte length accepted for names.
pub const MAX_NAME_LEN: usize = 500;

/// Identifier of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Wrap a raw row id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw row id.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a Business record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessId(i64);

impl BusinessId {
    /// Wrap a raw row id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw row id.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for BusinessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Version, tombstone, and audit stamps carried by every persisted entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    /// Optimistic-concurrency stamp. Starts at 1.
    pub version: i32,
    /// Soft-delete flag. Tombstoned rows are invisible to reads and to
    /// uniqueness checks.
    pub deleted: bool,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    /// Acting user at insertion, when there was one.
    pub created_by: Option<UserId>,
    /// Time of the last update.
    pub updated_at: Option<DateTime<Utc>>,
    /// Acting user of the last update.
    pub updated_by: Option<UserId>,
}

impl AuditFields {
    /// Stamps for a freshly inserted row.
    pub fn created(at: DateTime<Utc>, by: Option<UserId>) -> Self {
        Self {
            version: 1,
            deleted: false,
            created_at: at,
            created_by: by,
            updated_at: None,
            updated_by: None,
        }
    }

    /// Apply a successful versioned write.
    pub fn touch(&mut self, at: DateTime<Utc>, by: Option<UserId>) {
        self.version += 1;
        self.updated_at = Some(at);
        self.updated_by = by;
    }
}

/// Opaque password hash. Hashing is done by the caller; the store only
/// persists the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(Vec<u8>);

impl PasswordHash {
    /// Wrap hash bytes produced by the caller's hasher.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw hash bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// Six-digit account activation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ActivationCode(u32);

impl ActivationCode {
    /// Smallest valid code.
    pub const MIN: u32 = 100_000;
    /// Largest valid code.
    pub const MAX: u32 = 999_999;

    /// Accept `code` if it has exactly six digits.
    pub fn new(code: u32) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&code).then_some(Self(code))
    }

    /// The code `offset` places above [`Self::MIN`], wrapping within the
    /// six-digit range.
    pub fn from_offset(offset: u32) -> Self {
        Self(Self::MIN + offset % (Self::MAX - Self::MIN + 1))
    }

    /// The numeric code.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for ActivationCode {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::new(code).ok_or_else(|| format!("activation code {code} is not six digits"))
    }
}

impl From<ActivationCode> for u32 {
    fn from(code: ActivationCode) -> Self {
        code.0
    }
}

/// Registration input for a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Login email; unique among live users.
    pub email: String,
    /// Contact phone; unique among live users.
    pub phone: String,
    /// Hash of the chosen password.
    pub password_hash: PasswordHash,
}

impl NewUser {
    /// Presence and length checks. Format rules belong to the caller.
    pub fn validate(&self) -> ValidationErrors {
        let mut v = ValidationErrors::new();
        check_name(&mut v, &self.name);
        v.check(!self.email.is_empty(), "email", "must be provided");
        v.check(!self.phone.is_empty(), "phone", "must be provided");
        v.check(
            !self.password_hash.as_bytes().is_empty(),
            "password",
            "must be provided",
        );
        v
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Row id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Contact phone.
    pub phone: String,
    /// Hash of the account password.
    pub password_hash: PasswordHash,
    /// Whether the activation code has been redeemed.
    pub activated: bool,
    /// Pending activation code; cleared on activation.
    pub activation_code: Option<ActivationCode>,
    /// Version and audit stamps.
    pub audit: AuditFields,
}

/// Mutable fields of a Business, used for both creation and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessDraft {
    /// Trading name; unique among live businesses.
    pub name: String,
    /// Brazilian taxpayer identifier; unique among live businesses.
    pub cnpj: String,
    /// Contact email; unique among live businesses.
    pub email: String,
    /// Contact phone; unique among live businesses.
    pub phone: String,
}

impl BusinessDraft {
    /// Presence and length checks. Format rules belong to the caller.
    pub fn validate(&self) -> ValidationErrors {
        let mut v = ValidationErrors::new();
        check_name(&mut v, &self.name);
        v.check(!self.cnpj.is_empty(), "cnpj", "must be provided");
        v.check(!self.email.is_empty(), "email", "must be provided");
        v.check(!self.phone.is_empty(), "phone", "must be provided");
        v
    }
}

/// A Business record shared among its member users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    /// Row id.
    pub id: BusinessId,
    /// Current field values.
    #[serde(flatten)]
    pub fields: BusinessDraft,
    /// Version and audit stamps.
    pub audit: AuditFields,
}

fn check_name(v: &mut ValidationErrors, name: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(
        name.len() <= MAX_NAME_LEN,
        "name",
        "must not be more than 500 bytes long",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> BusinessDraft {
        BusinessDraft {
            name: "Padaria Central".into(),
            cnpj: "11.222.333/0001-81".into(),
            email: "contato@padaria.example".into(),
            phone: "+55 11 5555-0100".into(),
        }
    }

    #[test]
    fn created_audit_starts_at_version_one() {
        let audit = AuditFields::created(Utc::now(), Some(UserId::new(3)));
        assert_eq!(audit.version, 1);
        assert!(!audit.deleted);
        assert!(audit.updated_at.is_none());
    }

    #[test]
    fn touch_increments_version_by_one() {
        let mut audit = AuditFields::created(Utc::now(), None);
        audit.touch(Utc::now(), Some(UserId::new(9)));
        assert_eq!(audit.version, 2);
        assert_eq!(audit.updated_by, Some(UserId::new(9)));
    }

    #[test]
    fn activation_code_range() {
        assert!(ActivationCode::new(99_999).is_none());
        assert!(ActivationCode::new(1_000_000).is_none());
        assert_eq!(ActivationCode::new(123_456).map(ActivationCode::get), Some(123_456));
        assert_eq!(ActivationCode::from_offset(0).get(), 100_000);
        assert_eq!(ActivationCode::from_offset(900_000).get(), 100_000);
    }

    #[test]
    fn password_hash_debug_is_redacted() {
        let hash = PasswordHash::new(b"$2a$12$secret".to_vec());
        assert!(!format!("{hash:?}").contains("secret"));
    }

    #[test]
    fn draft_validation_reports_missing_fields() {
        let mut d = draft();
        assert!(d.validate().is_empty());
        d.cnpj.clear();
        d.name = "x".repeat(MAX_NAME_LEN + 1);
        let errors = d.validate();
        assert_eq!(errors.get("cnpj"), Some("must be provided"));
        assert_eq!(errors.get("name"), Some("must not be more than 500 bytes long"));
    }

    #[test]
    fn new_user_requires_password_hash() {
        let user = NewUser {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            phone: "+55 21 5555-0101".into(),
            password_hash: PasswordHash::new(Vec::new()),
        };
        assert_eq!(user.validate().get("password"), Some("must be provided"));
    }
}
