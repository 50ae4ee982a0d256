//! Row types for SQLx mapping.

use bizreg_core::{
    ActivationCode, AuditFields, Business, BusinessDraft, BusinessId, PasswordHash, User, UserId,
};
use chrono::{DateTime, Utc};

/// Columns selected for every user query, in [`UserRow`] order.
pub(crate) const USER_COLUMNS: &str = "id, name, email, phone, password_hash, activated, \
     activation_code, version, deleted, created_at, created_by, updated_at, updated_by";

/// Columns selected for every business query, in [`BusinessRow`] order.
pub(crate) const BUSINESS_COLUMNS: &str = "id, name, cnpj, email, phone, \
     version, deleted, created_at, created_by, updated_at, updated_by";

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    id: i64,
    name: String,
    email: String,
    phone: String,
    password_hash: Vec<u8>,
    activated: bool,
    activation_code: Option<i32>,
    version: i32,
    deleted: bool,
    created_at: DateTime<Utc>,
    created_by: Option<i64>,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<i64>,
}

impl UserRow {
    pub(crate) fn into_user(self) -> User {
        let activation_code = self.activation_code.and_then(|raw| {
            let code = u32::try_from(raw).ok().and_then(ActivationCode::new);
            if code.is_none() {
                tracing::warn!(
                    user_id = self.id,
                    activation_code = raw,
                    "malformed activation code in database, treating as absent"
                );
            }
            code
        });

        User {
            id: UserId::new(self.id),
            name: self.name,
            email: self.email,
            phone: self.phone,
            password_hash: PasswordHash::new(self.password_hash),
            activated: self.activated,
            activation_code,
            audit: AuditFields {
                version: self.version,
                deleted: self.deleted,
                created_at: self.created_at,
                created_by: self.created_by.map(UserId::new),
                updated_at: self.updated_at,
                updated_by: self.updated_by.map(UserId::new),
            },
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BusinessRow {
    id: i64,
    name: String,
    cnpj: String,
    email: String,
    phone: String,
    version: i32,
    deleted: bool,
    created_at: DateTime<Utc>,
    created_by: Option<i64>,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<i64>,
}

impl BusinessRow {
    pub(crate) fn into_business(self) -> Business {
        Business {
            id: BusinessId::new(self.id),
            fields: BusinessDraft {
                name: self.name,
                cnpj: self.cnpj,
                email: self.email,
                phone: self.phone,
            },
            audit: AuditFields {
                version: self.version,
                deleted: self.deleted,
                created_at: self.created_at,
                created_by: self.created_by.map(UserId::new),
                updated_at: self.updated_at,
                updated_by: self.updated_by.map(UserId::new),
            },
        }
    }
}

/// A business row carrying the window count of all matching rows.
#[derive(sqlx::FromRow)]
pub(crate) struct BusinessPageRow {
    pub(crate) total_records: i64,
    #[sqlx(flatten)]
    pub(crate) business: BusinessRow,
}
