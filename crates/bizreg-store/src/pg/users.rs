//! User persistence operations.
//!
//! All functions take a `&mut PgConnection` so they compose inside one
//! transaction, and operate on the `users` table.

use bizreg_core::{ActivationCode, DomainError, NewUser, User, UserId};
use sqlx::PgConnection;

use super::miss;
use super::rows::{UserRow, USER_COLUMNS};
use crate::error::StoreError;
use crate::tx::bounded;
use crate::StoreOptions;

/// Insert an inactive user holding `code`.
pub async fn insert(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    user: &NewUser,
    code: ActivationCode,
) -> Result<User, StoreError> {
    let sql = format!(
        "INSERT INTO users (name, email, phone, password_hash, activated, activation_code)
         VALUES ($1, $2, $3, $4, false, $5)
         RETURNING {USER_COLUMNS}"
    );
    let row = bounded(
        "users.insert",
        opts.statement_timeout,
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.phone)
            .bind(user.password_hash.as_bytes())
            .bind(code_to_sql(code))
            .fetch_one(&mut *conn),
    )
    .await
    .map_err(|e| opts.translate(e))?;

    Ok(row.into_user())
}

/// Live user by id.
pub async fn get_by_id(conn: &mut PgConnection, opts: &StoreOptions, id: UserId) -> Result<User, StoreError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted = false");
    fetch_one_live(
        "users.get_by_id",
        opts,
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.get())
            .fetch_optional(&mut *conn),
    )
    .await
}

/// Live user by email.
pub async fn get_by_email(conn: &mut PgConnection, opts: &StoreOptions, email: &str) -> Result<User, StoreError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted = false");
    fetch_one_live(
        "users.get_by_email",
        opts,
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&mut *conn),
    )
    .await
}

/// Live user holding `code` under `email`.
pub async fn get_by_email_and_code(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    email: &str,
    code: ActivationCode,
) -> Result<User, StoreError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE email = $1 AND activation_code = $2 AND deleted = false"
    );
    fetch_one_live(
        "users.get_by_email_and_code",
        opts,
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .bind(code_to_sql(code))
            .fetch_optional(&mut *conn),
    )
    .await
}

/// Versioned update of every mutable user field.
pub async fn update(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    user: &User,
    actor: UserId,
) -> Result<User, StoreError> {
    let sql = format!(
        "UPDATE users SET
            name = $1,
            email = $2,
            phone = $3,
            password_hash = $4,
            activated = $5,
            activation_code = $6,
            updated_by = $7,
            updated_at = now(),
            version = version + 1
         WHERE id = $8 AND version = $9 AND deleted = false
         RETURNING {USER_COLUMNS}"
    );
    let row = bounded(
        "users.update",
        opts.statement_timeout,
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.phone)
            .bind(user.password_hash.as_bytes())
            .bind(user.activated)
            .bind(user.activation_code.map(code_to_sql))
            .bind(actor.get())
            .bind(user.id.get())
            .bind(user.audit.version)
            .fetch_optional(&mut *conn),
    )
    .await
    .map_err(|e| opts.translate(e))?;

    match row {
        Some(row) => Ok(row.into_user()),
        None => Err(miss(live_exists(conn, opts, user.id).await?)),
    }
}

/// Versioned soft delete.
pub async fn soft_delete(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    id: UserId,
    version: i32,
    actor: UserId,
) -> Result<(), StoreError> {
    let result = bounded(
        "users.soft_delete",
        opts.statement_timeout,
        sqlx::query(
            "UPDATE users SET
                deleted = true,
                updated_by = $1,
                updated_at = now(),
                version = version + 1
             WHERE id = $2 AND version = $3 AND deleted = false",
        )
        .bind(actor.get())
        .bind(id.get())
        .bind(version)
        .execute(&mut *conn),
    )
    .await?;

    if result.rows_affected() == 0 {
        return Err(miss(live_exists(conn, opts, id).await?));
    }
    Ok(())
}

/// Whether a live user with `id` exists.
pub async fn live_exists(conn: &mut PgConnection, opts: &StoreOptions, id: UserId) -> Result<bool, StoreError> {
    bounded(
        "users.live_exists",
        opts.statement_timeout,
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND deleted = false)",
        )
        .bind(id.get())
        .fetch_one(&mut *conn),
    )
    .await
}

/// Fail with `InvalidData` on `actor` unless `id` is a live, activated
/// user. The row is share-locked until the transaction ends, so it cannot
/// be tombstoned underneath a write that depends on it.
pub async fn require_activated(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    id: UserId,
) -> Result<(), StoreError> {
    let activated = bounded(
        "users.require_activated",
        opts.statement_timeout,
        sqlx::query_scalar::<_, bool>(
            "SELECT activated FROM users WHERE id = $1 AND deleted = false FOR SHARE",
        )
        .bind(id.get())
        .fetch_optional(&mut *conn),
    )
    .await?;

    match activated {
        Some(true) => Ok(()),
        _ => Err(StoreError::inactive_actor()),
    }
}

async fn fetch_one_live<F>(operation: &'static str, opts: &StoreOptions, fut: F) -> Result<User, StoreError>
where
    F: std::future::Future<Output = Result<Option<UserRow>, sqlx::Error>>,
{
    bounded(operation, opts.statement_timeout, fut)
        .await?
        .map(UserRow::into_user)
        .ok_or_else(|| DomainError::RecordNotFound.into())
}

fn code_to_sql(code: ActivationCode) -> i32 {
    // Six-digit codes always fit.
    code.get() as i32
}
