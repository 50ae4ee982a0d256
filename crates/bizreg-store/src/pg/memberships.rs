//! Business membership rows.

use bizreg_core::{Business, BusinessId, DomainError, UserId};
use sqlx::PgConnection;

use super::{businesses, users};
use crate::error::StoreError;
use crate::tx::bounded;
use crate::StoreOptions;

/// Insert a membership. Returns `false` if it already existed.
pub async fn insert(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    business_id: BusinessId,
    user_id: UserId,
    actor: UserId,
) -> Result<bool, StoreError> {
    let result = bounded(
        "business_members.insert",
        opts.statement_timeout,
        sqlx::query(
            "INSERT INTO business_members (business_id, user_id, created_by)
             VALUES ($1, $2, $3)
             ON CONFLICT (business_id, user_id) DO NOTHING",
        )
        .bind(business_id.get())
        .bind(user_id.get())
        .bind(actor.get())
        .execute(&mut *conn),
    )
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Delete a membership. Returns `false` if there was none.
pub async fn delete(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    business_id: BusinessId,
    user_id: UserId,
) -> Result<bool, StoreError> {
    let result = bounded(
        "business_members.delete",
        opts.statement_timeout,
        sqlx::query("DELETE FROM business_members WHERE business_id = $1 AND user_id = $2")
            .bind(business_id.get())
            .bind(user_id.get())
            .execute(&mut *conn),
    )
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Member ids of a Business, ascending.
pub async fn list(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    business_id: BusinessId,
) -> Result<Vec<UserId>, StoreError> {
    let ids = bounded(
        "business_members.list",
        opts.statement_timeout,
        sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM business_members WHERE business_id = $1 ORDER BY user_id",
        )
        .bind(business_id.get())
        .fetch_all(&mut *conn),
    )
    .await?;

    Ok(ids.into_iter().map(UserId::new).collect())
}

/// Grant `member` access on behalf of `actor`, who must already be a member.
pub async fn add_as_member(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    id: BusinessId,
    version: i32,
    member: UserId,
    actor: UserId,
) -> Result<Business, StoreError> {
    let business = businesses::bump_version_as_member(conn, opts, id, version, actor).await?;
    if !users::live_exists(conn, opts, member).await? {
        return Err(DomainError::invalid("member", "user does not exist").into());
    }
    if !insert(conn, opts, id, member, actor).await? {
        return Err(DomainError::invalid("member", "is already a member").into());
    }
    Ok(business)
}

/// Revoke `member`'s access on behalf of `actor`. The last member cannot
/// be removed.
pub async fn remove_as_member(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    id: BusinessId,
    version: i32,
    member: UserId,
    actor: UserId,
) -> Result<Business, StoreError> {
    let business = businesses::bump_version_as_member(conn, opts, id, version, actor).await?;
    if !delete(conn, opts, id, member).await? {
        return Err(DomainError::RecordNotFound.into());
    }
    if list(conn, opts, id).await?.is_empty() {
        return Err(DomainError::invalid("member", "cannot remove the last member").into());
    }
    Ok(business)
}
