//! Business persistence operations.
//!
//! Every read and write that takes an `actor` carries the membership check
//! in the same statement as the data access, as an `EXISTS` over
//! `business_members`.

use bizreg_core::{Business, BusinessDraft, BusinessFilter, BusinessId, DomainError, Metadata, Page, UserId};
use sqlx::PgConnection;

use super::miss;
use super::rows::{BusinessPageRow, BusinessRow, BUSINESS_COLUMNS};
use crate::error::StoreError;
use crate::tx::bounded;
use crate::StoreOptions;

/// Insert a Business. The caller inserts the creator's membership in the
/// same transaction.
pub async fn insert(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    draft: &BusinessDraft,
    actor: UserId,
) -> Result<Business, StoreError> {
    let sql = format!(
        "INSERT INTO business (name, cnpj, email, phone, created_by)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {BUSINESS_COLUMNS}"
    );
    let row = bounded(
        "business.insert",
        opts.statement_timeout,
        sqlx::query_as::<_, BusinessRow>(&sql)
            .bind(&draft.name)
            .bind(&draft.cnpj)
            .bind(&draft.email)
            .bind(&draft.phone)
            .bind(actor.get())
            .fetch_one(&mut *conn),
    )
    .await
    .map_err(|e| opts.translate(e))?;

    Ok(row.into_business())
}

/// Live Business `actor` is a member of.
pub async fn get_for_member(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    id: BusinessId,
    actor: UserId,
) -> Result<Business, StoreError> {
    let sql = format!(
        "SELECT {BUSINESS_COLUMNS} FROM business b
         WHERE b.id = $1
           AND b.deleted = false
           AND EXISTS (
               SELECT 1 FROM business_members m
               WHERE m.business_id = b.id AND m.user_id = $2
           )"
    );
    bounded(
        "business.get_for_member",
        opts.statement_timeout,
        sqlx::query_as::<_, BusinessRow>(&sql)
            .bind(id.get())
            .bind(actor.get())
            .fetch_optional(&mut *conn),
    )
    .await?
    .map(BusinessRow::into_business)
    .ok_or_else(|| DomainError::RecordNotFound.into())
}

/// One page of live businesses visible to `actor`, and the total count of
/// matching rows. The count comes from the same query unless the page lies
/// past the last row.
pub async fn list_for_member(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    filter: &BusinessFilter,
    page: &Page,
    actor: UserId,
) -> Result<(Vec<Business>, Metadata), StoreError> {
    // The sort column comes from a 'static safelist; never from raw input.
    let sql = format!(
        "SELECT count(*) OVER() AS total_records, {BUSINESS_COLUMNS}
         {LISTING_SCOPE}
         ORDER BY b.{column} {direction}, b.id ASC
         LIMIT $5 OFFSET $6",
        column = page.sort.column,
        direction = page.sort.direction.as_sql(),
    );
    let rows = bounded(
        "business.list_for_member",
        opts.statement_timeout,
        sqlx::query_as::<_, BusinessPageRow>(&sql)
            .bind(actor.get())
            .bind(&filter.name)
            .bind(&filter.email)
            .bind(&filter.cnpj)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *conn),
    )
    .await?;

    // The window count rides on the rows; a page past the end has none.
    let total = match rows.first() {
        Some(row) => row.total_records,
        None if page.offset() > 0 => count_for_member(conn, opts, filter, actor).await?,
        None => 0,
    };
    let businesses = rows
        .into_iter()
        .map(|row| row.business.into_business())
        .collect();
    Ok((businesses, Metadata::calculate(total, page.page, page.page_size)))
}

/// Number of live businesses visible to `actor` that match `filter`.
pub async fn count_for_member(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    filter: &BusinessFilter,
    actor: UserId,
) -> Result<i64, StoreError> {
    let sql = format!("SELECT count(*) {LISTING_SCOPE}");
    bounded(
        "business.count_for_member",
        opts.statement_timeout,
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(actor.get())
            .bind(&filter.name)
            .bind(&filter.email)
            .bind(&filter.cnpj)
            .fetch_one(&mut *conn),
    )
    .await
}

/// FROM/WHERE shared by the listing and its count. Binds `$1` actor and
/// `$2`..`$4` the name, email, and cnpj filters.
const LISTING_SCOPE: &str = "FROM business b
         WHERE b.deleted = false
           AND EXISTS (
               SELECT 1 FROM business_members m
               WHERE m.business_id = b.id AND m.user_id = $1
           )
           AND (to_tsvector('simple', b.name) @@ plainto_tsquery('simple', $2) OR $2 = '')
           AND (to_tsvector('simple', b.email) @@ plainto_tsquery('simple', $3) OR $3 = '')
           AND (to_tsvector('simple', b.cnpj) @@ plainto_tsquery('simple', $4) OR $4 = '')";

/// Versioned replacement of a Business's fields by a member.
pub async fn update_as_member(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    id: BusinessId,
    version: i32,
    draft: &BusinessDraft,
    actor: UserId,
) -> Result<Business, StoreError> {
    let sql = format!(
        "UPDATE business b SET
            name = $1,
            cnpj = $2,
            email = $3,
            phone = $4,
            updated_by = $5,
            updated_at = now(),
            version = b.version + 1
         WHERE b.id = $6
           AND b.version = $7
           AND b.deleted = false
           AND EXISTS (
               SELECT 1 FROM business_members m
               WHERE m.business_id = b.id AND m.user_id = $5
           )
         RETURNING {BUSINESS_COLUMNS}"
    );
    let row = bounded(
        "business.update_as_member",
        opts.statement_timeout,
        sqlx::query_as::<_, BusinessRow>(&sql)
            .bind(&draft.name)
            .bind(&draft.cnpj)
            .bind(&draft.email)
            .bind(&draft.phone)
            .bind(actor.get())
            .bind(id.get())
            .bind(version)
            .fetch_optional(&mut *conn),
    )
    .await
    .map_err(|e| opts.translate(e))?;

    match row {
        Some(row) => Ok(row.into_business()),
        None => Err(miss(visible_to_member(conn, opts, id, actor).await?)),
    }
}

/// Versioned soft delete by a member.
pub async fn soft_delete_as_member(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    id: BusinessId,
    version: i32,
    actor: UserId,
) -> Result<(), StoreError> {
    let result = bounded(
        "business.soft_delete_as_member",
        opts.statement_timeout,
        sqlx::query(
            "UPDATE business b SET
                deleted = true,
                updated_by = $1,
                updated_at = now(),
                version = b.version + 1
             WHERE b.id = $2
               AND b.version = $3
               AND b.deleted = false
               AND EXISTS (
                   SELECT 1 FROM business_members m
                   WHERE m.business_id = b.id AND m.user_id = $1
               )",
        )
        .bind(actor.get())
        .bind(id.get())
        .bind(version)
        .execute(&mut *conn),
    )
    .await?;

    if result.rows_affected() == 0 {
        return Err(miss(visible_to_member(conn, opts, id, actor).await?));
    }
    Ok(())
}

/// Versioned touch by a member without changing fields. Membership changes
/// go through this so they conflict with concurrent edits.
pub async fn bump_version_as_member(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    id: BusinessId,
    version: i32,
    actor: UserId,
) -> Result<Business, StoreError> {
    let sql = format!(
        "UPDATE business b SET
            updated_by = $1,
            updated_at = now(),
            version = b.version + 1
         WHERE b.id = $2
           AND b.version = $3
           AND b.deleted = false
           AND EXISTS (
               SELECT 1 FROM business_members m
               WHERE m.business_id = b.id AND m.user_id = $1
           )
         RETURNING {BUSINESS_COLUMNS}"
    );
    let row = bounded(
        "business.bump_version_as_member",
        opts.statement_timeout,
        sqlx::query_as::<_, BusinessRow>(&sql)
            .bind(actor.get())
            .bind(id.get())
            .bind(version)
            .fetch_optional(&mut *conn),
    )
    .await?;

    match row {
        Some(row) => Ok(row.into_business()),
        None => Err(miss(visible_to_member(conn, opts, id, actor).await?)),
    }
}

/// Whether `actor` can see a live Business with `id`, at any version.
pub async fn visible_to_member(
    conn: &mut PgConnection,
    opts: &StoreOptions,
    id: BusinessId,
    actor: UserId,
) -> Result<bool, StoreError> {
    bounded(
        "business.visible_to_member",
        opts.statement_timeout,
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM business b
                 JOIN business_members m ON m.business_id = b.id
                 WHERE b.id = $1 AND b.deleted = false AND m.user_id = $2
             )",
        )
        .bind(id.get())
        .bind(actor.get())
        .fetch_one(&mut *conn),
    )
    .await
}
