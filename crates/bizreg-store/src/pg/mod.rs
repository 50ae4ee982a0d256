//! # Postgres Backend
//!
//! [`PgStore`] implements [`Store`] over an SQLx pool. Reads acquire one
//! pooled connection; writes run through [`run_in_transaction`].
//!
//! Statement helpers live in per-table modules and take `&mut PgConnection`
//! so one transaction can span several of them.

pub mod businesses;
pub mod memberships;
mod rows;
pub mod users;

use async_trait::async_trait;
use bizreg_core::{
    ActivationCode, Business, BusinessDraft, BusinessFilter, BusinessId, DbConfig, DomainError,
    Metadata, NewUser, Page, User, UserId,
};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};

use crate::activation::generate_code;
use crate::error::StoreError;
use crate::store::Store;
use crate::tx::{bounded, run_in_transaction};
use crate::{pool, StoreOptions};

/// Classify a zero-row versioned write: the row is still visible to the
/// caller, so the version was stale; otherwise it is not found.
pub(crate) fn miss(visible: bool) -> StoreError {
    if visible {
        DomainError::EditConflict.into()
    } else {
        DomainError::RecordNotFound.into()
    }
}

/// Postgres-backed [`Store`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    opts: StoreOptions,
}

impl PgStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool, opts: StoreOptions) -> Self {
        Self { pool, opts }
    }

    /// Connect and migrate using `cfg`, with the default constraint table.
    pub async fn connect(cfg: &DbConfig) -> Result<Self, StoreError> {
        let pool = pool::connect(cfg).await?;
        let opts = StoreOptions {
            statement_timeout: cfg.statement_timeout,
            ..StoreOptions::default()
        };
        Ok(Self::new(pool, opts))
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Store options in effect.
    pub fn options(&self) -> &StoreOptions {
        &self.opts
    }

    async fn acquire(&self) -> Result<PoolConnection<Postgres>, StoreError> {
        bounded("acquire", self.opts.statement_timeout, self.pool.acquire()).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn register_user(&self, user: NewUser) -> Result<User, StoreError> {
        user.validate().into_result()?;
        let opts = self.opts.clone();
        let code = generate_code();
        let created = run_in_transaction(&self.pool, self.opts.statement_timeout, move |conn| {
            Box::pin(async move { users::insert(conn, &opts, &user, code).await })
        })
        .await?;

        tracing::info!(user_id = %created.id, "user registered");
        Ok(created)
    }

    async fn user_by_id(&self, id: UserId) -> Result<User, StoreError> {
        let mut conn = self.acquire().await?;
        users::get_by_id(&mut conn, &self.opts, id).await
    }

    async fn user_by_email(&self, email: &str) -> Result<User, StoreError> {
        let mut conn = self.acquire().await?;
        users::get_by_email(&mut conn, &self.opts, email).await
    }

    async fn activate_user(&self, code: ActivationCode, email: &str) -> Result<User, StoreError> {
        let opts = self.opts.clone();
        let email = email.to_string();
        let activated = run_in_transaction(&self.pool, self.opts.statement_timeout, move |conn| {
            Box::pin(async move {
                let mut user = match users::get_by_email_and_code(conn, &opts, &email, code).await {
                    Err(StoreError::Domain(DomainError::RecordNotFound)) => {
                        return Err(StoreError::from(DomainError::invalid(
                            "code",
                            "invalid or expired activation code",
                        )));
                    }
                    other => other?,
                };
                user.activated = true;
                user.activation_code = None;
                let actor = user.id;
                users::update(conn, &opts, &user, actor).await
            })
        })
        .await?;

        tracing::info!(user_id = %activated.id, "user activated");
        Ok(activated)
    }

    async fn update_user(&self, user: User, actor: UserId) -> Result<User, StoreError> {
        let opts = self.opts.clone();
        run_in_transaction(&self.pool, self.opts.statement_timeout, move |conn| {
            Box::pin(async move { users::update(conn, &opts, &user, actor).await })
        })
        .await
    }

    async fn delete_user(&self, id: UserId, version: i32, actor: UserId) -> Result<(), StoreError> {
        let opts = self.opts.clone();
        run_in_transaction(&self.pool, self.opts.statement_timeout, move |conn| {
            Box::pin(async move { users::soft_delete(conn, &opts, id, version, actor).await })
        })
        .await
    }

    async fn create_business(&self, draft: BusinessDraft, actor: UserId) -> Result<Business, StoreError> {
        draft.validate().into_result()?;
        let opts = self.opts.clone();
        let business = run_in_transaction(&self.pool, self.opts.statement_timeout, move |conn| {
            Box::pin(async move {
                users::require_activated(conn, &opts, actor).await?;
                let business = businesses::insert(conn, &opts, &draft, actor).await?;
                memberships::insert(conn, &opts, business.id, actor, actor).await?;
                Ok::<_, StoreError>(business)
            })
        })
        .await?;

        tracing::info!(business_id = %business.id, created_by = %actor, "business created");
        Ok(business)
    }

    async fn business_for_member(&self, id: BusinessId, actor: UserId) -> Result<Business, StoreError> {
        let mut conn = self.acquire().await?;
        businesses::get_for_member(&mut conn, &self.opts, id, actor).await
    }

    async fn list_businesses(
        &self,
        filter: BusinessFilter,
        page: Page,
        actor: UserId,
    ) -> Result<(Vec<Business>, Metadata), StoreError> {
        let mut conn = self.acquire().await?;
        businesses::list_for_member(&mut conn, &self.opts, &filter, &page, actor).await
    }

    async fn update_business(
        &self,
        id: BusinessId,
        version: i32,
        draft: BusinessDraft,
        actor: UserId,
    ) -> Result<Business, StoreError> {
        draft.validate().into_result()?;
        let opts = self.opts.clone();
        run_in_transaction(&self.pool, self.opts.statement_timeout, move |conn| {
            Box::pin(async move {
                businesses::update_as_member(conn, &opts, id, version, &draft, actor).await
            })
        })
        .await
    }

    async fn delete_business(&self, id: BusinessId, version: i32, actor: UserId) -> Result<(), StoreError> {
        let opts = self.opts.clone();
        run_in_transaction(&self.pool, self.opts.statement_timeout, move |conn| {
            Box::pin(async move {
                businesses::soft_delete_as_member(conn, &opts, id, version, actor).await
            })
        })
        .await?;

        tracing::info!(business_id = %id, deleted_by = %actor, "business deleted");
        Ok(())
    }

    async fn add_member(
        &self,
        id: BusinessId,
        version: i32,
        member: UserId,
        actor: UserId,
    ) -> Result<Business, StoreError> {
        let opts = self.opts.clone();
        run_in_transaction(&self.pool, self.opts.statement_timeout, move |conn| {
            Box::pin(async move {
                memberships::add_as_member(conn, &opts, id, version, member, actor).await
            })
        })
        .await
    }

    async fn remove_member(
        &self,
        id: BusinessId,
        version: i32,
        member: UserId,
        actor: UserId,
    ) -> Result<Business, StoreError> {
        let opts = self.opts.clone();
        run_in_transaction(&self.pool, self.opts.statement_timeout, move |conn| {
            Box::pin(async move {
                memberships::remove_as_member(conn, &opts, id, version, member, actor).await
            })
        })
        .await
    }

    async fn members_of(&self, id: BusinessId, actor: UserId) -> Result<Vec<UserId>, StoreError> {
        let mut conn = self.acquire().await?;
        if !businesses::visible_to_member(&mut conn, &self.opts, id, actor).await? {
            return Err(DomainError::RecordNotFound.into());
        }
        memberships::list(&mut conn, &self.opts, id).await
    }
}
