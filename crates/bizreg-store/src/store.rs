//! The persistence port consumed by the API.

use async_trait::async_trait;
use bizreg_core::{
    ActivationCode, Business, BusinessDraft, BusinessFilter, BusinessId, Metadata, NewUser, Page,
    User, UserId,
};

use crate::error::StoreError;

/// Transactional operations over users, businesses, and memberships.
///
/// Every mutating method is one transaction. Methods taking a `version`
/// fail with `EditConflict` when it is stale and `RecordNotFound` when the
/// record is absent, tombstoned, or (for businesses) not visible to
/// `actor` because they are not a member.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Insert an inactive account with a fresh activation code.
    async fn register_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Live user by id.
    async fn user_by_id(&self, id: UserId) -> Result<User, StoreError>;

    /// Live user by email.
    async fn user_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Redeem an activation code. An unknown code/email pair is
    /// `InvalidData` on the `code` field.
    async fn activate_user(&self, code: ActivationCode, email: &str) -> Result<User, StoreError>;

    /// Replace a user's mutable fields; `user.audit.version` is the
    /// expected current version.
    async fn update_user(&self, user: User, actor: UserId) -> Result<User, StoreError>;

    /// Tombstone a user.
    async fn delete_user(&self, id: UserId, version: i32, actor: UserId) -> Result<(), StoreError>;

    /// Insert a Business and the creator's membership row together. The
    /// creator must be a live, activated user; otherwise the result is
    /// `InvalidData` on the `actor` field.
    async fn create_business(&self, draft: BusinessDraft, actor: UserId) -> Result<Business, StoreError>;

    /// Live Business visible to `actor`.
    async fn business_for_member(&self, id: BusinessId, actor: UserId) -> Result<Business, StoreError>;

    /// One page of live businesses `actor` is a member of, plus paging
    /// metadata computed in the same round trip.
    async fn list_businesses(
        &self,
        filter: BusinessFilter,
        page: Page,
        actor: UserId,
    ) -> Result<(Vec<Business>, Metadata), StoreError>;

    /// Replace a Business's fields.
    async fn update_business(
        &self,
        id: BusinessId,
        version: i32,
        draft: BusinessDraft,
        actor: UserId,
    ) -> Result<Business, StoreError>;

    /// Tombstone a Business.
    async fn delete_business(&self, id: BusinessId, version: i32, actor: UserId) -> Result<(), StoreError>;

    /// Grant `member` access to a Business. Bumps the Business version.
    async fn add_member(
        &self,
        id: BusinessId,
        version: i32,
        member: UserId,
        actor: UserId,
    ) -> Result<Business, StoreError>;

    /// Revoke `member`'s access. Bumps the Business version. Removing the
    /// last member is `InvalidData`.
    async fn remove_member(
        &self,
        id: BusinessId,
        version: i32,
        member: UserId,
        actor: UserId,
    ) -> Result<Business, StoreError>;

    /// Members of a Business visible to `actor`, ordered by id.
    async fn members_of(&self, id: BusinessId, actor: UserId) -> Result<Vec<UserId>, StoreError>;
}
