//! # In-Memory Backend
//!
//! [`MemoryStore`] keeps users, businesses, and memberships in one table
//! set behind a `parking_lot::Mutex` and applies the same version,
//! tombstone, membership, and uniqueness rules as the Postgres backend.
//!
//! A transaction locks the tables, works on a staged copy, and swaps the
//! copy in only when the work returns `Ok`. An `Err` anywhere discards
//! every write made by that transaction.
//!
//! Partial unique indexes are emulated by name: a clash on a live row is
//! reported through the store's [`DuplicateConstraints`] table, so an
//! unmapped name surfaces as [`StoreError::UnmappedConstraint`] just as an
//! unmapped Postgres constraint stays an opaque server error.
//!
//! [`DuplicateConstraints`]: bizreg_core::DuplicateConstraints

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use bizreg_core::constraints::{
    BUSINESS_CNPJ_KEY, BUSINESS_EMAIL_KEY, BUSINESS_NAME_KEY, BUSINESS_PHONE_KEY, USERS_EMAIL_KEY,
    USERS_PHONE_KEY,
};
use bizreg_core::{
    ActivationCode, AuditFields, Business, BusinessDraft, BusinessFilter, BusinessId, DomainError,
    Metadata, NewUser, Page, SortDirection, User, UserId,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::activation::generate_code;
use crate::error::StoreError;
use crate::store::Store;
use crate::StoreOptions;

/// Foreign keys of `business_members`, named as Postgres names them.
pub const MEMBERS_BUSINESS_FKEY: &str = "business_members_business_id_fkey";
/// See [`MEMBERS_BUSINESS_FKEY`].
pub const MEMBERS_USER_FKEY: &str = "business_members_user_id_fkey";

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    businesses: BTreeMap<BusinessId, Business>,
    /// `(business, user)` pairs.
    members: BTreeSet<(BusinessId, UserId)>,
    last_user_id: i64,
    last_business_id: i64,
}

/// Unit of work over the staged tables of one [`MemoryStore`] transaction.
///
/// Methods mirror the Postgres statement helpers one-to-one.
#[derive(Debug)]
pub struct MemoryTx<'a> {
    tables: &'a mut Tables,
    opts: &'a StoreOptions,
    now: DateTime<Utc>,
}

impl MemoryTx<'_> {
    fn violation(&self, constraint: &str) -> StoreError {
        match self.opts.constraints.lookup(constraint) {
            Some(domain) => domain.into(),
            None => StoreError::UnmappedConstraint(constraint.to_string()),
        }
    }

    fn check_user_unique(&self, email: &str, phone: &str, except: Option<UserId>) -> Result<(), StoreError> {
        let live = self
            .tables
            .users
            .values()
            .filter(|u| !u.audit.deleted && Some(u.id) != except);
        for other in live {
            if other.email == email {
                return Err(self.violation(USERS_EMAIL_KEY));
            }
            if other.phone == phone {
                return Err(self.violation(USERS_PHONE_KEY));
            }
        }
        Ok(())
    }

    fn check_business_unique(&self, draft: &BusinessDraft, except: Option<BusinessId>) -> Result<(), StoreError> {
        let live = self
            .tables
            .businesses
            .values()
            .filter(|b| !b.audit.deleted && Some(b.id) != except);
        for other in live {
            if other.fields.name == draft.name {
                return Err(self.violation(BUSINESS_NAME_KEY));
            }
            if other.fields.cnpj == draft.cnpj {
                return Err(self.violation(BUSINESS_CNPJ_KEY));
            }
            if other.fields.email == draft.email {
                return Err(self.violation(BUSINESS_EMAIL_KEY));
            }
            if other.fields.phone == draft.phone {
                return Err(self.violation(BUSINESS_PHONE_KEY));
            }
        }
        Ok(())
    }

    fn live_user(&self, id: UserId) -> Option<&User> {
        self.tables.users.get(&id).filter(|u| !u.audit.deleted)
    }

    /// Fail with `InvalidData` on `actor` unless `id` is a live, activated
    /// user.
    pub fn require_activated(&self, id: UserId) -> Result<(), StoreError> {
        match self.live_user(id) {
            Some(user) if user.activated => Ok(()),
            _ => Err(StoreError::inactive_actor()),
        }
    }

    /// Insert an inactive user holding `code`.
    pub fn insert_user(&mut self, user: &NewUser, code: ActivationCode) -> Result<User, StoreError> {
        self.check_user_unique(&user.email, &user.phone, None)?;
        self.tables.last_user_id += 1;
        let created = User {
            id: UserId::new(self.tables.last_user_id),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            password_hash: user.password_hash.clone(),
            activated: false,
            activation_code: Some(code),
            audit: AuditFields::created(self.now, None),
        };
        self.tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    /// Live user by id.
    pub fn user(&self, id: UserId) -> Result<User, StoreError> {
        self.live_user(id)
            .cloned()
            .ok_or_else(|| DomainError::RecordNotFound.into())
    }

    /// Live user by email.
    pub fn user_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.tables
            .users
            .values()
            .find(|u| !u.audit.deleted && u.email == email)
            .cloned()
            .ok_or_else(|| DomainError::RecordNotFound.into())
    }

    /// Live user holding `code` under `email`.
    pub fn user_by_email_and_code(&self, email: &str, code: ActivationCode) -> Result<User, StoreError> {
        self.tables
            .users
            .values()
            .find(|u| !u.audit.deleted && u.email == email && u.activation_code == Some(code))
            .cloned()
            .ok_or_else(|| DomainError::RecordNotFound.into())
    }

    /// Versioned update of every mutable user field.
    pub fn update_user(&mut self, user: &User, actor: UserId) -> Result<User, StoreError> {
        let current = self.live_user(user.id).ok_or(DomainError::RecordNotFound)?;
        if current.audit.version != user.audit.version {
            return Err(DomainError::EditConflict.into());
        }
        self.check_user_unique(&user.email, &user.phone, Some(user.id))?;

        let mut updated = current.clone();
        updated.name = user.name.clone();
        updated.email = user.email.clone();
        updated.phone = user.phone.clone();
        updated.password_hash = user.password_hash.clone();
        updated.activated = user.activated;
        updated.activation_code = user.activation_code;
        updated.audit.touch(self.now, Some(actor));
        self.tables.users.insert(updated.id, updated.clone());
        Ok(updated)
    }

    /// Versioned soft delete of a user.
    pub fn delete_user(&mut self, id: UserId, version: i32, actor: UserId) -> Result<(), StoreError> {
        let now = self.now;
        let user = self
            .tables
            .users
            .get_mut(&id)
            .filter(|u| !u.audit.deleted)
            .ok_or(DomainError::RecordNotFound)?;
        if user.audit.version != version {
            return Err(DomainError::EditConflict.into());
        }
        user.audit.deleted = true;
        user.audit.touch(now, Some(actor));
        Ok(())
    }

    /// Insert a Business. The caller inserts the creator's membership.
    pub fn insert_business(&mut self, draft: &BusinessDraft, actor: UserId) -> Result<Business, StoreError> {
        self.check_business_unique(draft, None)?;
        self.tables.last_business_id += 1;
        let created = Business {
            id: BusinessId::new(self.tables.last_business_id),
            fields: draft.clone(),
            audit: AuditFields::created(self.now, Some(actor)),
        };
        self.tables.businesses.insert(created.id, created.clone());
        Ok(created)
    }

    /// Insert a membership. Returns `false` if it already existed.
    ///
    /// Both ends must reference existing rows, tombstoned or not, as the
    /// foreign keys require.
    pub fn insert_member(&mut self, business: BusinessId, user: UserId) -> Result<bool, StoreError> {
        if !self.tables.businesses.contains_key(&business) {
            return Err(self.violation(MEMBERS_BUSINESS_FKEY));
        }
        if !self.tables.users.contains_key(&user) {
            return Err(self.violation(MEMBERS_USER_FKEY));
        }
        Ok(self.tables.members.insert((business, user)))
    }

    /// Delete a membership. Returns `false` if there was none.
    pub fn delete_member(&mut self, business: BusinessId, user: UserId) -> bool {
        self.tables.members.remove(&(business, user))
    }

    /// Member ids of a Business, ascending.
    pub fn members(&self, business: BusinessId) -> Vec<UserId> {
        self.tables
            .members
            .range((business, UserId::new(i64::MIN))..=(business, UserId::new(i64::MAX)))
            .map(|(_, user)| *user)
            .collect()
    }

    /// Whether `actor` can see a live Business with `id`, at any version.
    pub fn visible_to_member(&self, id: BusinessId, actor: UserId) -> bool {
        self.tables
            .businesses
            .get(&id)
            .is_some_and(|b| !b.audit.deleted)
            && self.tables.members.contains(&(id, actor))
    }

    /// Live Business `actor` is a member of.
    pub fn business_for_member(&self, id: BusinessId, actor: UserId) -> Result<Business, StoreError> {
        if !self.visible_to_member(id, actor) {
            return Err(DomainError::RecordNotFound.into());
        }
        self.tables
            .businesses
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::RecordNotFound.into())
    }

    /// One page of live businesses visible to `actor`, with the total count.
    pub fn list_businesses(&self, filter: &BusinessFilter, page: &Page, actor: UserId) -> (Vec<Business>, Metadata) {
        let mut matching: Vec<&Business> = self
            .tables
            .businesses
            .values()
            .filter(|b| !b.audit.deleted && self.tables.members.contains(&(b.id, actor)))
            .filter(|b| {
                matches_words(&b.fields.name, &filter.name)
                    && matches_words(&b.fields.email, &filter.email)
                    && matches_words(&b.fields.cnpj, &filter.cnpj)
            })
            .collect();

        matching.sort_by(|a, b| {
            let primary = compare_column(page.sort.column, a, b);
            let primary = match page.sort.direction {
                SortDirection::Asc => primary,
                SortDirection::Desc => primary.reverse(),
            };
            primary.then(a.id.cmp(&b.id))
        });

        let total = matching.len() as i64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit()).unwrap_or(0);
        let rows = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        (rows, Metadata::calculate(total, page.page, page.page_size))
    }

    fn versioned_business_mut(&mut self, id: BusinessId, version: i32, actor: UserId) -> Result<&mut Business, StoreError> {
        if !self.visible_to_member(id, actor) {
            return Err(DomainError::RecordNotFound.into());
        }
        let business = self
            .tables
            .businesses
            .get_mut(&id)
            .ok_or(DomainError::RecordNotFound)?;
        if business.audit.version != version {
            return Err(DomainError::EditConflict.into());
        }
        Ok(business)
    }

    /// Versioned replacement of a Business's fields by a member.
    pub fn update_business(
        &mut self,
        id: BusinessId,
        version: i32,
        draft: &BusinessDraft,
        actor: UserId,
    ) -> Result<Business, StoreError> {
        self.versioned_business_mut(id, version, actor)?;
        self.check_business_unique(draft, Some(id))?;
        let now = self.now;
        let business = self.versioned_business_mut(id, version, actor)?;
        business.fields = draft.clone();
        business.audit.touch(now, Some(actor));
        Ok(business.clone())
    }

    /// Versioned soft delete by a member.
    pub fn delete_business(&mut self, id: BusinessId, version: i32, actor: UserId) -> Result<(), StoreError> {
        let now = self.now;
        let business = self.versioned_business_mut(id, version, actor)?;
        business.audit.deleted = true;
        business.audit.touch(now, Some(actor));
        Ok(())
    }

    /// Versioned touch by a member without changing fields.
    pub fn bump_business(&mut self, id: BusinessId, version: i32, actor: UserId) -> Result<Business, StoreError> {
        let now = self.now;
        let business = self.versioned_business_mut(id, version, actor)?;
        business.audit.touch(now, Some(actor));
        Ok(business.clone())
    }

    /// Grant `member` access on behalf of `actor`.
    pub fn add_member(
        &mut self,
        id: BusinessId,
        version: i32,
        member: UserId,
        actor: UserId,
    ) -> Result<Business, StoreError> {
        let business = self.bump_business(id, version, actor)?;
        if self.live_user(member).is_none() {
            return Err(DomainError::invalid("member", "user does not exist").into());
        }
        if !self.insert_member(id, member)? {
            return Err(DomainError::invalid("member", "is already a member").into());
        }
        Ok(business)
    }

    /// Revoke `member`'s access on behalf of `actor`. The last member
    /// cannot be removed.
    pub fn remove_member(
        &mut self,
        id: BusinessId,
        version: i32,
        member: UserId,
        actor: UserId,
    ) -> Result<Business, StoreError> {
        let business = self.bump_business(id, version, actor)?;
        if !self.delete_member(id, member) {
            return Err(DomainError::RecordNotFound.into());
        }
        if self.members(id).is_empty() {
            return Err(DomainError::invalid("member", "cannot remove the last member").into());
        }
        Ok(business)
    }
}

/// Every whitespace-separated word of `query` occurs in `field`,
/// ignoring case. An empty query matches everything.
fn matches_words(field: &str, query: &str) -> bool {
    let field = field.to_lowercase();
    query
        .split_whitespace()
        .all(|word| field.contains(&word.to_lowercase()))
}

fn compare_column(column: &str, a: &Business, b: &Business) -> Ordering {
    match column {
        "name" => a.fields.name.cmp(&b.fields.name),
        "cnpj" => a.fields.cnpj.cmp(&b.fields.cnpj),
        "email" => a.fields.email.cmp(&b.fields.email),
        "created_at" => a.audit.created_at.cmp(&b.audit.created_at),
        _ => a.id.cmp(&b.id),
    }
}

/// [`Store`] over process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    opts: StoreOptions,
}

impl MemoryStore {
    /// An empty store using `opts`.
    pub fn new(opts: StoreOptions) -> Self {
        Self {
            tables: Arc::default(),
            opts,
        }
    }

    /// Run `work` as one transaction.
    ///
    /// Writes become visible only if `work` returns `Ok`. The table lock
    /// is held throughout, so transactions are serializable.
    pub fn transaction<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut MemoryTx<'_>) -> Result<T, StoreError>,
    {
        let mut tables = self.tables.lock();
        let mut staged = tables.clone();
        let value = {
            let mut tx = MemoryTx {
                tables: &mut staged,
                opts: &self.opts,
                now: Utc::now(),
            };
            work(&mut tx)?
        };
        *tables = staged;
        Ok(value)
    }

    fn read<T>(&self, work: impl FnOnce(&MemoryTx<'_>) -> T) -> T {
        let mut tables = self.tables.lock();
        let tx = MemoryTx {
            tables: &mut *tables,
            opts: &self.opts,
            now: Utc::now(),
        };
        work(&tx)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn register_user(&self, user: NewUser) -> Result<User, StoreError> {
        user.validate().into_result()?;
        let code = generate_code();
        let created = self.transaction(|tx| tx.insert_user(&user, code))?;
        tracing::info!(user_id = %created.id, "user registered");
        Ok(created)
    }

    async fn user_by_id(&self, id: UserId) -> Result<User, StoreError> {
        self.read(|tx| tx.user(id))
    }

    async fn user_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.read(|tx| tx.user_by_email(email))
    }

    async fn activate_user(&self, code: ActivationCode, email: &str) -> Result<User, StoreError> {
        let activated = self.transaction(|tx| {
            let mut user = match tx.user_by_email_and_code(email, code) {
                Err(StoreError::Domain(DomainError::RecordNotFound)) => {
                    return Err(DomainError::invalid("code", "invalid or expired activation code").into());
                }
                other => other?,
            };
            user.activated = true;
            user.activation_code = None;
            let actor = user.id;
            tx.update_user(&user, actor)
        })?;
        tracing::info!(user_id = %activated.id, "user activated");
        Ok(activated)
    }

    async fn update_user(&self, user: User, actor: UserId) -> Result<User, StoreError> {
        self.transaction(|tx| tx.update_user(&user, actor))
    }

    async fn delete_user(&self, id: UserId, version: i32, actor: UserId) -> Result<(), StoreError> {
        self.transaction(|tx| tx.delete_user(id, version, actor))
    }

    async fn create_business(&self, draft: BusinessDraft, actor: UserId) -> Result<Business, StoreError> {
        draft.validate().into_result()?;
        let business = self.transaction(|tx| {
            tx.require_activated(actor)?;
            let business = tx.insert_business(&draft, actor)?;
            tx.insert_member(business.id, actor)?;
            Ok(business)
        })?;
        tracing::info!(business_id = %business.id, created_by = %actor, "business created");
        Ok(business)
    }

    async fn business_for_member(&self, id: BusinessId, actor: UserId) -> Result<Business, StoreError> {
        self.read(|tx| tx.business_for_member(id, actor))
    }

    async fn list_businesses(
        &self,
        filter: BusinessFilter,
        page: Page,
        actor: UserId,
    ) -> Result<(Vec<Business>, Metadata), StoreError> {
        Ok(self.read(|tx| tx.list_businesses(&filter, &page, actor)))
    }

    async fn update_business(
        &self,
        id: BusinessId,
        version: i32,
        draft: BusinessDraft,
        actor: UserId,
    ) -> Result<Business, StoreError> {
        draft.validate().into_result()?;
        self.transaction(|tx| tx.update_business(id, version, &draft, actor))
    }

    async fn delete_business(&self, id: BusinessId, version: i32, actor: UserId) -> Result<(), StoreError> {
        self.transaction(|tx| tx.delete_business(id, version, actor))?;
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
        self.transaction(|tx| tx.add_member(id, version, member, actor))
    }

    async fn remove_member(
        &self,
        id: BusinessId,
        version: i32,
        member: UserId,
        actor: UserId,
    ) -> Result<Business, StoreError> {
        self.transaction(|tx| tx.remove_member(id, version, member, actor))
    }

    async fn members_of(&self, id: BusinessId, actor: UserId) -> Result<Vec<UserId>, StoreError> {
        self.read(|tx| {
            if !tx.visible_to_member(id, actor) {
                return Err(DomainError::RecordNotFound.into());
            }
            Ok(tx.members(id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_words_is_case_insensitive_and_conjunctive() {
        assert!(matches_words("Padaria Central", ""));
        assert!(matches_words("Padaria Central", "central"));
        assert!(matches_words("Padaria Central", "PADARIA central"));
        assert!(!matches_words("Padaria Central", "padaria norte"));
    }

    fn new_user() -> NewUser {
        NewUser {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            phone: "+55 11 1111-1111".into(),
            password_hash: bizreg_core::PasswordHash::new(b"hash".to_vec()),
        }
    }

    fn draft() -> BusinessDraft {
        BusinessDraft {
            name: "Padaria".into(),
            cnpj: "1".into(),
            email: "a@example.com".into(),
            phone: "1".into(),
        }
    }

    #[test]
    fn failed_transaction_leaves_tables_untouched() {
        let store = MemoryStore::default();
        let result: Result<(), StoreError> = store.transaction(|tx| {
            let user = tx.insert_user(&new_user(), ActivationCode::from_offset(0))?;
            let business = tx.insert_business(&draft(), user.id)?;
            assert!(tx.insert_member(business.id, user.id)?);
            Err(DomainError::EditConflict.into())
        });
        assert!(result.is_err());
        assert!(store.read(|tx| tx.members(BusinessId::new(1))).is_empty());
        assert!(store.read(|tx| tx.user(UserId::new(1))).is_err());
    }

    #[test]
    fn membership_rows_need_existing_ends() {
        let store = MemoryStore::default();
        let err = store
            .transaction(|tx| tx.insert_member(BusinessId::new(1), UserId::new(1)))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnmappedConstraint(ref name) if name == MEMBERS_BUSINESS_FKEY));

        let err = store
            .transaction(|tx| {
                let business = tx.insert_business(&draft(), UserId::new(1))?;
                tx.insert_member(business.id, UserId::new(42))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::UnmappedConstraint(ref name) if name == MEMBERS_USER_FKEY));
    }

    #[test]
    fn only_activated_users_may_act() {
        let store = MemoryStore::default();
        let id = store
            .transaction(|tx| tx.insert_user(&new_user(), ActivationCode::from_offset(0)))
            .unwrap()
            .id;

        let inactive = store.read(|tx| tx.require_activated(id)).unwrap_err();
        assert!(matches!(
            inactive.domain(),
            Some(DomainError::InvalidData(v)) if v.get("actor").is_some()
        ));
        assert!(store.read(|tx| tx.require_activated(UserId::new(99))).is_err());

        store
            .transaction(|tx| {
                let mut user = tx.user(id)?;
                user.activated = true;
                tx.update_user(&user, id)
            })
            .unwrap();
        store.read(|tx| tx.require_activated(id)).unwrap();
    }

    #[test]
    fn unmapped_constraint_is_opaque() {
        let store = MemoryStore::new(StoreOptions::new(
            std::time::Duration::from_secs(1),
            bizreg_core::DuplicateConstraints::empty(),
        ));
        let draft = draft();
        store
            .transaction(|tx| tx.insert_business(&draft, UserId::new(1)))
            .unwrap();
        let err = store
            .transaction(|tx| tx.insert_business(&draft, UserId::new(1)))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnmappedConstraint(ref name) if name == BUSINESS_NAME_KEY));
    }
}
