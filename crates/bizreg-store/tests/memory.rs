//! Store behaviour exercised against the in-memory backend.

use std::sync::Arc;

use bizreg_core::{
    ActivationCode, BusinessDraft, BusinessFilter, BusinessId, DomainError, Filters, NewUser,
    PasswordHash, UserId, BUSINESS_SORT_SAFELIST,
};
use bizreg_store::{MemoryStore, Store, StoreError};

fn new_user(n: u32) -> NewUser {
    NewUser {
        name: format!("User {n}"),
        email: format!("user{n}@example.com"),
        phone: format!("+55 11 5555-{n:04}"),
        password_hash: PasswordHash::new(b"$2a$12$hash".to_vec()),
    }
}

fn draft(n: u32) -> BusinessDraft {
    BusinessDraft {
        name: format!("Padaria {n}"),
        cnpj: format!("11.222.333/{n:04}-81"),
        email: format!("contato{n}@padaria.example"),
        phone: format!("+55 21 4444-{n:04}"),
    }
}

fn page(page: i64, page_size: i64, sort: &str) -> bizreg_core::Page {
    Filters {
        page,
        page_size,
        sort: sort.to_string(),
    }
    .validate(BUSINESS_SORT_SAFELIST)
    .unwrap()
}

/// A registered and activated user.
async fn user(store: &MemoryStore, n: u32) -> UserId {
    let registered = store.register_user(new_user(n)).await.unwrap();
    let code = registered.activation_code.unwrap();
    store.activate_user(code, &registered.email).await.unwrap().id
}

fn invalid_field(err: StoreError, field: &str) -> String {
    match domain(err) {
        DomainError::InvalidData(v) => v
            .get(field)
            .unwrap_or_else(|| panic!("no error on {field}"))
            .to_string(),
        other => panic!("expected InvalidData, got {other:?}"),
    }
}

fn domain(err: StoreError) -> DomainError {
    match err {
        StoreError::Domain(d) => d,
        other => panic!("expected a domain error, got {other:?}"),
    }
}

#[tokio::test]
async fn versioned_update_then_stale_write_conflicts() {
    let store = MemoryStore::default();
    let owner = user(&store, 1).await;
    let created = store.create_business(draft(1), owner).await.unwrap();
    assert_eq!(created.audit.version, 1);

    let mut renamed = draft(1);
    renamed.name = "Padaria Nova".into();
    let updated = store
        .update_business(created.id, 1, renamed.clone(), owner)
        .await
        .unwrap();
    assert_eq!(updated.audit.version, 2);
    assert_eq!(updated.fields.name, "Padaria Nova");
    assert_eq!(updated.audit.updated_by, Some(owner));

    let err = store
        .update_business(created.id, 1, draft(1), owner)
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::EditConflict);

    let current = store.business_for_member(created.id, owner).await.unwrap();
    assert_eq!(current.audit.version, 2);
    assert_eq!(current.fields, renamed);
}

#[tokio::test]
async fn failed_transaction_commits_nothing() {
    let store = MemoryStore::default();
    let owner = user(&store, 1).await;

    let result: Result<(), StoreError> = store.transaction(|tx| {
        let business = tx.insert_business(&draft(1), owner)?;
        tx.insert_member(business.id, owner)?;
        Err(DomainError::invalid("name", "forced failure").into())
    });
    assert!(result.is_err());

    let (rows, meta) = store
        .list_businesses(BusinessFilter::default(), page(1, 20, "id"), owner)
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(meta.total_records, 0);

    // The rolled-back name is still free.
    store.create_business(draft(1), owner).await.unwrap();
}

#[tokio::test]
async fn failed_membership_insert_discards_the_business() {
    let store = MemoryStore::default();
    let owner = user(&store, 1).await;

    let result = store.transaction(|tx| {
        let business = tx.insert_business(&draft(1), owner)?;
        tx.insert_member(business.id, UserId::new(404))?;
        Ok(business)
    });
    assert!(matches!(result, Err(StoreError::UnmappedConstraint(_))));

    let (rows, meta) = store
        .list_businesses(BusinessFilter::default(), page(1, 20, "id"), owner)
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(meta.total_records, 0);
    // Neither the row nor its unique values survived.
    let again = store.create_business(draft(1), owner).await.unwrap();
    assert_eq!(store.members_of(again.id, owner).await.unwrap(), vec![owner]);
}

#[tokio::test]
async fn only_activated_users_create_businesses() {
    let store = MemoryStore::default();

    let err = store
        .create_business(draft(1), UserId::new(999))
        .await
        .unwrap_err();
    assert_eq!(invalid_field(err, "actor"), "must be an activated user");

    let inactive = store.register_user(new_user(1)).await.unwrap();
    let err = store.create_business(draft(1), inactive.id).await.unwrap_err();
    assert_eq!(invalid_field(err, "actor"), "must be an activated user");

    let deleted = user(&store, 2).await;
    store.delete_user(deleted, 2, deleted).await.unwrap();
    assert!(store.create_business(draft(1), deleted).await.is_err());

    // Nothing was written by the rejected attempts.
    let owner = user(&store, 3).await;
    let created = store.create_business(draft(1), owner).await.unwrap();
    assert_eq!(created.id, BusinessId::new(1));
}

#[tokio::test]
async fn page_past_the_end_still_reports_the_total() {
    let store = MemoryStore::default();
    let owner = user(&store, 1).await;
    for n in 1..=4 {
        store.create_business(draft(n), owner).await.unwrap();
    }

    let (rows, meta) = store
        .list_businesses(BusinessFilter::default(), page(3, 3, "id"), owner)
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(meta.total_records, 4);
    assert_eq!(meta.last_page, 2);
    assert_eq!(meta.current_page, 3);
}

#[tokio::test]
async fn duplicate_cnpj_is_freed_by_soft_delete() {
    let store = MemoryStore::default();
    let owner = user(&store, 1).await;
    let first = store.create_business(draft(1), owner).await.unwrap();

    let mut clash = draft(2);
    clash.cnpj = first.fields.cnpj.clone();
    let err = store.create_business(clash.clone(), owner).await.unwrap_err();
    assert_eq!(err, DomainError::DuplicateCnpj);

    store.delete_business(first.id, 1, owner).await.unwrap();
    let second = store.create_business(clash, owner).await.unwrap();
    assert_ne!(second.id, first.id);
}

#[tokio::test]
async fn duplicate_fields_map_to_their_own_kind() {
    let store = MemoryStore::default();
    let owner = user(&store, 1).await;
    store.create_business(draft(1), owner).await.unwrap();

    let mut same_name = draft(2);
    same_name.name = draft(1).name;
    assert_eq!(
        store.create_business(same_name, owner).await.unwrap_err(),
        DomainError::DuplicateName
    );

    let mut same_email = draft(3);
    same_email.email = draft(1).email;
    assert_eq!(
        store.create_business(same_email, owner).await.unwrap_err(),
        DomainError::DuplicateEmail
    );

    let err = store.register_user(new_user(1)).await.unwrap_err();
    assert_eq!(err, DomainError::DuplicateEmail);
}

#[tokio::test]
async fn non_member_sees_not_found_and_state_is_unchanged() {
    let store = MemoryStore::default();
    let owner = user(&store, 1).await;
    let stranger = user(&store, 2).await;

    for n in 1..=7 {
        store.create_business(draft(n), owner).await.unwrap();
    }
    let id = BusinessId::new(7);
    store.update_business(id, 1, draft(7), owner).await.unwrap();
    store.update_business(id, 2, draft(7), owner).await.unwrap();

    let err = store
        .update_business(id, 3, draft(70), stranger)
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::RecordNotFound);

    // A stale version from a non-member is still not found, never a conflict.
    let err = store.delete_business(id, 1, stranger).await.unwrap_err();
    assert_eq!(err, DomainError::RecordNotFound);

    let err = store.business_for_member(id, stranger).await.unwrap_err();
    assert_eq!(err, DomainError::RecordNotFound);

    let current = store.business_for_member(id, owner).await.unwrap();
    assert_eq!(current.audit.version, 3);
    assert_eq!(current.fields, draft(7));
}

#[tokio::test]
async fn deleted_records_are_not_found() {
    let store = MemoryStore::default();
    let owner = user(&store, 1).await;
    let business = store.create_business(draft(1), owner).await.unwrap();

    store.delete_business(business.id, 1, owner).await.unwrap();
    assert_eq!(
        store.delete_business(business.id, 2, owner).await.unwrap_err(),
        DomainError::RecordNotFound
    );
    assert_eq!(
        store.update_business(business.id, 2, draft(1), owner).await.unwrap_err(),
        DomainError::RecordNotFound
    );
    assert_eq!(
        store.business_for_member(business.id, owner).await.unwrap_err(),
        DomainError::RecordNotFound
    );
}

#[tokio::test]
async fn invalid_draft_is_rejected_before_writing() {
    let store = MemoryStore::default();
    let owner = user(&store, 1).await;
    let mut bad = draft(1);
    bad.phone.clear();

    match domain(store.create_business(bad, owner).await.unwrap_err()) {
        DomainError::InvalidData(v) => assert_eq!(v.get("phone"), Some("must be provided")),
        other => panic!("expected InvalidData, got {other:?}"),
    }
}

#[tokio::test]
async fn listing_filters_sorts_and_pages() {
    let store = MemoryStore::default();
    let owner = user(&store, 1).await;
    let other = user(&store, 2).await;

    for n in 1..=5 {
        store.create_business(draft(n), owner).await.unwrap();
    }
    store.create_business(draft(6), other).await.unwrap();
    store.delete_business(BusinessId::new(5), 1, owner).await.unwrap();

    let (rows, meta) = store
        .list_businesses(BusinessFilter::default(), page(1, 3, "-id"), owner)
        .await
        .unwrap();
    let ids: Vec<i64> = rows.iter().map(|b| b.id.get()).collect();
    assert_eq!(ids, vec![4, 3, 2]);
    assert_eq!(meta.total_records, 4);
    assert_eq!(meta.last_page, 2);
    assert_eq!(meta.current_page, 1);

    let (rows, _) = store
        .list_businesses(BusinessFilter::default(), page(2, 3, "-id"), owner)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id.get(), 1);

    let filter = BusinessFilter {
        name: "padaria 3".into(),
        ..BusinessFilter::default()
    };
    let (rows, meta) = store
        .list_businesses(filter, page(1, 20, "name"), owner)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].fields.name, "Padaria 3");
    assert_eq!(meta.total_records, 1);

    let filter = BusinessFilter {
        name: "nothing like it".into(),
        ..BusinessFilter::default()
    };
    let (rows, meta) = store
        .list_businesses(filter, page(1, 20, "id"), owner)
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(meta, bizreg_core::Metadata::default());
}

#[tokio::test]
async fn sort_ties_break_by_id() {
    let store = MemoryStore::default();
    let owner = user(&store, 1).await;
    for n in 1..=3 {
        let mut d = draft(n);
        d.email = format!("shared{n}@example.com");
        store.create_business(d, owner).await.unwrap();
    }

    // created_at may collide at clock resolution; id keeps the order total.
    let (asc, _) = store
        .list_businesses(BusinessFilter::default(), page(1, 10, "created_at"), owner)
        .await
        .unwrap();
    let ids: Vec<i64> = asc.iter().map(|b| b.id.get()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn membership_changes_bump_version_and_grant_access() {
    let store = MemoryStore::default();
    let owner = user(&store, 1).await;
    let partner = user(&store, 2).await;
    let business = store.create_business(draft(1), owner).await.unwrap();

    let after_add = store
        .add_member(business.id, 1, partner, owner)
        .await
        .unwrap();
    assert_eq!(after_add.audit.version, 2);
    assert_eq!(
        store.members_of(business.id, partner).await.unwrap(),
        vec![owner, partner]
    );

    // The new member can edit; the old version now conflicts.
    assert_eq!(
        store
            .update_business(business.id, 1, draft(1), partner)
            .await
            .unwrap_err(),
        DomainError::EditConflict
    );
    store
        .update_business(business.id, 2, draft(1), partner)
        .await
        .unwrap();

    let after_remove = store
        .remove_member(business.id, 3, owner, partner)
        .await
        .unwrap();
    assert_eq!(after_remove.audit.version, 4);
    assert_eq!(
        store.business_for_member(business.id, owner).await.unwrap_err(),
        DomainError::RecordNotFound
    );

    match domain(
        store
            .remove_member(business.id, 4, partner, partner)
            .await
            .unwrap_err(),
    ) {
        DomainError::InvalidData(v) => {
            assert_eq!(v.get("member"), Some("cannot remove the last member"))
        }
        other => panic!("expected InvalidData, got {other:?}"),
    }
    // The rejected removal rolled back its version bump.
    let current = store.business_for_member(business.id, partner).await.unwrap();
    assert_eq!(current.audit.version, 4);
}

#[tokio::test]
async fn adding_unknown_or_existing_member_is_invalid() {
    let store = MemoryStore::default();
    let owner = user(&store, 1).await;
    let business = store.create_business(draft(1), owner).await.unwrap();

    match domain(
        store
            .add_member(business.id, 1, UserId::new(999), owner)
            .await
            .unwrap_err(),
    ) {
        DomainError::InvalidData(v) => assert_eq!(v.get("member"), Some("user does not exist")),
        other => panic!("expected InvalidData, got {other:?}"),
    }
    match domain(store.add_member(business.id, 1, owner, owner).await.unwrap_err()) {
        DomainError::InvalidData(v) => assert_eq!(v.get("member"), Some("is already a member")),
        other => panic!("expected InvalidData, got {other:?}"),
    }
}

#[tokio::test]
async fn activation_redeems_code_once() {
    let store = MemoryStore::default();
    let registered = store.register_user(new_user(1)).await.unwrap();
    assert!(!registered.activated);
    let code = registered.activation_code.unwrap();

    let wrong = ActivationCode::from_offset(code.get() - ActivationCode::MIN + 1);
    match domain(store.activate_user(wrong, &registered.email).await.unwrap_err()) {
        DomainError::InvalidData(v) => assert!(v.get("code").is_some()),
        other => panic!("expected InvalidData, got {other:?}"),
    }

    let activated = store.activate_user(code, &registered.email).await.unwrap();
    assert!(activated.activated);
    assert!(activated.activation_code.is_none());
    assert_eq!(activated.audit.version, 2);
    assert_eq!(activated.audit.updated_by, Some(registered.id));

    assert!(store.activate_user(code, &registered.email).await.is_err());
}

#[tokio::test]
async fn user_updates_and_deletes_are_versioned() {
    let store = MemoryStore::default();
    let mut u = store.register_user(new_user(1)).await.unwrap();
    let other = store.register_user(new_user(2)).await.unwrap();

    u.name = "Renamed".into();
    let updated = store.update_user(u.clone(), u.id).await.unwrap();
    assert_eq!(updated.audit.version, 2);
    assert_eq!(store.update_user(u, updated.id).await.unwrap_err(), DomainError::EditConflict);

    let mut clash = updated.clone();
    clash.phone = other.phone.clone();
    assert_eq!(
        store.update_user(clash, updated.id).await.unwrap_err(),
        DomainError::DuplicatePhone
    );

    store.delete_user(updated.id, 2, updated.id).await.unwrap();
    assert_eq!(store.user_by_id(updated.id).await.unwrap_err(), DomainError::RecordNotFound);
    assert_eq!(
        store.user_by_email(&updated.email).await.unwrap_err(),
        DomainError::RecordNotFound
    );

    // The tombstoned email is reusable.
    let mut again = new_user(3);
    again.email = updated.email.clone();
    store.register_user(again).await.unwrap();
}

#[tokio::test]
async fn concurrent_writers_on_one_version_have_one_winner() {
    let store = Arc::new(MemoryStore::default());
    let owner = user(&store, 1).await;
    let business = store.create_business(draft(1), owner).await.unwrap();

    let mut handles = Vec::new();
    for n in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let mut d = draft(1);
            d.phone = format!("+55 31 3333-{n:04}");
            store.update_business(business.id, 1, d, owner).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(err) => assert_eq!(err, DomainError::EditConflict),
        }
    }
    assert_eq!(wins, 1);
    let current = store.business_for_member(business.id, owner).await.unwrap();
    assert_eq!(current.audit.version, 2);
}
