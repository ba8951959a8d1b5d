//! Store-level behaviour: transactions, version numbering, deletion.

use chrono::Utc;
use concord_db::{ConcordDb, DbError, NewContract, NewNotification, NewUser, NewVersion, User};
use concord_ids::{ContractId, FileRef, VersionId};
use concord_lifecycle::{ContractState, ContractStatus, EditLock, NotificationKind};
use std::collections::BTreeSet;
use tempfile::TempDir;

async fn user(db: &ConcordDb, name: &str) -> User {
    db.create_user(&NewUser {
        username: name.to_string(),
        email: format!("{}@example.com", name),
        full_name: None,
        credential: String::new(),
    })
    .await
    .unwrap()
}

async fn seed_contract(db: &ConcordDb, sender: &User, recipient: &User) -> ContractId {
    let now = Utc::now();
    let file_ref = FileRef::generate("deal.pdf");
    let mut tx = db.begin().await.unwrap();
    let contract = tx
        .insert_contract(
            &NewContract {
                title: "Deal".to_string(),
                file_name: "deal.pdf".to_string(),
                file_ref: file_ref.clone(),
                notes: None,
                state: ContractState::submitted(sender.id, recipient.id).unwrap(),
            },
            now,
        )
        .await
        .unwrap();
    tx.append_version(
        &NewVersion {
            contract_id: contract.id,
            file_name: "deal.pdf".to_string(),
            file_ref,
            created_by: sender.id,
            change_notes: None,
        },
        now,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    contract.id
}

#[tokio::test]
async fn test_insert_and_read_back() {
    let db = ConcordDb::open_memory().await.unwrap();
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let id = seed_contract(&db, &alice, &bob).await;

    let contract = db.get_contract(id).await.unwrap().unwrap();
    assert_eq!(contract.title, "Deal");
    assert_eq!(contract.state.status, ContractStatus::Pending);
    assert_eq!(contract.state.sender_id, alice.id);
    assert!(contract.updated_at.is_none());

    let versions = db.list_versions(id).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version_number, 1);
    assert_eq!(versions[0].change_notes.as_deref(), Some("Initial version"));

    assert_eq!(db.list_contracts_for_user(bob.id).await.unwrap().len(), 1);
    let carol = user(&db, "carol").await;
    assert!(db.list_contracts_for_user(carol.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_claim_missing_contract() {
    let db = ConcordDb::open_memory().await.unwrap();
    let mut tx = db.begin().await.unwrap();
    assert!(tx.claim_contract(ContractId::new(99)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_state_roundtrips_lock_and_flags() {
    let db = ConcordDb::open_memory().await.unwrap();
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let id = seed_contract(&db, &alice, &bob).await;

    let now = Utc::now();
    let mut tx = db.begin().await.unwrap();
    let mut state = tx.claim_contract(id).await.unwrap().unwrap().state;
    state.lock = Some(EditLock {
        holder: bob.id,
        locked_at: now,
    });
    state.recipient_approved = true;
    state.status = ContractStatus::Approved;
    tx.save_state(id, &state, now).await.unwrap();
    tx.commit().await.unwrap();

    let contract = db.get_contract(id).await.unwrap().unwrap();
    assert_eq!(contract.state.locked_by(), Some(bob.id));
    assert!(contract.state.recipient_approved);
    assert!(!contract.state.sender_approved);
    assert_eq!(contract.state.status, ContractStatus::Approved);
    assert!(contract.updated_at.is_some());
}

#[tokio::test]
async fn test_save_state_rejects_broken_invariants() {
    let db = ConcordDb::open_memory().await.unwrap();
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let id = seed_contract(&db, &alice, &bob).await;

    let mut tx = db.begin().await.unwrap();
    let mut state = tx.claim_contract(id).await.unwrap().unwrap().state;
    state.status = ContractStatus::Signed;
    let err = tx.save_state(id, &state, Utc::now()).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidState(_)));
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let db = ConcordDb::open_memory().await.unwrap();
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let id = seed_contract(&db, &alice, &bob).await;

    {
        let mut tx = db.begin().await.unwrap();
        tx.append_version(
            &NewVersion {
                contract_id: id,
                file_name: "v2.pdf".to_string(),
                file_ref: FileRef::generate("v2.pdf"),
                created_by: bob.id,
                change_notes: None,
            },
            Utc::now(),
        )
        .await
        .unwrap();
    }

    assert_eq!(db.list_versions(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_versions_are_gapless_and_descending() {
    let db = ConcordDb::open_memory().await.unwrap();
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let id = seed_contract(&db, &alice, &bob).await;

    for _ in 0..3 {
        let mut tx = db.begin().await.unwrap();
        tx.claim_contract(id).await.unwrap().unwrap();
        tx.append_version(
            &NewVersion {
                contract_id: id,
                file_name: "next.pdf".to_string(),
                file_ref: FileRef::generate("next.pdf"),
                created_by: bob.id,
                change_notes: None,
            },
            Utc::now(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    let numbers: Vec<i64> = db
        .list_versions(id)
        .await
        .unwrap()
        .iter()
        .map(|v| v.version_number)
        .collect();
    assert_eq!(numbers, vec![4, 3, 2, 1]);

    let latest = &db.list_versions(id).await.unwrap()[0];
    assert_eq!(latest.change_notes.as_deref(), Some("Version 4 edited"));
}

#[tokio::test]
async fn test_get_version_is_scoped_to_contract() {
    let db = ConcordDb::open_memory().await.unwrap();
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let first = seed_contract(&db, &alice, &bob).await;
    let second = seed_contract(&db, &alice, &bob).await;

    let version = db.list_versions(first).await.unwrap()[0].clone();
    assert!(db.get_version(first, version.id).await.unwrap().is_some());
    assert!(db.get_version(second, version.id).await.unwrap().is_none());
    assert!(db
        .get_version(first, VersionId::new(999))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_delete_removes_versions_and_orphans_notifications() {
    let db = ConcordDb::open_memory().await.unwrap();
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let id = seed_contract(&db, &alice, &bob).await;

    let mut tx = db.begin().await.unwrap();
    tx.insert_notification(
        &NewNotification {
            user_id: bob.id,
            contract_id: id,
            kind: NotificationKind::NewContract,
            message: "New contract 'Deal' from alice".to_string(),
        },
        Utc::now(),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let mut tx = db.begin().await.unwrap();
    let refs = tx.delete_contract(id).await.unwrap();
    tx.commit().await.unwrap();

    // Head and version 1 share the same blob
    assert_eq!(refs.len(), 1);
    assert!(db.get_contract(id).await.unwrap().is_none());
    assert!(db.list_versions(id).await.unwrap().is_empty());

    let inbox = db.list_notifications(bob.id, 20).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].contract_id, id);
}

#[tokio::test]
async fn test_notification_inbox() {
    let db = ConcordDb::open_memory().await.unwrap();
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let id = seed_contract(&db, &alice, &bob).await;

    let mut tx = db.begin().await.unwrap();
    let mut ids = Vec::new();
    for kind in [NotificationKind::NewContract, NotificationKind::ContractEdited] {
        let n = tx
            .insert_notification(
                &NewNotification {
                    user_id: bob.id,
                    contract_id: id,
                    kind,
                    message: kind.as_str().to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        ids.push(n.id);
    }
    tx.commit().await.unwrap();

    let inbox = db.list_notifications(bob.id, 20).await.unwrap();
    assert_eq!(inbox[0].id, ids[1], "newest first");
    assert_eq!(db.list_notifications(bob.id, 1).await.unwrap().len(), 1);
    assert_eq!(db.count_unread_notifications(bob.id).await.unwrap(), 2);

    // Someone else's notification is invisible
    assert!(!db.mark_notification_read(alice.id, ids[0]).await.unwrap());
    assert!(db.mark_notification_read(bob.id, ids[0]).await.unwrap());
    assert_eq!(db.count_unread_notifications(bob.id).await.unwrap(), 1);

    assert_eq!(db.mark_all_notifications_read(bob.id).await.unwrap(), 1);
    assert_eq!(db.mark_all_notifications_read(bob.id).await.unwrap(), 0);
    assert_eq!(db.count_unread_notifications(bob.id).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_never_collide() {
    let tmp = TempDir::new().unwrap();
    let db = ConcordDb::open(tmp.path().join("store.sqlite3")).await.unwrap();
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let id = seed_contract(&db, &alice, &bob).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let db = db.clone();
        let author = if i % 2 == 0 { alice.id } else { bob.id };
        handles.push(tokio::spawn(async move {
            let mut tx = db.begin().await?;
            tx.claim_contract(id).await?;
            tx.append_version(
                &NewVersion {
                    contract_id: id,
                    file_name: format!("rev{}.pdf", i),
                    file_ref: FileRef::generate("rev.pdf"),
                    created_by: author,
                    change_notes: None,
                },
                Utc::now(),
            )
            .await?;
            tx.commit().await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let numbers: BTreeSet<i64> = db
        .list_versions(id)
        .await
        .unwrap()
        .iter()
        .map(|v| v.version_number)
        .collect();
    assert_eq!(numbers, (1..=9).collect::<BTreeSet<_>>());
}
