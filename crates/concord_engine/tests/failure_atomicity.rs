//! A failed operation leaves rows, notifications and blobs as they were.

mod common;

use common::{harness, nda_from_alice, on_disk_harness, submit_nda};
use concord_db::ConcordDb;
use concord_engine::{EngineError, Revision};
use concord_lifecycle::{ContractStatus, LockAction};

fn revision() -> Revision {
    Revision {
        file_name: "nda-v2.pdf".to_string(),
        bytes: b"v2 bytes".to_vec(),
        change_notes: Some("Tightened clause 4".to_string()),
    }
}

#[tokio::test]
async fn test_edit_with_failing_storage_changes_nothing() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;
    h.engine.approve(h.bob.id, id).await.unwrap();
    h.engine
        .set_lock(h.alice.id, id, LockAction::Lock)
        .await
        .unwrap();

    let before = h.engine.get(h.alice.id, id).await.unwrap();
    let alice_unread = h.engine.unread_count(h.alice.id).await.unwrap();
    let bob_unread = h.engine.unread_count(h.bob.id).await.unwrap();
    let blobs = h.files.len().await;

    h.faults.fail_saves(true);
    let err = h.engine.edit(h.alice.id, id, revision()).await.unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));
    assert_eq!(err.status_code(), 500);
    h.faults.fail_saves(false);

    let after = h.engine.get(h.alice.id, id).await.unwrap();
    assert_eq!(after.versions.len(), 1);
    assert_eq!(after.contract.file_name, "nda.pdf");
    assert_eq!(after.contract.file_ref, before.contract.file_ref);
    assert_eq!(after.contract.state, before.contract.state);

    let state = &after.contract.state;
    assert_eq!(state.status, ContractStatus::Pending);
    assert!(!state.sender_approved);
    assert!(state.recipient_approved);
    assert_eq!(state.locked_by(), Some(h.alice.id));

    assert_eq!(h.engine.unread_count(h.alice.id).await.unwrap(), alice_unread);
    assert_eq!(h.engine.unread_count(h.bob.id).await.unwrap(), bob_unread);
    assert_eq!(h.files.len().await, blobs);

    // Retrying once storage is back picks up the next version number.
    let details = h.engine.edit(h.alice.id, id, revision()).await.unwrap();
    assert_eq!(details.versions.len(), 2);
    assert_eq!(details.versions[0].version.version_number, 2);
}

#[tokio::test]
async fn test_submit_with_failing_storage_creates_nothing() {
    let h = harness().await;

    h.faults.fail_saves(true);
    let err = h
        .engine
        .submit(h.alice.id, nda_from_alice())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));

    assert!(h.engine.list_mine(h.alice.id).await.unwrap().is_empty());
    assert!(h.engine.list_mine(h.bob.id).await.unwrap().is_empty());
    assert_eq!(h.engine.unread_count(h.bob.id).await.unwrap(), 0);
    assert!(h.files.is_empty().await);
}

#[tokio::test]
async fn test_submit_discards_blob_when_store_write_fails() {
    let h = on_disk_harness().await;
    let path = h.db_path().unwrap();

    h.faults.close_db_on_next_save(h.engine.db().clone());
    let err = h
        .engine
        .submit(h.alice.id, nda_from_alice())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Db(_)));
    assert!(h.files.is_empty().await);

    let db = ConcordDb::open_existing(&path).await.unwrap();
    assert!(db
        .list_contracts_for_user(h.alice.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(db.count_unread_notifications(h.bob.id).await.unwrap(), 0);
    db.close().await;
}
