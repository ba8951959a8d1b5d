//! End-to-end lifecycle behaviour under the default (strict) policy.

mod common;

use common::{harness, harness_with, nda_from_alice, submit_nda};
use concord_db::UserUpdate;
use concord_engine::{EngineConfig, EngineError, Revision, Submission};
use concord_ids::{ContractId, NotificationId};
use concord_lifecycle::{ContractStatus, LockAction, NotificationKind};
use std::time::Duration;

fn revision(name: &str, bytes: &[u8]) -> Revision {
    Revision {
        file_name: name.to_string(),
        bytes: bytes.to_vec(),
        change_notes: None,
    }
}

#[tokio::test]
async fn test_scenario_submit() {
    let h = harness().await;
    let details = submit_nda(&h).await;

    assert_eq!(details.contract.state.status, ContractStatus::Pending);
    assert_eq!(details.sender.username, "alice");
    assert_eq!(details.recipient.username, "bob");
    assert_eq!(details.versions.len(), 1);
    assert_eq!(details.versions[0].version.version_number, 1);
    assert_eq!(
        details.versions[0].version.change_notes.as_deref(),
        Some("Initial version")
    );
    assert_eq!(details.versions[0].created_by.id, h.alice.id);

    let inbox = h.engine.notifications(h.bob.id, None).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::NewContract);
    assert_eq!(inbox[0].message, "New contract 'NDA' from alice");
    assert!(h.engine.notifications(h.alice.id, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_scenario_edit_auto_approves_editor() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;

    let details = h
        .engine
        .edit(h.bob.id, id, revision("nda-v2.pdf", b"v2 bytes"))
        .await
        .unwrap();

    let state = &details.contract.state;
    assert_eq!(state.status, ContractStatus::Edited);
    assert!(state.recipient_approved);
    assert!(!state.sender_approved);
    assert!(state.lock.is_none());
    assert_eq!(details.contract.file_name, "nda-v2.pdf");
    assert!(details.contract.updated_at.is_some());

    let numbers: Vec<i64> = details
        .versions
        .iter()
        .map(|v| v.version.version_number)
        .collect();
    assert_eq!(numbers, vec![2, 1]);
    assert_eq!(
        details.versions[0].version.change_notes.as_deref(),
        Some("Version 2 edited")
    );
    assert_eq!(details.versions[0].created_by.id, h.bob.id);

    let inbox = h.engine.notifications(h.alice.id, None).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::ContractEdited);
    assert_eq!(inbox[0].message, "Contract 'NDA' has been edited");
}

#[tokio::test]
async fn test_scenario_approval_completes() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;
    h.engine
        .edit(h.bob.id, id, revision("nda-v2.pdf", b"v2"))
        .await
        .unwrap();

    let contract = h.engine.approve(h.alice.id, id).await.unwrap();
    assert_eq!(contract.state.status, ContractStatus::Complete);
    assert!(contract.state.both_approved());

    let inbox = h.engine.notifications(h.bob.id, None).await.unwrap();
    assert_eq!(inbox[0].kind, NotificationKind::ContractApproved);
    assert_eq!(
        inbox[0].message,
        "Contract 'NDA' has been approved - Contract is now complete!"
    );

    // Settled: no further approvals or edits
    let err = h.engine.approve(h.bob.id, id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    let err = h
        .engine
        .edit(h.alice.id, id, revision("late.pdf", b"late"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn test_partial_approval_has_no_suffix() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;

    let contract = h.engine.approve(h.bob.id, id).await.unwrap();
    assert_eq!(contract.state.status, ContractStatus::Pending);

    let inbox = h.engine.notifications(h.alice.id, None).await.unwrap();
    assert_eq!(inbox[0].message, "Contract 'NDA' has been approved");
}

#[tokio::test]
async fn test_scenario_lock_conflict() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;

    let contract = h
        .engine
        .set_lock(h.bob.id, id, LockAction::Lock)
        .await
        .unwrap();
    assert_eq!(contract.state.locked_by(), Some(h.bob.id));

    let err = h
        .engine
        .set_lock(h.alice.id, id, LockAction::Lock)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LockConflict(_)));
    assert_eq!(err.status_code(), 409);

    // Edit by the non-holder is blocked too, and leaves no trace
    let err = h
        .engine
        .edit(h.alice.id, id, revision("x.pdf", b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LockConflict(_)));
    assert_eq!(h.engine.list_versions(h.alice.id, id).await.unwrap().len(), 1);
    assert_eq!(h.files.len().await, 1);

    // Only the holder can unlock
    let err = h
        .engine
        .set_lock(h.alice.id, id, LockAction::Unlock)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    h.engine
        .set_lock(h.bob.id, id, LockAction::Unlock)
        .await
        .unwrap();
    h.engine
        .set_lock(h.alice.id, id, LockAction::Lock)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_relock_is_idempotent_and_edit_releases() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;

    h.engine
        .set_lock(h.bob.id, id, LockAction::Lock)
        .await
        .unwrap();
    h.engine
        .set_lock(h.bob.id, id, LockAction::Lock)
        .await
        .unwrap();

    let details = h
        .engine
        .edit(h.bob.id, id, revision("v2.pdf", b"v2"))
        .await
        .unwrap();
    assert!(details.contract.state.lock.is_none());

    let stored = h.engine.get(h.alice.id, id).await.unwrap();
    assert!(stored.contract.state.lock.is_none());
}

#[tokio::test]
async fn test_scenario_sign_after_complete() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;

    h.engine
        .set_lock(h.bob.id, id, LockAction::Lock)
        .await
        .unwrap();
    h.engine.approve(h.bob.id, id).await.unwrap();
    let contract = h.engine.approve(h.alice.id, id).await.unwrap();
    assert_eq!(contract.state.status, ContractStatus::Complete);
    assert_eq!(contract.state.locked_by(), Some(h.bob.id));

    let signed = h.engine.sign(h.alice.id, id).await.unwrap();
    assert_eq!(signed.state.status, ContractStatus::Signed);
    assert!(signed.state.signed_at.is_some());
    assert!(signed.state.lock.is_none());

    let stored = h.engine.get(h.bob.id, id).await.unwrap();
    assert_eq!(stored.contract.state, signed.state);

    let inbox = h.engine.notifications(h.bob.id, None).await.unwrap();
    assert_eq!(inbox[0].kind, NotificationKind::ContractSigned);
    assert_eq!(inbox[0].message, "Contract 'NDA' has been signed");

    for result in [
        h.engine.sign(h.bob.id, id).await.map(|_| ()),
        h.engine.deny(h.bob.id, id).await.map(|_| ()),
        h.engine.approve(h.bob.id, id).await.map(|_| ()),
    ] {
        assert!(matches!(result, Err(EngineError::InvalidState(_))));
    }
}

#[tokio::test]
async fn test_sign_requires_both_approvals() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;
    h.engine.approve(h.bob.id, id).await.unwrap();

    let err = h.engine.sign(h.bob.id, id).await.unwrap_err();
    assert!(matches!(err, EngineError::ApprovalRequired(_)));
    assert_eq!(
        err.to_string(),
        "Both parties must approve the contract before signing"
    );
    assert_eq!(err.status_code(), 400);

    let stored = h.engine.get(h.bob.id, id).await.unwrap();
    assert_eq!(stored.contract.state.status, ContractStatus::Pending);
}

#[tokio::test]
async fn test_scenario_deny() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;
    h.engine.approve(h.bob.id, id).await.unwrap();

    let contract = h.engine.deny(h.alice.id, id).await.unwrap();
    assert_eq!(contract.state.status, ContractStatus::Denied);
    assert!(!contract.state.sender_approved);
    assert!(!contract.state.recipient_approved);

    let inbox = h.engine.notifications(h.bob.id, None).await.unwrap();
    assert_eq!(inbox[0].kind, NotificationKind::ContractDenied);
    assert_eq!(inbox[0].message, "Contract 'NDA' has been denied/cancelled");

    let err = h.engine.sign(h.bob.id, id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(err.to_string(), "Cannot sign a denied contract");
}

#[tokio::test]
async fn test_submission_validation() {
    let h = harness().await;

    let err = h
        .engine
        .submit(
            h.alice.id,
            Submission {
                recipient_username: Some("alice".to_string()),
                ..nda_from_alice()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SelfTarget));
    assert_eq!(err.to_string(), "Cannot send contract to yourself");

    let err = h
        .engine
        .submit(
            h.alice.id,
            Submission {
                recipient_username: None,
                recipient_email: Some("  ".to_string()),
                ..nda_from_alice()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingRecipient));

    let err = h
        .engine
        .submit(
            h.alice.id,
            Submission {
                recipient_username: Some("nobody".to_string()),
                ..nda_from_alice()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RecipientNotFound));
    assert_eq!(err.status_code(), 404);

    // Nothing was stored for any rejected submission
    assert!(h.files.is_empty().await);
    assert!(h.engine.list_mine(h.alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recipient_by_email_fallback() {
    let h = harness().await;
    let details = h
        .engine
        .submit(
            h.alice.id,
            Submission {
                recipient_username: Some("unknown".to_string()),
                recipient_email: Some("bob@example.com".to_string()),
                ..nda_from_alice()
            },
        )
        .await
        .unwrap();
    assert_eq!(details.recipient.id, h.bob.id);
}

#[tokio::test]
async fn test_non_participants_are_forbidden() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;
    let m = h.mallory.id;

    let err = h.engine.get(m, id).await.unwrap_err();
    assert_eq!(err.to_string(), "Not authorized to view this contract");
    assert_eq!(err.status_code(), 403);

    assert!(matches!(
        h.engine.download(m, id).await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        h.engine.approve(m, id).await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        h.engine.set_lock(m, id, LockAction::Lock).await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        h.engine.delete_contract(m, id).await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(h.engine.list_mine(m).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_contract_is_not_found() {
    let h = harness().await;
    let missing = ContractId::new(404);

    for err in [
        h.engine.get(h.alice.id, missing).await.unwrap_err(),
        h.engine.approve(h.alice.id, missing).await.unwrap_err(),
        h.engine
            .set_lock(h.alice.id, missing, LockAction::Lock)
            .await
            .unwrap_err(),
        h.engine
            .edit(h.alice.id, missing, revision("a.pdf", b"a"))
            .await
            .unwrap_err(),
    ] {
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "Contract not found");
    }
    assert!(h.files.is_empty().await);
}

#[tokio::test]
async fn test_downloads() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;
    let details = h
        .engine
        .edit(h.bob.id, id, revision("nda-v2.pdf", b"v2 bytes"))
        .await
        .unwrap();

    let head = h.engine.download(h.alice.id, id).await.unwrap();
    assert_eq!(head.file_name, "nda-v2.pdf");
    assert_eq!(head.bytes, b"v2 bytes");

    let first = &details.versions[1].version;
    let old = h
        .engine
        .download_version(h.alice.id, id, first.id)
        .await
        .unwrap();
    assert_eq!(old.file_name, "nda.pdf");
    assert_eq!(old.bytes, b"v1 bytes");

    // A version id from another contract is not found here
    let other = submit_nda(&h).await;
    let foreign = other.versions[0].version.id;
    let err = h
        .engine
        .download_version(h.alice.id, id, foreign)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Version not found");
}

#[tokio::test]
async fn test_missing_blob_is_file_missing() {
    use concord_engine::FileStore;

    let h = harness().await;
    let details = submit_nda(&h).await;
    h.files.delete(&details.contract.file_ref).await.unwrap();

    let err = h
        .engine
        .download(h.bob.id, details.contract.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::FileMissing));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_delete_contract() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;
    h.engine
        .edit(h.bob.id, id, revision("v2.pdf", b"v2"))
        .await
        .unwrap();
    assert_eq!(h.files.len().await, 2);

    h.engine.delete_contract(h.bob.id, id).await.unwrap();

    assert!(matches!(
        h.engine.get(h.alice.id, id).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(h.engine.db().list_versions(id).await.unwrap().is_empty());
    assert!(h.files.is_empty().await);

    // Notifications survive as orphans
    let inbox = h.engine.notifications(h.bob.id, None).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].contract_id, id);
}

#[tokio::test]
async fn test_blank_change_notes_use_default() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;

    let details = h
        .engine
        .edit(
            h.alice.id,
            id,
            Revision {
                change_notes: Some("   ".to_string()),
                ..revision("v2.pdf", b"v2")
            },
        )
        .await
        .unwrap();
    assert_eq!(
        details.versions[0].version.change_notes.as_deref(),
        Some("Version 2 edited")
    );

    let details = h
        .engine
        .edit(
            h.bob.id,
            id,
            Revision {
                change_notes: Some("Fixed clause 4".to_string()),
                ..revision("v3.pdf", b"v3")
            },
        )
        .await
        .unwrap();
    assert_eq!(
        details.versions[0].version.change_notes.as_deref(),
        Some("Fixed clause 4")
    );
}

#[tokio::test]
async fn test_edit_flips_approvals_between_editors() {
    let h = harness().await;
    let id = submit_nda(&h).await.contract.id;

    let after_bob = h
        .engine
        .edit(h.bob.id, id, revision("v2.pdf", b"v2"))
        .await
        .unwrap();
    assert!(after_bob.contract.state.recipient_approved);

    let after_alice = h
        .engine
        .edit(h.alice.id, id, revision("v3.pdf", b"v3"))
        .await
        .unwrap();
    let state = &after_alice.contract.state;
    assert!(state.sender_approved);
    assert!(!state.recipient_approved);
    assert_eq!(state.status, ContractStatus::Edited);

    // Bob approving alice's version completes it
    let contract = h.engine.approve(h.bob.id, id).await.unwrap();
    assert_eq!(contract.state.status, ContractStatus::Complete);
}

#[tokio::test]
async fn test_lock_expires_after_ttl() {
    let h = harness_with(EngineConfig {
        lock_ttl_secs: Some(1),
        ..EngineConfig::default()
    })
    .await;
    let id = submit_nda(&h).await.contract.id;

    h.engine
        .set_lock(h.bob.id, id, LockAction::Lock)
        .await
        .unwrap();
    assert!(matches!(
        h.engine.set_lock(h.alice.id, id, LockAction::Lock).await,
        Err(EngineError::LockConflict(_))
    ));

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let contract = h
        .engine
        .set_lock(h.alice.id, id, LockAction::Lock)
        .await
        .unwrap();
    assert_eq!(contract.state.locked_by(), Some(h.alice.id));
}

#[tokio::test]
async fn test_notification_inbox() {
    let h = harness().await;
    let first = submit_nda(&h).await.contract.id;
    submit_nda(&h).await;

    assert_eq!(h.engine.unread_count(h.bob.id).await.unwrap(), 2);
    assert_eq!(
        h.engine.notifications(h.bob.id, Some(1)).await.unwrap().len(),
        1
    );

    let inbox = h.engine.notifications(h.bob.id, None).await.unwrap();
    let oldest = inbox.iter().find(|n| n.contract_id == first).unwrap();

    let err = h.engine.mark_read(h.alice.id, oldest.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Notification not found");
    assert!(h
        .engine
        .mark_read(h.bob.id, NotificationId::new(999))
        .await
        .is_err());

    h.engine.mark_read(h.bob.id, oldest.id).await.unwrap();
    assert_eq!(h.engine.unread_count(h.bob.id).await.unwrap(), 1);
    assert_eq!(h.engine.mark_all_read(h.bob.id).await.unwrap(), 1);
    assert_eq!(h.engine.unread_count(h.bob.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_user_directory() {
    let h = harness().await;

    let err = h
        .engine
        .register_user(concord_db::NewUser {
            username: "alice".to_string(),
            email: "new@example.com".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UsernameTaken));

    let hits = h.engine.search_users("BO").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, h.bob.id);
    assert_eq!(h.engine.list_users(0, 100).await.unwrap().len(), 3);
    assert_eq!(h.engine.list_users(1, 1).await.unwrap()[0].id, h.bob.id);

    let err = h
        .engine
        .update_profile(
            h.alice.id,
            UserUpdate {
                email: Some("bob@example.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EmailTaken));
    assert_eq!(err.to_string(), "Email already registered");

    // Keeping your own email is not a conflict
    let user = h
        .engine
        .update_profile(
            h.alice.id,
            UserUpdate {
                email: Some("alice@example.com".to_string()),
                full_name: Some("Alice Liddell".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(user.full_name.as_deref(), Some("Alice Liddell"));
}
