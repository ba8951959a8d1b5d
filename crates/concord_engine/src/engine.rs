//! The contract lifecycle engine.
//!
//! Every mutating operation follows the same shape: open a store
//! transaction, claim the contract row, let [`LifecycleRules`] validate and
//! mutate a copy of its state, then write the state, any new version and
//! the resulting notification before committing. A rejected operation
//! leaves nothing behind.

use chrono::{DateTime, Utc};
use concord_db::{
    ConcordDb, Contract, ContractTx, ContractVersion, NewContract, NewNotification, NewUser,
    NewVersion, Notification, User, UserUpdate,
};
use concord_ids::{ContractId, FileRef, NotificationId, UserId, VersionId};
use concord_lifecycle::{
    Action, ContractState, LifecycleRules, LockAction, Notice, NotificationKind, Transition,
};
use concord_protocol::defaults::USER_SEARCH_LIMIT;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::storage::{FileStore, StorageError};
use crate::views::{ContractDetails, Download, VersionDetails};

/// A new contract upload.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub title: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub recipient_username: Option<String>,
    pub recipient_email: Option<String>,
    pub notes: Option<String>,
}

/// A replacement document for an existing contract.
#[derive(Debug, Clone, Default)]
pub struct Revision {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Blank notes fall back to `Version {n} edited`.
    pub change_notes: Option<String>,
}

#[derive(Clone)]
pub struct ContractEngine {
    db: ConcordDb,
    files: Arc<dyn FileStore>,
    config: EngineConfig,
    rules: LifecycleRules,
}

fn contract_not_found() -> EngineError {
    EngineError::not_found("Contract not found")
}

/// Blank strings from form fields count as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Current time at the store's millisecond precision.
fn now() -> DateTime<Utc> {
    ConcordDb::millis_to_datetime(ConcordDb::now_millis())
}

impl ContractEngine {
    pub fn new(db: ConcordDb, files: Arc<dyn FileStore>, config: EngineConfig) -> Self {
        let rules = config.rules();
        Self {
            db,
            files,
            config,
            rules,
        }
    }

    pub fn db(&self) -> &ConcordDb {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rules(&self) -> LifecycleRules {
        self.rules
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn register_user(&self, new: NewUser) -> Result<User> {
        let username = new.username.trim();
        let email = new.email.trim();
        if username.is_empty() {
            return Err(EngineError::invalid_input("Username is required"));
        }
        if !email.contains('@') {
            return Err(EngineError::invalid_input(format!(
                "Invalid email address: '{}'",
                email
            )));
        }
        if self.db.find_user_by_username(username).await?.is_some() {
            return Err(EngineError::UsernameTaken);
        }
        if self.db.find_user_by_email(email).await?.is_some() {
            return Err(EngineError::EmailTaken);
        }

        let user = self
            .db
            .create_user(&NewUser {
                username: username.to_string(),
                email: email.to_string(),
                full_name: non_blank(new.full_name),
                credential: new.credential,
            })
            .await?;
        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    pub async fn user(&self, id: UserId) -> Result<User> {
        self.db
            .get_user(id)
            .await?
            .ok_or_else(|| EngineError::not_found("User not found"))
    }

    pub async fn user_by_username(&self, username: &str) -> Result<User> {
        self.db
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("User '{}' not found", username)))
    }

    pub async fn list_users(&self, skip: i64, limit: i64) -> Result<Vec<User>> {
        if skip < 0 || limit < 0 {
            return Err(EngineError::invalid_input(
                "skip and limit must not be negative",
            ));
        }
        Ok(self.db.list_users(skip, limit).await?)
    }

    /// Case-insensitive substring search over username and email.
    pub async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        Ok(self.db.search_users(query, USER_SEARCH_LIMIT).await?)
    }

    /// Update the acting user's own profile.
    pub async fn update_profile(&self, actor: UserId, update: UserUpdate) -> Result<User> {
        let current = self.user(actor).await?;

        let email = non_blank(update.email).map(|e| e.trim().to_string());
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(EngineError::invalid_input(format!(
                    "Invalid email address: '{}'",
                    email
                )));
            }
            if *email != current.email && self.db.find_user_by_email(email).await?.is_some() {
                return Err(EngineError::EmailTaken);
            }
        }

        let user = self
            .db
            .update_user(
                actor,
                &UserUpdate {
                    full_name: update.full_name,
                    email,
                    credential: non_blank(update.credential),
                },
            )
            .await?;
        info!(user_id = %actor, "Profile updated");
        Ok(user)
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Create a contract from `actor` to the named recipient, with version 1
    /// and a `new_contract` notification for the recipient.
    pub async fn submit(&self, actor: UserId, submission: Submission) -> Result<ContractDetails> {
        let title = submission.title.trim().to_string();
        if title.is_empty() {
            return Err(EngineError::invalid_input("Title is required"));
        }
        if submission.file_name.trim().is_empty() {
            return Err(EngineError::invalid_input("A file is required"));
        }

        let sender = self.user(actor).await?;
        let recipient = self
            .resolve_recipient(
                non_blank(submission.recipient_username).as_deref(),
                non_blank(submission.recipient_email).as_deref(),
            )
            .await?;
        let state = ContractState::submitted(sender.id, recipient.id)?;

        let file_ref = self
            .files
            .save(&submission.file_name, &submission.bytes)
            .await?;

        let new = NewContract {
            title,
            file_name: submission.file_name,
            file_ref: file_ref.clone(),
            notes: non_blank(submission.notes),
            state,
        };
        let contract = match self.write_submission(&new, &sender).await {
            Ok(contract) => contract,
            Err(err) => {
                self.discard_blob(&file_ref).await;
                return Err(err);
            }
        };

        info!(
            contract_id = %contract.id,
            actor = %actor,
            recipient = %recipient.id,
            "Contract submitted"
        );
        self.details(contract).await
    }

    async fn resolve_recipient(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<User> {
        if username.is_none() && email.is_none() {
            return Err(EngineError::MissingRecipient);
        }

        let mut recipient = None;
        if let Some(username) = username {
            recipient = self.db.find_user_by_username(username).await?;
        }
        if recipient.is_none() {
            if let Some(email) = email {
                recipient = self.db.find_user_by_email(email).await?;
            }
        }
        recipient.ok_or(EngineError::RecipientNotFound)
    }

    async fn write_submission(&self, new: &NewContract, sender: &User) -> Result<Contract> {
        let now = now();
        let mut tx = self.db.begin().await?;

        let contract = tx.insert_contract(new, now).await?;
        tx.append_version(
            &NewVersion {
                contract_id: contract.id,
                file_name: new.file_name.clone(),
                file_ref: new.file_ref.clone(),
                created_by: sender.id,
                change_notes: None,
            },
            now,
        )
        .await?;

        let notice = Notice::new(contract.state.recipient_id, NotificationKind::NewContract);
        Self::notify(&mut tx, &contract, &notice, &sender.username, now).await?;

        tx.commit().await?;
        Ok(contract)
    }

    // ========================================================================
    // Lifecycle operations
    // ========================================================================

    /// Acquire or release the advisory edit lock.
    pub async fn set_lock(
        &self,
        actor: UserId,
        id: ContractId,
        action: LockAction,
    ) -> Result<Contract> {
        let now = now();
        let mut tx = self.db.begin().await?;
        let contract = tx.claim_contract(id).await?.ok_or_else(contract_not_found)?;

        let mut state = contract.state.clone();
        self.rules.set_lock(&mut state, actor, action, now)?;
        tx.save_state(id, &state, now).await?;
        tx.commit().await?;

        info!(contract_id = %id, actor = %actor, action = %action, "Lock updated");
        Ok(Contract {
            state,
            updated_at: Some(now),
            ..contract
        })
    }

    /// Upload a new version. Releases the editor's lock and recomputes
    /// approvals according to the active policy.
    pub async fn edit(
        &self,
        actor: UserId,
        id: ContractId,
        revision: Revision,
    ) -> Result<ContractDetails> {
        if revision.file_name.trim().is_empty() {
            return Err(EngineError::invalid_input("A file is required"));
        }

        let now = now();
        let mut tx = self.db.begin().await?;
        let contract = tx.claim_contract(id).await?.ok_or_else(contract_not_found)?;

        let mut state = contract.state.clone();
        let transition = self.rules.edit(&mut state, actor, now)?;

        let file_ref = self
            .files
            .save(&revision.file_name, &revision.bytes)
            .await?;
        let version = NewVersion {
            contract_id: id,
            file_name: revision.file_name,
            file_ref: file_ref.clone(),
            created_by: actor,
            change_notes: non_blank(revision.change_notes),
        };

        let written = Self::write_edit(tx, &contract, &state, &transition, &version, now).await;
        let number = match written {
            Ok(version) => version.version_number,
            Err(err) => {
                self.discard_blob(&file_ref).await;
                return Err(err);
            }
        };

        info!(
            contract_id = %id,
            actor = %actor,
            version = number,
            from = %transition.from,
            to = %transition.to,
            "Contract edited"
        );

        let contract = Contract {
            file_name: version.file_name,
            file_ref,
            updated_at: Some(now),
            state,
            ..contract
        };
        self.details(contract).await
    }

    async fn write_edit(
        mut tx: ContractTx,
        contract: &Contract,
        state: &ContractState,
        transition: &Transition,
        version: &NewVersion,
        now: DateTime<Utc>,
    ) -> Result<ContractVersion> {
        let appended = tx.append_version(version, now).await?;
        tx.set_head_file(contract.id, &version.file_ref, &version.file_name)
            .await?;
        tx.save_state(contract.id, state, now).await?;
        if let Some(notice) = &transition.notice {
            Self::notify(&mut tx, contract, notice, "", now).await?;
        }
        tx.commit().await?;
        Ok(appended)
    }

    /// Record the actor's approval of the current version.
    pub async fn approve(&self, actor: UserId, id: ContractId) -> Result<Contract> {
        self.apply(actor, id, "Contract approved", |rules, state, _| {
            rules.approve(state, actor)
        })
        .await
    }

    /// Sign the contract.
    pub async fn sign(&self, actor: UserId, id: ContractId) -> Result<Contract> {
        self.apply(actor, id, "Contract signed", |rules, state, now| {
            rules.sign(state, actor, now)
        })
        .await
    }

    /// Deny (cancel) the contract.
    pub async fn deny(&self, actor: UserId, id: ContractId) -> Result<Contract> {
        self.apply(actor, id, "Contract denied", |rules, state, _| {
            rules.deny(state, actor)
        })
        .await
    }

    /// Shared claim, apply, persist, notify, commit cycle.
    async fn apply<F>(
        &self,
        actor: UserId,
        id: ContractId,
        event: &'static str,
        op: F,
    ) -> Result<Contract>
    where
        F: FnOnce(
            &LifecycleRules,
            &mut ContractState,
            DateTime<Utc>,
        ) -> concord_lifecycle::Result<Transition>,
    {
        let now = now();
        let mut tx = self.db.begin().await?;
        let contract = tx.claim_contract(id).await?.ok_or_else(contract_not_found)?;

        let mut state = contract.state.clone();
        let transition = op(&self.rules, &mut state, now)?;

        tx.save_state(id, &state, now).await?;
        if let Some(notice) = &transition.notice {
            Self::notify(&mut tx, &contract, notice, "", now).await?;
        }
        tx.commit().await?;

        info!(
            contract_id = %id,
            actor = %actor,
            role = %transition.actor_role,
            from = %transition.from,
            to = %transition.to,
            "{}",
            event
        );
        Ok(Contract {
            state,
            updated_at: Some(now),
            ..contract
        })
    }

    async fn notify(
        tx: &mut ContractTx,
        contract: &Contract,
        notice: &Notice,
        actor_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Notification> {
        let notification = tx
            .insert_notification(
                &NewNotification {
                    user_id: notice.recipient,
                    contract_id: contract.id,
                    kind: notice.kind,
                    message: notice.render(&contract.title, actor_name),
                },
                now,
            )
            .await?;
        debug!(
            contract_id = %contract.id,
            user_id = %notice.recipient,
            kind = notice.kind.as_str(),
            "Notification queued"
        );
        Ok(notification)
    }

    /// Remove a contract and its version history. Notifications that
    /// reference it are kept.
    pub async fn delete_contract(&self, actor: UserId, id: ContractId) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let contract = tx.claim_contract(id).await?.ok_or_else(contract_not_found)?;
        contract.state.authorize(actor, Action::Delete)?;

        let refs = tx.delete_contract(id).await?;
        tx.commit().await?;
        info!(contract_id = %id, actor = %actor, blobs = refs.len(), "Contract deleted");

        for file_ref in &refs {
            self.discard_blob(file_ref).await;
        }
        Ok(())
    }

    async fn discard_blob(&self, file_ref: &FileRef) {
        if let Err(err) = self.files.delete(file_ref).await {
            warn!(file_ref = %file_ref, error = %err, "Failed to remove blob");
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Contracts where `actor` is sender or recipient, newest first.
    pub async fn list_mine(&self, actor: UserId) -> Result<Vec<ContractDetails>> {
        let contracts = self.db.list_contracts_for_user(actor).await?;
        debug!(actor = %actor, count = contracts.len(), "Listed contracts");

        let mut out = Vec::with_capacity(contracts.len());
        for contract in contracts {
            out.push(self.details(contract).await?);
        }
        Ok(out)
    }

    pub async fn get(&self, actor: UserId, id: ContractId) -> Result<ContractDetails> {
        let contract = self.authorized(actor, id, Action::View).await?;
        self.details(contract).await
    }

    /// Versions of a contract, highest number first.
    pub async fn list_versions(&self, actor: UserId, id: ContractId) -> Result<Vec<VersionDetails>> {
        let contract = self.authorized(actor, id, Action::View).await?;
        let sender = self.user(contract.state.sender_id).await?;
        let recipient = self.user(contract.state.recipient_id).await?;
        self.versions_of(&contract, &sender, &recipient).await
    }

    pub async fn get_version(
        &self,
        actor: UserId,
        id: ContractId,
        version_id: VersionId,
    ) -> Result<ContractVersion> {
        self.authorized(actor, id, Action::View).await?;
        self.db
            .get_version(id, version_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Version not found"))
    }

    /// The current head document.
    pub async fn download(&self, actor: UserId, id: ContractId) -> Result<Download> {
        let contract = self.authorized(actor, id, Action::Download).await?;
        let bytes = self.fetch_blob(&contract.file_ref).await?;
        Ok(Download {
            file_name: contract.file_name,
            bytes,
        })
    }

    /// A specific historical version.
    pub async fn download_version(
        &self,
        actor: UserId,
        id: ContractId,
        version_id: VersionId,
    ) -> Result<Download> {
        self.authorized(actor, id, Action::Download).await?;
        let version = self
            .db
            .get_version(id, version_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Version not found"))?;
        let bytes = self.fetch_blob(&version.file_ref).await?;
        Ok(Download {
            file_name: version.file_name,
            bytes,
        })
    }

    async fn fetch_blob(&self, file_ref: &FileRef) -> Result<Vec<u8>> {
        match self.files.retrieve(file_ref).await {
            Ok(bytes) => Ok(bytes),
            Err(StorageError::NotFound(_)) => {
                warn!(file_ref = %file_ref, "Blob missing from file store");
                Err(EngineError::FileMissing)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn authorized(&self, actor: UserId, id: ContractId, action: Action) -> Result<Contract> {
        let contract = self
            .db
            .get_contract(id)
            .await?
            .ok_or_else(contract_not_found)?;
        contract.state.authorize(actor, action)?;
        Ok(contract)
    }

    async fn details(&self, contract: Contract) -> Result<ContractDetails> {
        let sender = self.user(contract.state.sender_id).await?;
        let recipient = self.user(contract.state.recipient_id).await?;
        let versions = self.versions_of(&contract, &sender, &recipient).await?;
        Ok(ContractDetails {
            contract,
            sender,
            recipient,
            versions,
        })
    }

    async fn versions_of(
        &self,
        contract: &Contract,
        sender: &User,
        recipient: &User,
    ) -> Result<Vec<VersionDetails>> {
        let versions = self.db.list_versions(contract.id).await?;
        let mut out = Vec::with_capacity(versions.len());
        for version in versions {
            let created_by = if version.created_by == sender.id {
                sender.clone()
            } else if version.created_by == recipient.id {
                recipient.clone()
            } else {
                self.user(version.created_by).await?
            };
            out.push(VersionDetails {
                version,
                created_by,
            });
        }
        Ok(out)
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Newest first; `None` uses the configured default limit.
    pub async fn notifications(&self, actor: UserId, limit: Option<i64>) -> Result<Vec<Notification>> {
        let limit = limit.unwrap_or(self.config.notification_limit);
        if limit < 0 {
            return Err(EngineError::invalid_input("limit must not be negative"));
        }
        Ok(self.db.list_notifications(actor, limit).await?)
    }

    pub async fn unread_count(&self, actor: UserId) -> Result<i64> {
        Ok(self.db.count_unread_notifications(actor).await?)
    }

    /// Mark one of the actor's notifications read. Another user's
    /// notification is reported as not found.
    pub async fn mark_read(&self, actor: UserId, id: NotificationId) -> Result<()> {
        if !self.db.mark_notification_read(actor, id).await? {
            return Err(EngineError::not_found("Notification not found"));
        }
        Ok(())
    }

    /// Returns how many notifications changed.
    pub async fn mark_all_read(&self, actor: UserId) -> Result<u64> {
        let changed = self.db.mark_all_notifications_read(actor).await?;
        debug!(actor = %actor, changed, "Notifications marked read");
        Ok(changed)
    }
}
