#![allow(dead_code)]

use async_trait::async_trait;
use concord_db::{ConcordDb, NewUser, User};
use concord_engine::storage::StorageResult;
use concord_engine::{
    ContractDetails, ContractEngine, EngineConfig, FileStore, MemoryFileStore, StorageError,
    Submission,
};
use concord_ids::FileRef;
use concord_lifecycle::LifecyclePolicy;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// In-memory blobs with switchable failures.
pub struct FaultyFileStore {
    inner: Arc<MemoryFileStore>,
    fail_saves: AtomicBool,
    close_on_save: Mutex<Option<ConcordDb>>,
}

impl FaultyFileStore {
    fn new(inner: Arc<MemoryFileStore>) -> Self {
        Self {
            inner,
            fail_saves: AtomicBool::new(false),
            close_on_save: Mutex::new(None),
        }
    }

    /// Every following save fails before storing anything.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// The next save stores its blob, then shuts the database down.
    pub fn close_db_on_next_save(&self, db: ConcordDb) {
        *self.close_on_save.lock().unwrap() = Some(db);
    }
}

#[async_trait]
impl FileStore for FaultyFileStore {
    async fn save(&self, original_name: &str, bytes: &[u8]) -> StorageResult<FileRef> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                file_ref: original_name.to_string(),
                source: io::Error::other("disk full"),
            });
        }
        let file_ref = self.inner.save(original_name, bytes).await?;
        let db = self.close_on_save.lock().unwrap().take();
        if let Some(db) = db {
            db.close().await;
        }
        Ok(file_ref)
    }

    async fn retrieve(&self, file_ref: &FileRef) -> StorageResult<Vec<u8>> {
        self.inner.retrieve(file_ref).await
    }

    async fn exists(&self, file_ref: &FileRef) -> StorageResult<bool> {
        self.inner.exists(file_ref).await
    }

    async fn delete(&self, file_ref: &FileRef) -> StorageResult<()> {
        self.inner.delete(file_ref).await
    }
}

pub struct Harness {
    pub engine: ContractEngine,
    /// Blobs the engine has stored.
    pub files: Arc<MemoryFileStore>,
    pub faults: Arc<FaultyFileStore>,
    pub alice: User,
    pub bob: User,
    pub mallory: User,
    tmp: Option<TempDir>,
}

impl Harness {
    /// Database file of an on-disk harness.
    pub fn db_path(&self) -> Option<PathBuf> {
        self.tmp
            .as_ref()
            .map(|tmp| tmp.path().join("concord.sqlite3"))
    }
}

async fn build(db: ConcordDb, config: EngineConfig, tmp: Option<TempDir>) -> Harness {
    let files = Arc::new(MemoryFileStore::new());
    let faults = Arc::new(FaultyFileStore::new(files.clone()));
    let engine = ContractEngine::new(db, faults.clone(), config);

    let mut users = Vec::new();
    for name in ["alice", "bob", "mallory"] {
        let user = engine
            .register_user(NewUser {
                username: name.to_string(),
                email: format!("{}@example.com", name),
                full_name: None,
                credential: String::new(),
            })
            .await
            .unwrap();
        users.push(user);
    }
    let mallory = users.pop().unwrap();
    let bob = users.pop().unwrap();
    let alice = users.pop().unwrap();

    Harness {
        engine,
        files,
        faults,
        alice,
        bob,
        mallory,
        tmp,
    }
}

/// Strict policy over an in-memory store.
pub async fn harness() -> Harness {
    harness_with(EngineConfig::default()).await
}

pub async fn harness_with(config: EngineConfig) -> Harness {
    let db = ConcordDb::open_memory().await.unwrap();
    build(db, config, None).await
}

pub async fn legacy_harness() -> Harness {
    harness_with(EngineConfig {
        policy: LifecyclePolicy::Legacy,
        ..EngineConfig::default()
    })
    .await
}

/// On-disk store with a connection pool, for concurrency tests.
pub async fn on_disk_harness() -> Harness {
    let tmp = TempDir::new().unwrap();
    let db = ConcordDb::open(tmp.path().join("concord.sqlite3"))
        .await
        .unwrap();
    build(db, EngineConfig::default(), Some(tmp)).await
}

pub fn nda_from_alice() -> Submission {
    Submission {
        title: "NDA".to_string(),
        file_name: "nda.pdf".to_string(),
        bytes: b"v1 bytes".to_vec(),
        recipient_username: Some("bob".to_string()),
        recipient_email: None,
        notes: Some("Please review".to_string()),
    }
}

/// Alice sends "NDA" to Bob.
pub async fn submit_nda(h: &Harness) -> ContractDetails {
    h.engine.submit(h.alice.id, nda_from_alice()).await.unwrap()
}
