//! Contract Lifecycle Engine.
//!
//! Owns the rules for moving a contract from submission through edits,
//! approvals and a final signature or denial. Persistence goes through
//! [`concord_db`], document bytes through a [`FileStore`], and every
//! operation is available both as a typed method on [`ContractEngine`] and
//! as a routed request via [`ContractEngine::handle`].

pub mod api;
pub mod config;
pub mod credentials;
mod engine;
mod error;
pub mod storage;
mod views;

pub use api::{ApiBody, ApiRequest, ApiResponse, UploadedFile};
pub use config::{ConfigError, EngineConfig};
pub use engine::{ContractEngine, Revision, Submission};
pub use error::{EngineError, Result};
pub use storage::{FileStore, LocalFileStore, MemoryFileStore, StorageError};
pub use views::{
    notification_response, user_response, ContractDetails, Download, VersionDetails,
};
