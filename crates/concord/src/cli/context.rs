//! Global flags and the per-invocation engine handle.

use anyhow::{Context, Result};
use concord_db::{ConcordDb, User};
use concord_engine::{ContractEngine, EngineConfig, EngineError, LocalFileStore};
use concord_lifecycle::LifecyclePolicy;
use concord_protocol::paths;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use super::error::HelpfulError;

/// Flags accepted by every subcommand.
#[derive(Debug, Clone, clap::Args)]
pub struct GlobalArgs {
    /// Act as this user (username)
    #[arg(long = "as", global = true, env = "CONCORD_USER", value_name = "USERNAME")]
    pub actor: Option<String>,

    /// Store path [default: ~/.concord/concord.sqlite3]
    #[arg(long, global = true, env = "CONCORD_DATABASE", value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Directory holding uploaded documents [default: ~/.concord/uploads]
    #[arg(long, global = true, value_name = "DIR")]
    pub uploads: Option<PathBuf>,

    /// Config file [default: ~/.concord/config.toml]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Lifecycle policy, overriding the config file (strict | legacy)
    #[arg(long, global = true)]
    pub policy: Option<LifecyclePolicy>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Machine-readable output
    #[arg(long, global = true)]
    pub json: bool,
}

/// Where this invocation reads and writes.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub home: PathBuf,
    pub database: PathBuf,
    pub uploads: PathBuf,
    pub config_file: PathBuf,
    pub logs: PathBuf,
}

impl GlobalArgs {
    pub fn paths(&self) -> ResolvedPaths {
        ResolvedPaths {
            home: paths::concord_home(),
            database: self
                .database
                .clone()
                .unwrap_or_else(paths::default_database_path),
            uploads: self
                .uploads
                .clone()
                .unwrap_or_else(paths::default_uploads_dir),
            config_file: self
                .config
                .clone()
                .unwrap_or_else(paths::default_config_path),
            logs: paths::default_logs_dir(),
        }
    }

    /// Config file settings with `--policy` applied on top.
    pub fn engine_config(&self, paths: &ResolvedPaths) -> Result<EngineConfig> {
        let mut config = EngineConfig::load(&paths.config_file).map_err(|err| {
            HelpfulError::new(err.to_string())
                .with_code("INVALID_CONFIG")
                .with_context(format!("While loading {}", paths.config_file.display()))
                .with_suggestions([
                    "TRY: Keep engine settings under an [engine] table",
                    "TRY: Known keys: policy, lock_ttl_secs, notification_limit",
                ])
        })?;
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        Ok(config)
    }
}

/// Engine opened on the resolved store, plus who is acting.
pub struct AppContext {
    pub engine: ContractEngine,
    pub paths: ResolvedPaths,
    pub json: bool,
    actor: Option<String>,
}

impl AppContext {
    pub async fn open(global: &GlobalArgs) -> Result<Self> {
        let paths = global.paths();
        let config = global.engine_config(&paths)?;

        let db = ConcordDb::open(&paths.database)
            .await
            .with_context(|| format!("Failed to open store at {}", paths.database.display()))?;
        let files = Arc::new(LocalFileStore::new(paths.uploads.clone()));

        Ok(Self {
            engine: ContractEngine::new(db, files, config),
            paths,
            json: global.json,
            actor: global.actor.clone(),
        })
    }

    /// The user named by `--as`.
    pub async fn actor(&self) -> Result<User> {
        let username = self
            .actor
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(HelpfulError::missing_actor)?;
        self.user_named(username).await
    }

    pub async fn user_named(&self, username: &str) -> Result<User> {
        match self.engine.user_by_username(username).await {
            Ok(user) => Ok(user),
            Err(EngineError::NotFound(_)) => Err(HelpfulError::unknown_user(username).into()),
            Err(err) => Err(engine_error(err)),
        }
    }
}

/// Wrap an engine failure with its CLI suggestions.
pub fn engine_error(err: EngineError) -> anyhow::Error {
    HelpfulError::from(err).into()
}

/// Run one command on a single-threaded runtime.
pub fn block_on<T>(future: impl Future<Output = Result<T>>) -> Result<T> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    rt.block_on(future)
}

/// Open the store and run `f` with it.
pub fn with_context<T, F, Fut>(global: &GlobalArgs, f: F) -> Result<T>
where
    F: FnOnce(AppContext) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    block_on(async {
        let ctx = AppContext::open(global).await?;
        let engine = ctx.engine.clone();
        let result = f(ctx).await;
        engine.db().clone().close().await;
        result
    })
}
