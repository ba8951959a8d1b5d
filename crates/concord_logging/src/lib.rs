//! Logging setup for the Concord binary.
//!
//! Everything goes to a size-rotated file under `~/.concord/logs`, written off
//! the calling thread. stderr only shows warnings unless `--verbose` is set,
//! so command output stays clean.

mod rolling;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use rolling::RollingFile;

pub const DEFAULT_LOG_FILTER: &str = "concord=info,concord_engine=info,concord_db=info";
const VERBOSE_LOG_FILTER: &str = "concord=debug,concord_engine=debug,concord_db=debug";

pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Defaults to `~/.concord/logs`.
    pub log_dir: Option<PathBuf>,
}

/// Keeps the background log writer alive; buffered lines are flushed on drop.
pub struct LogGuard {
    pub dir: PathBuf,
    _worker: WorkerGuard,
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the file filter when set.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let dir = config
        .log_dir
        .unwrap_or_else(concord_protocol::paths::default_logs_dir);
    ensure_logs_dir(&dir)?;

    let file = RollingFile::open(&dir, config.app_name)
        .with_context(|| format!("Failed to open log file for {}", config.app_name))?;
    let (file_writer, worker) = tracing_appender::non_blocking(file);

    let default_filter = if config.verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let console_filter = if config.verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(LogGuard {
        dir,
        _worker: worker,
    })
}

pub fn ensure_logs_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))
}
