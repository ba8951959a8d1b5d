use std::path::{Path, PathBuf};
use std::sync::Once;

use crate::defaults::{CONFIG_FILE_NAME, DATABASE_FILE_NAME, LOGS_DIR_NAME, UPLOADS_DIR_NAME};

static CREATE_DIR_WARNED: Once = Once::new();

/// Resolve Concord home directory.
///
/// Priority:
/// 1) CONCORD_HOME
/// 2) HOME/USERPROFILE
/// 3) ./.concord
pub fn concord_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("CONCORD_HOME") {
        return PathBuf::from(override_path);
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".concord");
    }
    PathBuf::from(".").join(".concord")
}

fn ensure_home_dir(home: &Path) {
    if let Err(err) = std::fs::create_dir_all(home) {
        CREATE_DIR_WARNED.call_once(|| {
            eprintln!(
                "Warning: failed to create Concord home directory {}: {}. Set CONCORD_HOME or pass --database.",
                home.display(),
                err
            );
        });
    }
}

/// Default store path: ~/.concord/concord.sqlite3
pub fn default_database_path() -> PathBuf {
    let home = concord_home();
    ensure_home_dir(&home);
    home.join(DATABASE_FILE_NAME)
}

/// Default blob directory: ~/.concord/uploads
pub fn default_uploads_dir() -> PathBuf {
    concord_home().join(UPLOADS_DIR_NAME)
}

/// Default logs directory: ~/.concord/logs
pub fn default_logs_dir() -> PathBuf {
    let home = concord_home();
    ensure_home_dir(&home);
    home.join(LOGS_DIR_NAME)
}

/// Optional config file: ~/.concord/config.toml
pub fn default_config_path() -> PathBuf {
    concord_home().join(CONFIG_FILE_NAME)
}
