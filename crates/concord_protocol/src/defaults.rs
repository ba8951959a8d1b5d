//! Canonical default values shared by the engine and the CLI.

/// Notifications returned by an inbox listing when no limit is given.
pub const DEFAULT_NOTIFICATION_LIMIT: i64 = 20;
/// Page size of the user directory listing.
pub const DEFAULT_USER_LIST_LIMIT: i64 = 100;
/// Maximum hits of a user search.
pub const USER_SEARCH_LIMIT: i64 = 10;

pub const DATABASE_FILE_NAME: &str = "concord.sqlite3";
pub const UPLOADS_DIR_NAME: &str = "uploads";
pub const LOGS_DIR_NAME: &str = "logs";
pub const CONFIG_FILE_NAME: &str = "config.toml";
