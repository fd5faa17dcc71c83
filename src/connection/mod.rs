mod fixed;
mod manager;
#[cfg(feature = "pool")]
mod pooled;
mod scoped;

pub use fixed::{FixedConnection, FixedConnectionManager, FIXED_CONNECTION_MANAGER_NAME};
pub use manager::ConnectionManager;
#[cfg(feature = "pool")]
pub use pooled::{
    PooledConnectionManager, DEFAULT_CHECKOUT_TIMEOUT, DEFAULT_POOL_SIZE,
    POOLED_CONNECTION_MANAGER_NAME,
};
pub use scoped::{run_with_connection, with_connection};

/// Environment variable naming the SQLite database file.
pub const DB_PATH_ENV: &str = "STORAGE_LOCK_SQLITE3_DB_PATH";
pub const DEFAULT_DB_PATH: &str = "storage_lock.db3";

pub(crate) fn database_path_from_env() -> String {
    std::env::var(DB_PATH_ENV)
        .ok()
        .filter(|path| !path.is_empty())
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
}
