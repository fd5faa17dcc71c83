mod connection;
mod context;
mod error;
mod lock_information;
mod storage;

pub use connection::{
    run_with_connection, with_connection, ConnectionManager, FixedConnection,
    FixedConnectionManager, DB_PATH_ENV, DEFAULT_DB_PATH, FIXED_CONNECTION_MANAGER_NAME,
};
#[cfg(feature = "pool")]
pub use connection::{
    PooledConnectionManager, DEFAULT_CHECKOUT_TIMEOUT, DEFAULT_POOL_SIZE,
    POOLED_CONNECTION_MANAGER_NAME,
};
pub use context::Context;
pub use error::StorageError;
pub use lock_information::{LockInformation, LockRecord, Version};
pub use storage::{
    LockRecords, SqliteStorage, SqliteStorageOptions, Storage, DEFAULT_BUSY_TIMEOUT,
    DEFAULT_STORAGE_TABLE_NAME, LIST_BUFFER_SIZE, MAX_BUSY_TIMEOUT, SQLITE_STORAGE_NAME,
};

// Re-export the driver so callers can build connections and pools themselves
pub use rusqlite;
#[cfg(feature = "pool")]
pub use r2d2;
#[cfg(feature = "pool")]
pub use r2d2_sqlite;
