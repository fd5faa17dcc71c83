//! Version-checked lock record storage on SQLite.
//!
//! ```ignore
//! use sqlite_lock_storage::{
//!     Context, FixedConnectionManager, LockInformation, SqliteStorage, SqliteStorageOptions,
//!     Storage,
//! };
//!
//! let ctx = Context::background();
//! let options = SqliteStorageOptions::new()
//!     .with_connection_manager(FixedConnectionManager::open("locks.db3")?);
//! let storage = SqliteStorage::new(&ctx, options)?;
//!
//! let info = LockInformation::new("worker-1", 1);
//! storage.create_with_version(&ctx, "nightly-report", 1, &info)?;
//! storage.update_with_version(&ctx, "nightly-report", 1, 2, &info.with_version(2))?;
//! ```

mod busy;
mod options;
mod records;
mod schema;
mod sqlite;
mod store;

#[cfg(feature = "pool")]
pub(crate) use options::check_busy_timeout;
pub use options::{
    SqliteStorageOptions, DEFAULT_BUSY_TIMEOUT, DEFAULT_STORAGE_TABLE_NAME, MAX_BUSY_TIMEOUT,
};
pub use records::{LockRecords, LIST_BUFFER_SIZE};
pub use sqlite::{SqliteStorage, SQLITE_STORAGE_NAME};
pub use store::Storage;
