use std::sync::Arc;
use std::time::Duration;

use crate::error::StorageError;

pub const DEFAULT_STORAGE_TABLE_NAME: &str = "storage_lock";
/// How long a statement waits on a locked database when the context has no
/// tighter deadline.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
/// SQLite takes the busy timeout as a signed 32-bit millisecond count.
pub const MAX_BUSY_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

/// Options for [`SqliteStorage`](super::SqliteStorage).
///
/// ```ignore
/// let options = SqliteStorageOptions::new()
///     .with_connection_manager(FixedConnectionManager::open("locks.db3")?)
///     .with_table_name("service_locks");
/// let storage = SqliteStorage::new(&Context::background(), options)?;
/// ```
pub struct SqliteStorageOptions<M> {
    connection_manager: Option<Arc<M>>,
    table_name: String,
    busy_timeout: Duration,
}

impl<M> Default for SqliteStorageOptions<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> SqliteStorageOptions<M> {
    pub fn new() -> Self {
        SqliteStorageOptions {
            connection_manager: None,
            table_name: DEFAULT_STORAGE_TABLE_NAME.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_connection_manager(self, connection_manager: M) -> Self {
        self.with_shared_connection_manager(Arc::new(connection_manager))
    }

    /// Use a manager that other components also hold.
    pub fn with_shared_connection_manager(mut self, connection_manager: Arc<M>) -> Self {
        self.connection_manager = Some(connection_manager);
        self
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    /// Check the options and split them into their parts.
    pub(crate) fn resolve(self) -> Result<(Arc<M>, String), StorageError> {
        let manager = self
            .connection_manager
            .ok_or_else(|| StorageError::InvalidConfig("connection manager not set".into()))?;
        let table_name = if self.table_name.is_empty() {
            DEFAULT_STORAGE_TABLE_NAME.to_string()
        } else {
            validate_table_name(&self.table_name)?;
            self.table_name
        };
        check_busy_timeout(self.busy_timeout)?;
        Ok((manager, table_name))
    }
}

pub(crate) fn check_busy_timeout(busy_timeout: Duration) -> Result<(), StorageError> {
    if busy_timeout > MAX_BUSY_TIMEOUT {
        return Err(StorageError::InvalidConfig(format!(
            "busy timeout {:?} exceeds the SQLite limit of {:?}",
            busy_timeout, MAX_BUSY_TIMEOUT
        )));
    }
    Ok(())
}

/// Table names are spliced into SQL text, so only plain identifiers are accepted.
fn validate_table_name(name: &str) -> Result<(), StorageError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StorageError::InvalidConfig(format!(
            "table name {:?} is not a plain SQL identifier",
            name
        )))
    }
}
