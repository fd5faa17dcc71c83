use std::ops::Deref;
use std::path::Path;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use rusqlite::Connection;

use super::{database_path_from_env, ConnectionManager};
use crate::context::Context;
use crate::error::StorageError;

/// Longest single wait on the condvar; bounds how late a cancellation is noticed.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

pub const FIXED_CONNECTION_MANAGER_NAME: &str = "sqlite-connection-manager";

/// A connection lent out by [`FixedConnectionManager`].
pub struct FixedConnection(Connection);

impl Deref for FixedConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.0
    }
}

/// Connection manager backed by a single `rusqlite::Connection`.
///
/// The handle is moved out on `take` and moved back on `release`; callers in
/// between wait on a `Condvar`. Operations are therefore serialized, which is
/// what a lone SQLite handle needs anyway. A `LockRecords` cursor keeps the
/// handle until it is exhausted or dropped.
pub struct FixedConnectionManager {
    slot: Mutex<Option<Connection>>,
    wake: Condvar,
}

impl FixedConnectionManager {
    pub fn new(connection: Connection) -> Self {
        FixedConnectionManager {
            slot: Mutex::new(Some(connection)),
            wake: Condvar::new(),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let connection =
            Connection::open(path).map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self::new(connection))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let connection =
            Connection::open_in_memory().map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self::new(connection))
    }

    /// Open the database named by `STORAGE_LOCK_SQLITE3_DB_PATH`.
    pub fn from_env() -> Result<Self, StorageError> {
        Self::open(database_path_from_env())
    }

    /// True when no operation currently holds the connection.
    pub fn is_idle(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

impl ConnectionManager for FixedConnectionManager {
    type Connection = FixedConnection;

    fn name(&self) -> &'static str {
        FIXED_CONNECTION_MANAGER_NAME
    }

    fn take(&self, ctx: &Context) -> Result<FixedConnection, StorageError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| StorageError::Connection(format!("connection slot poisoned: {}", e)))?;
        loop {
            if let Some(connection) = slot.take() {
                return Ok(FixedConnection(connection));
            }
            ctx.check()?;
            let wait = ctx
                .remaining()
                .map_or(CANCEL_POLL_INTERVAL, |left| left.min(CANCEL_POLL_INTERVAL));
            slot = self
                .wake
                .wait_timeout(slot, wait)
                .map_err(|e| StorageError::Connection(format!("connection slot poisoned: {}", e)))?
                .0;
        }
    }

    fn release(&self, _ctx: &Context, connection: FixedConnection) -> Result<(), StorageError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| StorageError::Connection(format!("connection slot poisoned: {}", e)))?;
        if slot.is_some() {
            return Err(StorageError::Connection(
                "released a connection this manager did not lend out".into(),
            ));
        }
        *slot = Some(connection.0);
        self.wake.notify_one();
        Ok(())
    }
}
