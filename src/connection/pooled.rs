use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use super::{database_path_from_env, ConnectionManager};
use crate::context::Context;
use crate::error::StorageError;
use crate::storage::{check_busy_timeout, DEFAULT_BUSY_TIMEOUT};

pub const POOLED_CONNECTION_MANAGER_NAME: &str = "sqlite-pooled-connection-manager";

pub const DEFAULT_POOL_SIZE: u32 = 8;
/// Used by `take` when the context has no deadline.
pub const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection manager backed by an r2d2 pool of file-backed SQLite connections.
///
/// Every pooled connection runs in WAL mode with a busy timeout so concurrent
/// writers queue on the database lock instead of failing immediately.
#[derive(Clone)]
pub struct PooledConnectionManager {
    pool: Pool<SqliteConnectionManager>,
}

impl PooledConnectionManager {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with(path, DEFAULT_POOL_SIZE, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with(
        path: impl AsRef<Path>,
        max_size: u32,
        busy_timeout: Duration,
    ) -> Result<Self, StorageError> {
        check_busy_timeout(busy_timeout)?;
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
        });
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self::from_pool(pool))
    }

    /// Open the database named by `STORAGE_LOCK_SQLITE3_DB_PATH`.
    pub fn from_env() -> Result<Self, StorageError> {
        Self::open(database_path_from_env())
    }

    /// Wrap a pool configured elsewhere.
    pub fn from_pool(pool: Pool<SqliteConnectionManager>) -> Self {
        PooledConnectionManager { pool }
    }

    pub fn pool(&self) -> &Pool<SqliteConnectionManager> {
        &self.pool
    }
}

impl ConnectionManager for PooledConnectionManager {
    type Connection = PooledConnection<SqliteConnectionManager>;

    fn name(&self) -> &'static str {
        POOLED_CONNECTION_MANAGER_NAME
    }

    fn take(&self, ctx: &Context) -> Result<Self::Connection, StorageError> {
        ctx.check()?;
        let timeout = ctx.remaining().unwrap_or(DEFAULT_CHECKOUT_TIMEOUT);
        self.pool.get_timeout(timeout).map_err(|e| {
            ctx.check()
                .err()
                .unwrap_or_else(|| StorageError::Connection(e.to_string()))
        })
    }

    fn release(&self, _ctx: &Context, connection: Self::Connection) -> Result<(), StorageError> {
        // Dropping the handle returns it to the pool.
        drop(connection);
        Ok(())
    }
}
