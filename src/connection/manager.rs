use std::ops::Deref;

use crate::context::Context;
use crate::error::StorageError;

/// Hands out SQLite connections to storage operations and takes them back.
///
/// `SqliteStorage` takes a connection at the start of every operation and
/// releases it exactly once when the operation ends. `FixedConnectionManager`
/// shares a single handle; `PooledConnectionManager` draws from an r2d2 pool.
/// Other strategies (per-request connections, external pools) plug in here
/// without touching the storage logic.
pub trait ConnectionManager: Send + Sync {
    /// The handle type lent out by this manager.
    type Connection: Deref<Target = rusqlite::Connection> + Send + 'static;

    fn name(&self) -> &'static str;

    /// Take a connection, waiting no longer than the context allows.
    fn take(&self, ctx: &Context) -> Result<Self::Connection, StorageError>;

    /// Give a connection back. Called once for every successful `take`.
    fn release(&self, ctx: &Context, connection: Self::Connection) -> Result<(), StorageError>;
}
