use std::time::SystemTime;

use crate::context::Context;
use crate::error::StorageError;
use crate::lock_information::{LockInformation, LockRecord, Version};

/// Version-checked persistence for lock records.
///
/// Writes are compare-and-set on `(lock_id, owner_id, version)`: a write that
/// matches no row fails with `StorageError::VersionMiss` and changes nothing.
/// A lock manager can retry a miss with fresh state. `Connection` and
/// `Execution` errors are left to its retry policy. Nothing is retried here.
pub trait Storage: Send + Sync {
    /// Forward-only cursor returned by `list`.
    type Records: Iterator<Item = Result<LockRecord, StorageError>>;

    fn name(&self) -> &'static str;

    /// Create the lock table if it does not exist. Safe to call repeatedly.
    fn init(&self, ctx: &Context) -> Result<(), StorageError>;

    /// Insert a new lock row. Fails with `LockAlreadyExists` if `lock_id` is taken.
    fn create_with_version(
        &self,
        ctx: &Context,
        lock_id: &str,
        version: Version,
        lock_information: &LockInformation,
    ) -> Result<(), StorageError>;

    /// Move a lock held by `lock_information.owner_id` from `expected_version`
    /// to `new_version` in one conditional statement.
    fn update_with_version(
        &self,
        ctx: &Context,
        lock_id: &str,
        expected_version: Version,
        new_version: Version,
        lock_information: &LockInformation,
    ) -> Result<(), StorageError>;

    /// Delete a lock held by `lock_information.owner_id` at `expected_version`.
    fn delete_with_version(
        &self,
        ctx: &Context,
        lock_id: &str,
        expected_version: Version,
        lock_information: &LockInformation,
    ) -> Result<(), StorageError>;

    /// The stored lock information JSON, or `LockNotFound`.
    fn get(&self, ctx: &Context, lock_id: &str) -> Result<String, StorageError>;

    /// Stream every lock row. The cursor holds its connection until it is
    /// exhausted or dropped.
    fn list(&self, ctx: &Context) -> Result<Self::Records, StorageError>;

    /// The storage backend's own clock.
    fn get_server_time(&self, ctx: &Context) -> Result<SystemTime, StorageError>;

    fn close(&self, ctx: &Context) -> Result<(), StorageError>;
}
