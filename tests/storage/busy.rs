use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use sqlite_lock_storage::rusqlite::Connection;
use sqlite_lock_storage::{
    Context, LockInformation, PooledConnectionManager, SqliteStorage, SqliteStorageOptions,
    Storage, StorageError,
};

fn storage_with_busy_timeout(
    path: &Path,
    busy_timeout: Duration,
) -> SqliteStorage<PooledConnectionManager> {
    let manager = PooledConnectionManager::open(path).unwrap();
    SqliteStorage::new(
        &Context::background(),
        SqliteStorageOptions::new()
            .with_connection_manager(manager)
            .with_busy_timeout(busy_timeout),
    )
    .unwrap()
}

/// Another process holding the write lock.
fn hold_write_lock(path: &Path) -> Connection {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch("BEGIN IMMEDIATE").unwrap();
    conn
}

#[test]
fn cancel_interrupts_wait_on_locked_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locks.db3");
    let storage = storage_with_busy_timeout(&path, Duration::from_secs(30));
    let writer = hold_write_lock(&path);

    let ctx = Context::background();
    let canceller = {
        let ctx = ctx.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            ctx.cancel();
        })
    };

    let started = Instant::now();
    let result = storage.create_with_version(&ctx, "lock-A", 1, &LockInformation::new("o1", 1));
    let elapsed = started.elapsed();
    canceller.join().unwrap();

    assert_eq!(result, Err(StorageError::Cancelled));
    assert!(elapsed < Duration::from_secs(2), "waited {:?}", elapsed);

    writer.execute_batch("ROLLBACK").unwrap();
    let info = LockInformation::new("o1", 1);
    storage
        .create_with_version(&Context::background(), "lock-A", 1, &info)
        .unwrap();
}

#[test]
fn deadline_cuts_busy_wait_short() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locks.db3");
    let storage = storage_with_busy_timeout(&path, Duration::from_secs(30));
    let _writer = hold_write_lock(&path);

    let ctx = Context::with_timeout(Duration::from_millis(100));
    let started = Instant::now();
    let result = storage.delete_with_version(&ctx, "lock-A", 1, &LockInformation::new("o1", 1));

    assert_eq!(result, Err(StorageError::DeadlineExceeded));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn busy_timeout_without_deadline_is_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locks.db3");
    let storage = storage_with_busy_timeout(&path, Duration::from_millis(100));
    let _writer = hold_write_lock(&path);

    let started = Instant::now();
    let result = storage.create_with_version(
        &Context::background(),
        "lock-A",
        1,
        &LockInformation::new("o1", 1),
    );

    assert!(matches!(result, Err(StorageError::Execution(_))), "{:?}", result);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn oversized_busy_timeout_is_invalid_config() {
    let manager = sqlite_lock_storage::FixedConnectionManager::open_in_memory().unwrap();
    let result = SqliteStorage::new(
        &Context::background(),
        SqliteStorageOptions::new()
            .with_connection_manager(manager)
            .with_busy_timeout(Duration::from_secs(30 * 24 * 60 * 60)),
    );
    assert!(matches!(result, Err(StorageError::InvalidConfig(_))));
}
