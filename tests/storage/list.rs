use std::collections::BTreeMap;
use std::time::Duration;

use sqlite_lock_storage::{Context, LockInformation, Storage, StorageError, LIST_BUFFER_SIZE};

use crate::support::{memory_storage, pooled_storage};

fn seed<S: Storage>(storage: &S, count: usize) {
    let ctx = Context::background();
    for i in 0..count {
        let info = LockInformation::new(format!("owner-{}", i), i as u64 + 1);
        storage
            .create_with_version(&ctx, &format!("lock-{:04}", i), i as u64 + 1, &info)
            .unwrap();
    }
}

#[test]
fn empty_table_lists_nothing() {
    let storage = memory_storage();
    let mut records = storage.list(&Context::background()).unwrap();
    assert!(records.next().is_none());
    assert!(records.next().is_none());
}

#[test]
fn list_decodes_every_row() {
    let storage = memory_storage();
    seed(&storage, 3);

    let records: BTreeMap<_, _> = storage
        .list(&Context::background())
        .unwrap()
        .map(|r| r.unwrap())
        .map(|r| (r.lock_id.clone(), r))
        .collect();

    assert_eq!(records.len(), 3);
    let second = &records["lock-0001"];
    assert_eq!(second.owner_id, "owner-1");
    assert_eq!(second.version, 2);
    let info = second.lock_information().unwrap();
    assert_eq!(info.owner_id, "owner-1");
    assert_eq!(info.version, 2);
}

#[test]
fn list_streams_more_rows_than_the_buffer() {
    let storage = memory_storage();
    let total = LIST_BUFFER_SIZE * 3 + 7;
    seed(&storage, total);

    let count = storage
        .list(&Context::background())
        .unwrap()
        .map(|r| r.unwrap())
        .count();
    assert_eq!(count, total);
    assert!(storage.connection_manager().is_idle());
}

#[test]
fn abandoned_cursor_returns_its_connection() {
    let storage = memory_storage();
    seed(&storage, LIST_BUFFER_SIZE * 2);

    let mut records = storage.list(&Context::background()).unwrap();
    assert!(records.next().unwrap().is_ok());
    assert!(!storage.connection_manager().is_idle());

    drop(records);
    assert!(storage.connection_manager().is_idle());
    assert!(storage.get(&Context::background(), "lock-0000").is_ok());
}

#[test]
fn exhausted_cursor_returns_its_connection() {
    let storage = memory_storage();
    seed(&storage, 2);

    let mut records = storage.list(&Context::background()).unwrap();
    while let Some(record) = records.next() {
        record.unwrap();
    }
    assert!(storage.connection_manager().is_idle());
    assert!(records.next().is_none());
}

#[test]
fn cancelling_mid_scan_ends_with_the_context_error() {
    let storage = memory_storage();
    seed(&storage, LIST_BUFFER_SIZE * 4);

    let ctx = Context::background();
    let mut records = storage.list(&ctx).unwrap();
    assert!(records.next().unwrap().is_ok());
    ctx.cancel();

    let tail: Vec<_> = records.by_ref().collect();
    assert_eq!(tail.last(), Some(&Err(StorageError::Cancelled)));
    assert!(tail.len() < LIST_BUFFER_SIZE * 4);
    drop(records);
    assert!(storage.connection_manager().is_idle());
}

#[test]
fn pooled_cursor_does_not_block_other_operations() {
    let dir = tempfile::tempdir().unwrap();
    let storage = pooled_storage(&dir.path().join("locks.db3"));
    seed(&storage, 5);

    let ctx = Context::with_timeout(Duration::from_secs(5));
    let mut records = storage.list(&ctx).unwrap();
    assert!(records.next().unwrap().is_ok());

    // A second connection serves the point lookup while the scan is open.
    assert!(storage.get(&ctx, "lock-0004").is_ok());
    assert_eq!(records.count(), 4);
}
