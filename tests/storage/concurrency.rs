use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use sqlite_lock_storage::{Context, LockInformation, Storage, StorageError, LIST_BUFFER_SIZE};

use crate::support::{memory_storage, pooled_storage};

/// Every thread tries to move `lock-A` from version 1 to 2 as owner `o1`.
fn race_updates<S: Storage + 'static>(
    storage: Arc<S>,
    contenders: usize,
) -> Vec<Result<(), StorageError>> {
    let barrier = Arc::new(Barrier::new(contenders));
    let handles: Vec<_> = (0..contenders)
        .map(|i| {
            let storage = Arc::clone(&storage);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let ctx = Context::with_timeout(Duration::from_secs(10));
                let mut info = LockInformation::new("o1", 2);
                info.lock_count = i as u32 + 1;
                barrier.wait();
                storage.update_with_version(&ctx, "lock-A", 1, 2, &info)
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn assert_single_winner(results: &[Result<(), StorageError>]) {
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "results: {:?}", results);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(result.as_ref().unwrap_err().is_version_miss());
    }
}

#[test]
fn concurrent_updates_on_shared_connection_have_one_winner() {
    let storage = Arc::new(memory_storage());
    storage
        .create_with_version(
            &Context::background(),
            "lock-A",
            1,
            &LockInformation::new("o1", 1),
        )
        .unwrap();

    let results = race_updates(Arc::clone(&storage), 8);
    assert_single_winner(&results);
    assert!(storage.connection_manager().is_idle());
}

#[test]
fn concurrent_updates_on_pool_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(pooled_storage(&dir.path().join("locks.db3")));
    storage
        .create_with_version(
            &Context::background(),
            "lock-A",
            1,
            &LockInformation::new("o1", 1),
        )
        .unwrap();

    let results = race_updates(Arc::clone(&storage), 4);
    assert_single_winner(&results);

    let stored = storage.get(&Context::background(), "lock-A").unwrap();
    assert_eq!(LockInformation::from_json_str(&stored).unwrap().version, 2);
}

#[test]
fn concurrent_creates_leave_one_row() {
    let storage = Arc::new(memory_storage());
    let barrier = Arc::new(Barrier::new(6));
    let handles: Vec<_> = (0..6)
        .map(|i| {
            let storage = Arc::clone(&storage);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let info = LockInformation::new(format!("owner-{}", i), 1);
                barrier.wait();
                storage.create_with_version(&Context::background(), "lock-A", 1, &info)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| *e == StorageError::LockAlreadyExists("lock-A".into())));

    let rows = storage
        .list(&Context::background())
        .unwrap()
        .filter(|r| r.as_ref().map_or(false, |r| r.lock_id == "lock-A"))
        .count();
    assert_eq!(rows, 1);
}

#[test]
fn waiting_for_a_busy_connection_honors_the_deadline() {
    let storage = memory_storage();
    let ctx = Context::background();
    for i in 0..LIST_BUFFER_SIZE * 2 {
        let lock_id = format!("lock-{}", i);
        storage
            .create_with_version(&ctx, &lock_id, 1, &LockInformation::new("o1", 1))
            .unwrap();
    }

    // A cursor with a full buffer keeps the only connection.
    let cursor = storage.list(&ctx).unwrap();

    let short = Context::with_timeout(Duration::from_millis(50));
    assert_eq!(
        storage.get(&short, "lock-0"),
        Err(StorageError::DeadlineExceeded)
    );

    drop(cursor);
    assert!(storage.get(&ctx, "lock-0").is_ok());
}
