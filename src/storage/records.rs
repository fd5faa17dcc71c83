use std::sync::mpsc::{self, Receiver, SendError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rusqlite::{Connection, Row};

use super::busy;
use super::sqlite::execution_error;
use crate::connection::{with_connection, ConnectionManager};
use crate::context::Context;
use crate::error::StorageError;
use crate::lock_information::LockRecord;

/// Rows buffered ahead of the consumer.
pub const LIST_BUFFER_SIZE: usize = 64;

type ReadySender = SyncSender<Result<(), StorageError>>;
type RowSender = SyncSender<Result<LockRecord, StorageError>>;

/// Forward-only cursor over the lock table, returned by `list`.
///
/// A worker thread owns the connection and the SQLite statement and feeds
/// decoded rows through a bounded channel. Exhausting the cursor or dropping it
/// early stops the worker, which then returns the connection to its manager;
/// `drop` waits for that to finish. A second scan needs a new `list` call.
pub struct LockRecords {
    rows: Option<Receiver<Result<LockRecord, StorageError>>>,
    worker: Option<JoinHandle<()>>,
}

impl LockRecords {
    /// Start the worker and wait until the query is running. Errors from taking
    /// the connection or preparing the query are returned here, not from the
    /// cursor.
    pub(crate) fn open<M>(
        manager: Arc<M>,
        ctx: &Context,
        sql: String,
        busy_timeout: Duration,
    ) -> Result<Self, StorageError>
    where
        M: ConnectionManager + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (rows_tx, rows_rx) = mpsc::sync_channel(LIST_BUFFER_SIZE);
        let worker_ctx = ctx.clone();

        let worker = thread::Builder::new()
            .name("lock-records".into())
            .spawn(move || {
                let ctx = worker_ctx;
                let mut ready = Some(ready_tx);
                let result = with_connection(&*manager, &ctx, |conn| {
                    let _busy = busy::enter(conn, &ctx, busy_timeout)?;
                    stream_rows(conn, &ctx, &sql, &mut ready, &rows_tx)
                });
                if let Err(err) = result {
                    deliver_error(err, ready.take(), &rows_tx);
                }
            })
            .map_err(|e| StorageError::Execution(format!("failed to start list cursor: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(LockRecords {
                rows: Some(rows_rx),
                worker: Some(worker),
            }),
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                let _ = worker.join();
                Err(StorageError::Execution(
                    "list cursor stopped before the query started".into(),
                ))
            }
        }
    }

    fn finish(&mut self) {
        // Dropping the receiver unblocks a worker waiting to send.
        self.rows.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("lock record cursor worker panicked");
            }
        }
    }
}

impl Iterator for LockRecords {
    type Item = Result<LockRecord, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        let received = self.rows.as_ref()?.recv();
        match received {
            Ok(item) => Some(item),
            Err(_) => {
                self.finish();
                None
            }
        }
    }
}

impl Drop for LockRecords {
    fn drop(&mut self) {
        self.finish();
    }
}

fn stream_rows(
    conn: &Connection,
    ctx: &Context,
    sql: &str,
    ready: &mut Option<ReadySender>,
    rows_tx: &RowSender,
) -> Result<(), StorageError> {
    let mut stmt = conn.prepare(sql).map_err(|e| execution_error(ctx, e))?;
    let mut rows = stmt.query([]).map_err(|e| execution_error(ctx, e))?;

    if let Some(ready_tx) = ready.take() {
        if ready_tx.send(Ok(())).is_err() {
            return Ok(());
        }
    }

    while let Some(row) = rows.next().map_err(|e| execution_error(ctx, e))? {
        ctx.check()?;
        let record = decode_record(row)?;
        if rows_tx.send(Ok(record)).is_err() {
            tracing::debug!("lock record cursor dropped before exhaustion");
            break;
        }
    }
    Ok(())
}

fn deliver_error(err: StorageError, ready: Option<ReadySender>, rows_tx: &RowSender) {
    let undelivered = match ready {
        Some(ready_tx) => ready_tx.send(Err(err)).err().and_then(|SendError(item)| item.err()),
        None => rows_tx.send(Err(err)).err().and_then(|SendError(item)| item.err()),
    };
    if let Some(err) = undelivered {
        tracing::warn!(error = %err, "lock record cursor error after consumer went away");
    }
}

fn decode_record(row: &Row<'_>) -> Result<LockRecord, StorageError> {
    let lock_id: String = row
        .get(0)
        .map_err(|e| StorageError::Execution(e.to_string()))?;
    let owner_id: String = row
        .get(1)
        .map_err(|e| StorageError::Execution(e.to_string()))?;
    let version: i64 = row
        .get(2)
        .map_err(|e| StorageError::Execution(e.to_string()))?;
    let lock_information_json_string: String = row
        .get(3)
        .map_err(|e| StorageError::Execution(e.to_string()))?;

    let version = u64::try_from(version).map_err(|_| {
        StorageError::Execution(format!(
            "lock {} has negative stored version {}",
            lock_id, version
        ))
    })?;

    Ok(LockRecord {
        lock_id,
        owner_id,
        version,
        lock_information_json_string,
    })
}
