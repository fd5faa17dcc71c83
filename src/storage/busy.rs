//! Busy waiting tied to the running operation's context.
//!
//! SQLite calls the busy handler on the thread executing the statement, so the
//! operation's context and wait budget live in a thread-local scope for the
//! duration of the operation. The handler naps in short slices and gives up as
//! soon as the context is cancelled or the budget runs out; the statement then
//! fails with `SQLITE_BUSY` and `execution_error` reports the context error.

use std::cell::RefCell;
use std::thread;
use std::time::{Duration, Instant};

use rusqlite::Connection;

use super::options::DEFAULT_BUSY_TIMEOUT;
use crate::context::Context;
use crate::error::StorageError;

/// Longest single nap; bounds how late a cancellation is noticed.
pub(crate) const BUSY_SLICE: Duration = Duration::from_millis(10);

struct BusyScope {
    ctx: Context,
    /// `None` when the budget does not fit an `Instant`; wait until cancelled.
    give_up: Option<Instant>,
}

thread_local! {
    static BUSY_SCOPE: RefCell<Option<BusyScope>> = const { RefCell::new(None) };
}

/// Restores the previous scope when the operation ends.
pub(crate) struct BusyGuard {
    previous: Option<BusyScope>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        BUSY_SCOPE.with(|scope| *scope.borrow_mut() = previous);
    }
}

/// Install the context-aware busy handler on `conn` and open a scope for `ctx`.
///
/// The wait budget is `busy_timeout`, shortened to the context deadline.
pub(crate) fn enter(
    conn: &Connection,
    ctx: &Context,
    busy_timeout: Duration,
) -> Result<BusyGuard, StorageError> {
    conn.busy_handler(Some(wait_while_busy))
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    let budget = ctx
        .remaining()
        .map_or(busy_timeout, |left| left.min(busy_timeout));
    let scope = BusyScope {
        ctx: ctx.clone(),
        give_up: Instant::now().checked_add(budget),
    };
    let previous = BUSY_SCOPE.with(|current| current.replace(Some(scope)));
    Ok(BusyGuard { previous })
}

fn wait_while_busy(attempts: i32) -> bool {
    let nap = BUSY_SCOPE.with(|scope| match scope.borrow().as_ref() {
        Some(scope) if scope.ctx.is_cancelled() => None,
        Some(scope) => match scope.give_up {
            Some(give_up) => {
                let left = give_up.saturating_duration_since(Instant::now());
                (!left.is_zero()).then(|| left.min(BUSY_SLICE))
            }
            None => Some(BUSY_SLICE),
        },
        // Connection used outside a storage operation.
        None => {
            let waited = BUSY_SLICE.saturating_mul(u32::try_from(attempts).unwrap_or(0));
            (waited < DEFAULT_BUSY_TIMEOUT).then_some(BUSY_SLICE)
        }
    });

    match nap {
        Some(nap) => {
            thread::sleep(nap);
            true
        }
        None => false,
    }
}
