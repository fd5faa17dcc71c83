//! Scoped acquisition: every connection taken for an operation goes back to its
//! manager exactly once, whether the operation succeeds, fails, or panics.

use std::panic::{self, AssertUnwindSafe};

use super::ConnectionManager;
use crate::context::Context;
use crate::error::StorageError;

/// Take a connection from `manager`, run `op` with it, and release it.
///
/// An error from `op` takes precedence over a release error; the release error
/// is only reported when `op` succeeded.
pub fn with_connection<M, T, F>(manager: &M, ctx: &Context, op: F) -> Result<T, StorageError>
where
    M: ConnectionManager + ?Sized,
    F: FnOnce(&rusqlite::Connection) -> Result<T, StorageError>,
{
    let connection = manager.take(ctx)?;
    run_with_connection(manager, ctx, connection, op)
}

/// Run `op` with an already-taken connection, then release it.
///
/// A panic inside `op` is caught long enough to release the connection and
/// is then resumed.
pub fn run_with_connection<M, T, F>(
    manager: &M,
    ctx: &Context,
    connection: M::Connection,
    op: F,
) -> Result<T, StorageError>
where
    M: ConnectionManager + ?Sized,
    F: FnOnce(&rusqlite::Connection) -> Result<T, StorageError>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| op(&*connection)));
    let released = manager.release(ctx, connection);

    match outcome {
        Ok(Ok(value)) => released.map(|()| value),
        Ok(Err(err)) => {
            if let Err(release_err) = released {
                tracing::warn!(
                    manager = manager.name(),
                    error = %release_err,
                    "connection release failed after operation error"
                );
            }
            Err(err)
        }
        Err(payload) => {
            if let Err(release_err) = released {
                tracing::warn!(
                    manager = manager.name(),
                    error = %release_err,
                    "connection release failed while unwinding"
                );
            }
            panic::resume_unwind(payload)
        }
    }
}
