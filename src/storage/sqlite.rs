use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::busy;
use super::options::SqliteStorageOptions;
use super::records::LockRecords;
use super::schema;
use super::store::Storage;
use crate::connection::{self, ConnectionManager};
use crate::context::Context;
use crate::error::StorageError;
use crate::lock_information::{LockInformation, Version};

pub const SQLITE_STORAGE_NAME: &str = "sqlite3-storage";

/// Statement text rendered once for the configured table.
struct Statements {
    create_table: String,
    insert: String,
    update_with_version: String,
    delete_with_version: String,
    select_payload: String,
    select_all: String,
}

impl Statements {
    fn for_table(table: &str) -> Self {
        Statements {
            create_table: schema::create_table(table),
            insert: schema::insert(table),
            update_with_version: schema::update_with_version(table),
            delete_with_version: schema::delete_with_version(table),
            select_payload: schema::select_payload(table),
            select_all: schema::select_all(table),
        }
    }
}

/// Lock record storage on a single SQLite table.
///
/// Holds no mutable state of its own: every operation takes a connection from
/// the manager, runs one statement, and hands the connection back. Share it
/// across threads behind an `Arc`.
pub struct SqliteStorage<M: ConnectionManager> {
    connection_manager: Arc<M>,
    table_name: String,
    busy_timeout: Duration,
    statements: Statements,
}

impl<M: ConnectionManager + 'static> SqliteStorage<M> {
    /// Build the storage and create its table. Fails without a usable table.
    pub fn new(ctx: &Context, options: SqliteStorageOptions<M>) -> Result<Self, StorageError> {
        let busy_timeout = options.busy_timeout();
        let (connection_manager, table_name) = options.resolve()?;
        let storage = SqliteStorage {
            statements: Statements::for_table(&table_name),
            connection_manager,
            table_name,
            busy_timeout,
        };
        storage.init(ctx)?;
        Ok(storage)
    }
}

impl<M: ConnectionManager> SqliteStorage<M> {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn connection_manager(&self) -> &Arc<M> {
        &self.connection_manager
    }

    fn with_connection<T, F>(&self, ctx: &Context, op: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        ctx.check()?;
        connection::with_connection(&*self.connection_manager, ctx, |conn| {
            let _busy = busy::enter(conn, ctx, self.busy_timeout)?;
            op(conn)
        })
    }

    /// Run a conditional write and turn "no row matched" into a version miss.
    fn execute_conditional(
        &self,
        ctx: &Context,
        operation: &'static str,
        lock_id: &str,
        expected_version: Version,
        run: impl FnOnce(&Connection) -> Result<usize, StorageError>,
    ) -> Result<(), StorageError> {
        let affected = self.with_connection(ctx, run)?;
        if affected == 0 {
            tracing::debug!(
                table = %self.table_name,
                lock_id,
                expected_version,
                operation,
                "version miss"
            );
            return Err(StorageError::VersionMiss {
                lock_id: lock_id.to_string(),
                expected_version,
            });
        }
        Ok(())
    }
}

impl<M: ConnectionManager + 'static> Storage for SqliteStorage<M> {
    type Records = LockRecords;

    fn name(&self) -> &'static str {
        SQLITE_STORAGE_NAME
    }

    fn init(&self, ctx: &Context) -> Result<(), StorageError> {
        self.with_connection(ctx, |conn| {
            conn.execute_batch(&self.statements.create_table)
                .map_err(|e| match execution_error(ctx, e) {
                    StorageError::Execution(msg) => StorageError::SchemaInit(msg),
                    other => other,
                })
        })?;
        tracing::debug!(table = %self.table_name, "lock table ready");
        Ok(())
    }

    fn create_with_version(
        &self,
        ctx: &Context,
        lock_id: &str,
        version: Version,
        lock_information: &LockInformation,
    ) -> Result<(), StorageError> {
        let sql_version = to_sql_version(version)?;
        let payload = lock_information.to_json_string()?;

        self.execute_conditional(ctx, "create", lock_id, version, |conn| {
            let mut stmt = conn
                .prepare_cached(&self.statements.insert)
                .map_err(|e| execution_error(ctx, e))?;
            stmt.execute(params![
                lock_id,
                lock_information.owner_id,
                sql_version,
                payload
            ])
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    StorageError::LockAlreadyExists(lock_id.to_string())
                }
                other => execution_error(ctx, other),
            })
        })
    }

    fn update_with_version(
        &self,
        ctx: &Context,
        lock_id: &str,
        expected_version: Version,
        new_version: Version,
        lock_information: &LockInformation,
    ) -> Result<(), StorageError> {
        let sql_expected = to_sql_version(expected_version)?;
        let sql_new = to_sql_version(new_version)?;
        let payload = lock_information.to_json_string()?;

        self.execute_conditional(ctx, "update", lock_id, expected_version, |conn| {
            let mut stmt = conn
                .prepare_cached(&self.statements.update_with_version)
                .map_err(|e| execution_error(ctx, e))?;
            stmt.execute(params![
                sql_new,
                payload,
                lock_id,
                lock_information.owner_id,
                sql_expected
            ])
            .map_err(|e| execution_error(ctx, e))
        })
    }

    fn delete_with_version(
        &self,
        ctx: &Context,
        lock_id: &str,
        expected_version: Version,
        lock_information: &LockInformation,
    ) -> Result<(), StorageError> {
        let sql_expected = to_sql_version(expected_version)?;

        self.execute_conditional(ctx, "delete", lock_id, expected_version, |conn| {
            let mut stmt = conn
                .prepare_cached(&self.statements.delete_with_version)
                .map_err(|e| execution_error(ctx, e))?;
            stmt.execute(params![lock_id, lock_information.owner_id, sql_expected])
                .map_err(|e| execution_error(ctx, e))
        })
    }

    fn get(&self, ctx: &Context, lock_id: &str) -> Result<String, StorageError> {
        let payload = self.with_connection(ctx, |conn| {
            conn.query_row(&self.statements.select_payload, params![lock_id], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(|e| execution_error(ctx, e))
        })?;
        payload.ok_or_else(|| StorageError::LockNotFound(lock_id.to_string()))
    }

    fn list(&self, ctx: &Context) -> Result<LockRecords, StorageError> {
        ctx.check()?;
        LockRecords::open(
            Arc::clone(&self.connection_manager),
            ctx,
            self.statements.select_all.clone(),
            self.busy_timeout,
        )
    }

    fn get_server_time(&self, ctx: &Context) -> Result<SystemTime, StorageError> {
        let millis = self.with_connection(ctx, |conn| {
            conn.query_row(schema::SERVER_TIME_MILLIS, [], |row| row.get::<_, i64>(0))
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => {
                        StorageError::Execution("server time query returned no rows".into())
                    }
                    other => execution_error(ctx, other),
                })
        })?;
        let millis = u64::try_from(millis).map_err(|_| {
            StorageError::Execution(format!("server time {} is before the epoch", millis))
        })?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }

    fn close(&self, _ctx: &Context) -> Result<(), StorageError> {
        // The connection manager's lifecycle belongs to whoever built it.
        Ok(())
    }
}

/// A driver error, unless the context expired meanwhile; then the context error.
pub(super) fn execution_error(ctx: &Context, err: rusqlite::Error) -> StorageError {
    ctx.check()
        .err()
        .unwrap_or_else(|| StorageError::Execution(err.to_string()))
}

fn to_sql_version(version: Version) -> Result<i64, StorageError> {
    i64::try_from(version).map_err(|_| {
        StorageError::InvalidArgument(format!(
            "version {} does not fit a 64-bit signed column",
            version
        ))
    })
}
