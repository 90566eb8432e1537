//! Safe wrapper around a `SQLite` database connection.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`ffi::RawDb`] which encapsulates the raw pointers and C type conversions.

use std::ffi::CString;
use std::os::raw::c_int;
use std::path::Path;

use tracing::{info, warn};

use super::error::{DbError, DbErrorCode, DbResult};
use super::ffi::{self, RawDb, RawError};
use super::options::{ConnectionConfig, OpenDisposition, OpenFlags};
use super::savepoint::Savepoint;
use super::statement::{IntoSql, Statement};
use super::value::Value;

/// A `SQLite` database connection.
///
/// Owns the native handle, which is closed exactly once when the connection
/// is dropped. Not `Sync`: callers serialize all use of a connection and the
/// statements prepared from it.
pub struct Connection {
    db: RawDb,
}

impl Connection {
    /// Opens `target` with `disposition | flags`, then enables extended
    /// result codes.
    ///
    /// `target` is a file path, `":memory:"`, or a `file:` URI when
    /// [`OpenFlags::URI`] is set. If neither [`OpenFlags::READ_ONLY`] nor
    /// [`OpenFlags::READ_WRITE`] is given, the database is opened read-write.
    ///
    /// [`OpenDisposition::CreateExclusive`] checks that the file does not
    /// exist before opening and adds [`OpenFlags::NO_FOLLOW`], so a symlink
    /// (dangling or not) is refused. The check is not atomic: a file created
    /// by another process between the check and the open is opened as is.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Open`] if the engine refuses to open the target,
    /// if extended result codes cannot be enabled, or if `disposition` is
    /// [`OpenDisposition::CreateExclusive`] and the file already exists.
    pub fn create(
        target: &str,
        disposition: OpenDisposition,
        flags: OpenFlags,
    ) -> DbResult<Self> {
        let mut flags = flags.with_access_mode();
        if disposition == OpenDisposition::CreateExclusive {
            flags |= OpenFlags::NO_FOLLOW;
        }
        let bits = disposition.bits() | flags.bits();
        info!(
            target: "sql",
            db = target,
            disposition = ?disposition,
            flags = %format!("{bits:#x}"),
            "opening sqlite connection"
        );

        if disposition == OpenDisposition::CreateExclusive
            && is_file_target(target, flags)
            && Path::new(target).exists()
        {
            return Err(DbError::Open {
                target: target.to_string(),
                code: DbErrorCode(ffi::SQLITE_CANTOPEN),
                message: "database already exists".to_string(),
            });
        }

        let c_target = CString::new(target).map_err(|e| DbError::Open {
            target: target.to_string(),
            code: DbErrorCode(ffi::SQLITE_MISUSE),
            message: format!("invalid target: {e}"),
        })?;
        let db = RawDb::open(&c_target, bits).map_err(|e| {
            warn!(target: "sql", db = target, code = e.code, "open failed");
            DbError::open(target, e)
        })?;

        // On failure `db` is dropped here, releasing the handle.
        check_open(target, &db, db.enable_extended_result_codes())?;
        Ok(Self { db })
    }

    /// Opens `target` as described by `config`, including its busy timeout.
    ///
    /// # Errors
    ///
    /// See [`Connection::create`]. Also fails with [`DbError::Open`] if the
    /// busy timeout cannot be applied.
    pub fn open_with_config(target: &str, config: &ConnectionConfig) -> DbResult<Self> {
        let conn = Self::create(target, config.disposition, config.flags())?;
        if let Some(ms) = config.busy_timeout_ms {
            let ms = c_int::try_from(ms).unwrap_or(c_int::MAX);
            check_open(target, &conn.db, conn.db.busy_timeout(ms))?;
        }
        Ok(conn)
    }

    /// Opens a private, read-write in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Open`] if the engine cannot allocate the database.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::create(":memory:", OpenDisposition::CreateIfMissing, OpenFlags::IN_MEMORY)
    }

    /// Returns the rowid of the most recent successful INSERT.
    ///
    /// The value is only meaningful directly after the insert of interest;
    /// it is `0` if nothing has been inserted on this connection.
    #[must_use]
    pub fn last_insert_rowid(&self) -> i64 {
        self.db.last_insert_rowid()
    }

    /// Returns the number of rows changed by the most recent statement.
    #[must_use]
    pub fn changes(&self) -> usize {
        usize::try_from(self.db.changes()).unwrap_or(0)
    }

    /// Executes one or more SQL statements separated by semicolons.
    ///
    /// No result rows are returned. Suitable for DDL, PRAGMAs, and
    /// multi-statement scripts.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Exec`] with the code of the first failing statement.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        let c_sql = CString::new(sql).map_err(|e| DbError::Exec {
            code: DbErrorCode(ffi::SQLITE_MISUSE),
            message: format!("nul in SQL: {e}"),
        })?;
        self.db.exec(&c_sql).map_err(DbError::exec)
    }

    /// Prepares a single SQL statement.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Compile`] if the SQL is invalid.
    pub fn prepare<'s>(&self, sql: impl IntoSql<'s>) -> DbResult<Statement<'_>> {
        Statement::new(self, sql)
    }

    /// Prepares a statement with the persistent hint set.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Compile`] if the SQL is invalid.
    pub fn prepare_persistent<'s>(&self, sql: impl IntoSql<'s>) -> DbResult<Statement<'_>> {
        Statement::new_persistent(self, sql)
    }

    /// Prepares and executes a single SQL statement with the given parameters.
    ///
    /// Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Propagates compile, bind and step failures, and returns
    /// [`DbError::UnexpectedRow`] if the statement yields a row.
    pub fn execute(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind_values(params)?;
        stmt.execute()?;
        Ok(self.changes())
    }

    /// Prepares and executes a statement, mapping exactly one result row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NoRows`] if no row is returned, or any error from
    /// preparing, binding, stepping or `mapper`.
    pub fn query_row<T>(
        &self,
        sql: &str,
        params: &[Value],
        mapper: impl FnOnce(&Statement<'_>) -> DbResult<T>,
    ) -> DbResult<T> {
        self.query_row_optional(sql, params, mapper)?
            .ok_or(DbError::NoRows)
    }

    /// Like [`query_row`](Self::query_row) but returns `Ok(None)` when no row
    /// is returned.
    ///
    /// # Errors
    ///
    /// Any error from preparing, binding, stepping or `mapper`.
    pub fn query_row_optional<T>(
        &self,
        sql: &str,
        params: &[Value],
        mapper: impl FnOnce(&Statement<'_>) -> DbResult<T>,
    ) -> DbResult<Option<T>> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind_values(params)?;
        if stmt.step()? {
            mapper(&stmt).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Begins a named savepoint on this connection.
    ///
    /// Use [`Savepoint::savepoint`] to nest; it borrows the enclosing
    /// savepoint so the two cannot be resolved out of order.
    ///
    /// # Aborts
    ///
    /// Two savepoints begun here are both live on the connection. Resolving
    /// the earlier one also releases the later one, whose own resolution
    /// (including on drop) then fails and aborts the process.
    ///
    /// # Errors
    ///
    /// See [`Savepoint::begin`].
    pub fn savepoint(&self, name: impl Into<String>) -> DbResult<Savepoint<'_>> {
        Savepoint::begin(self, name)
    }

    pub(crate) const fn raw(&self) -> &RawDb {
        &self.db
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

fn check_open(target: &str, db: &RawDb, rc: c_int) -> DbResult<()> {
    if rc == ffi::SQLITE_OK {
        return Ok(());
    }
    Err(DbError::open(
        target,
        RawError {
            code: rc,
            message: db.errmsg(),
        },
    ))
}

/// `true` when `target` names a file on disk rather than memory or a URI.
fn is_file_target(target: &str, flags: OpenFlags) -> bool {
    !(target.is_empty()
        || target == ":memory:"
        || flags.contains(OpenFlags::IN_MEMORY)
        || flags.contains(OpenFlags::URI))
}
