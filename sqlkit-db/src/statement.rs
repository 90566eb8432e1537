//! Safe wrapper around a `SQLite` prepared statement.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`ffi::RawStmt`] which encapsulates the raw pointers and C type conversions.

use std::borrow::Cow;
use std::ffi::{CStr, CString, NulError};
use std::os::raw::c_int;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, warn};

use super::connection::Connection;
use super::error::{DbError, DbErrorCode, DbResult};
use super::ffi::{self, RawStmt};
use super::value::{self, Bind, FromColumn, Null, Value};

/// Source of diagnostic statement ids; never reset while the process runs.
static NEXT_STATEMENT_ID: AtomicU64 = AtomicU64::new(0);

fn next_statement_id() -> u64 {
    NEXT_STATEMENT_ID.fetch_add(1, Ordering::Relaxed) + 1
}

mod private {
    pub trait Sealed {}
}

/// SQL text accepted by [`Statement::new`].
///
/// Already terminated text (`&CStr`, `CString`) is passed to the engine as
/// is; `&str` and `String` are copied into a terminated buffer first.
pub trait IntoSql<'a>: private::Sealed {
    /// Converts into NUL-terminated SQL text.
    ///
    /// # Errors
    ///
    /// Fails if the text contains an interior NUL byte.
    fn into_sql(self) -> Result<Cow<'a, CStr>, NulError>;
}

impl private::Sealed for &str {}
impl<'a> IntoSql<'a> for &'a str {
    fn into_sql(self) -> Result<Cow<'a, CStr>, NulError> {
        CString::new(self).map(Cow::Owned)
    }
}

impl private::Sealed for &String {}
impl<'a> IntoSql<'a> for &'a String {
    fn into_sql(self) -> Result<Cow<'a, CStr>, NulError> {
        CString::new(self.as_str()).map(Cow::Owned)
    }
}

impl private::Sealed for String {}
impl IntoSql<'static> for String {
    fn into_sql(self) -> Result<Cow<'static, CStr>, NulError> {
        CString::new(self).map(Cow::Owned)
    }
}

impl private::Sealed for &CStr {}
impl<'a> IntoSql<'a> for &'a CStr {
    fn into_sql(self) -> Result<Cow<'a, CStr>, NulError> {
        Ok(Cow::Borrowed(self))
    }
}

impl private::Sealed for CString {}
impl IntoSql<'static> for CString {
    fn into_sql(self) -> Result<Cow<'static, CStr>, NulError> {
        Ok(Cow::Owned(self))
    }
}

/// Execution state of a [`Statement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// Compiled and ready to step (initial state, and the state after reset).
    Prepared,
    /// The last step produced a row; columns may be read.
    HasRow,
    /// The last step ran the statement to completion.
    Completed,
    /// The last step or bind failed. Only [`Statement::reset`] leaves this
    /// state.
    Error,
}

/// What a failed step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    /// Return [`DbError::Step`] to the caller.
    #[default]
    Propagate,
    /// Log the failure and abort the process. For statements whose failure
    /// leaves a transaction boundary in an unknown state.
    Abort,
}

/// A prepared `SQLite` statement.
///
/// Created via [`Statement::new`] or [`Connection::prepare`]. Tied to the
/// lifetime of the connection that created it. Finalized when dropped.
pub struct Statement<'conn> {
    raw: RawStmt<'conn>,
    id: u64,
    state: StatementState,
}

impl<'conn> Statement<'conn> {
    /// Compiles `sql` against `conn`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Compile`] if the SQL is invalid, names unknown
    /// schema objects, contains an interior NUL, or holds no statement.
    pub fn new<'s>(conn: &'conn Connection, sql: impl IntoSql<'s>) -> DbResult<Self> {
        Self::prepare(conn, sql, false)
    }

    /// Like [`new`](Self::new) but hints the engine that the compiled form
    /// will be retained and reused.
    ///
    /// # Errors
    ///
    /// See [`Statement::new`].
    pub fn new_persistent<'s>(
        conn: &'conn Connection,
        sql: impl IntoSql<'s>,
    ) -> DbResult<Self> {
        Self::prepare(conn, sql, true)
    }

    fn prepare<'s>(
        conn: &'conn Connection,
        sql: impl IntoSql<'s>,
        persistent: bool,
    ) -> DbResult<Self> {
        let id = next_statement_id();
        let sql = sql.into_sql().map_err(|e| DbError::Compile {
            code: DbErrorCode(ffi::SQLITE_MISUSE),
            message: format!("nul in SQL: {e}"),
        })?;
        debug!(
            target: "sql",
            statement_id = id,
            persistent,
            sql = %sql.to_string_lossy(),
            "preparing statement"
        );

        let raw = conn
            .raw()
            .prepare(&sql, persistent)
            .map_err(|e| {
                warn!(target: "sql", statement_id = id, code = e.code, "prepare failed");
                DbError::compile(e)
            })?
            .ok_or_else(|| DbError::Compile {
                code: DbErrorCode(ffi::SQLITE_MISUSE),
                message: "SQL contains no statement".to_string(),
            })?;

        Ok(Self {
            raw,
            id,
            state: StatementState::Prepared,
        })
    }

    /// Process-unique diagnostic identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Current execution state.
    #[must_use]
    pub const fn state(&self) -> StatementState {
        self.state
    }

    // ── Binding ─────────────────────────────────────────────────────────

    /// Binds `value` to the 1-based parameter slot `index`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Bind`] and moves the statement to
    /// [`StatementState::Error`] if the engine rejects the bind (for example
    /// an out-of-range index, or binding while a step is in progress).
    pub fn bind<T: Bind>(&mut self, index: usize, value: T) -> DbResult<()> {
        let Ok(slot) = c_int::try_from(index) else {
            self.state = StatementState::Error;
            return Err(DbError::bind(
                index,
                ffi::SQLITE_RANGE,
                ffi::errstr(ffi::SQLITE_RANGE),
            ));
        };
        let rc = value::bind_value(&self.raw, slot, &value);
        if rc != ffi::SQLITE_OK {
            self.state = StatementState::Error;
            return Err(DbError::bind(index, rc, self.raw.errmsg()));
        }
        Ok(())
    }

    /// Binds SQL NULL to the 1-based parameter slot `index`.
    ///
    /// # Errors
    ///
    /// See [`Statement::bind`].
    pub fn bind_null(&mut self, index: usize) -> DbResult<()> {
        self.bind(index, Null)
    }

    /// Binds a slice of [`Value`]s to the statement parameters (1-indexed).
    ///
    /// # Errors
    ///
    /// Stops at the first failing slot; see [`Statement::bind`].
    pub fn bind_values(&mut self, values: &[Value]) -> DbResult<()> {
        for (i, val) in values.iter().enumerate() {
            self.bind(i + 1, val.clone())?;
        }
        Ok(())
    }

    // ── Stepping ────────────────────────────────────────────────────────

    /// Advances by one row, returning `true` if a row is available.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Step`] for any result other than a row or
    /// completion, leaving the statement in [`StatementState::Error`].
    /// A statement that has completed or failed must be [reset](Self::reset)
    /// before it is stepped again; otherwise the step is refused with
    /// `SQLITE_MISUSE` and the engine is not called.
    pub fn step(&mut self) -> DbResult<bool> {
        self.step_with(OnError::Propagate)
    }

    /// Advances by one row with an explicit failure policy.
    ///
    /// # Errors
    ///
    /// With [`OnError::Propagate`], see [`Statement::step`]. With
    /// [`OnError::Abort`] a failure terminates the process instead.
    pub fn step_with(&mut self, on_error: OnError) -> DbResult<bool> {
        // The engine would silently restart a finished or failed statement.
        if matches!(
            self.state,
            StatementState::Completed | StatementState::Error
        ) {
            let message = "statement must be reset";
            if on_error == OnError::Abort {
                fail_fast(self.id, ffi::SQLITE_MISUSE, message);
            }
            warn!(
                target: "sql",
                statement_id = self.id,
                state = ?self.state,
                "step refused before reset"
            );
            self.state = StatementState::Error;
            return Err(DbError::step(ffi::SQLITE_MISUSE, message.to_string()));
        }

        debug!(target: "sql", statement_id = self.id, "stepping statement");
        match self.raw.step() {
            ffi::SQLITE_ROW => {
                debug!(target: "sql", statement_id = self.id, "statement has data");
                self.state = StatementState::HasRow;
                Ok(true)
            }
            ffi::SQLITE_DONE => {
                debug!(target: "sql", statement_id = self.id, "statement has completed");
                self.state = StatementState::Completed;
                Ok(false)
            }
            rc => {
                self.state = StatementState::Error;
                let message = self.raw.errmsg();
                if on_error == OnError::Abort {
                    fail_fast(self.id, rc, &message);
                }
                warn!(
                    target: "sql",
                    statement_id = self.id,
                    code = rc,
                    message = %message,
                    "statement step failed"
                );
                Err(DbError::step(rc, message))
            }
        }
    }

    /// Runs a statement that is expected to produce no rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnexpectedRow`] if a row is produced, or any
    /// error from [`Statement::step`].
    pub fn execute(&mut self) -> DbResult<()> {
        self.execute_with(OnError::Propagate)
    }

    /// Like [`execute`](Self::execute) with an explicit failure policy.
    ///
    /// # Errors
    ///
    /// See [`Statement::execute`] and [`Statement::step_with`].
    pub fn execute_with(&mut self, on_error: OnError) -> DbResult<()> {
        if self.step_with(on_error)? {
            return Err(DbError::UnexpectedRow {
                statement_id: self.id,
            });
        }
        Ok(())
    }

    /// Returns the statement to [`StatementState::Prepared`].
    ///
    /// Bound parameters are kept.
    pub fn reset(&mut self) {
        debug!(target: "sql", statement_id = self.id, "resetting statement");
        // The reset code only repeats the error of the last step, which has
        // already been reported.
        let _ = self.raw.reset();
        self.state = StatementState::Prepared;
    }

    // ── Column reading ──────────────────────────────────────────────────

    /// Reads the 0-based `column` of the current row.
    ///
    /// Only meaningful in [`StatementState::HasRow`].
    #[must_use]
    pub fn get<T: FromColumn>(&self, column: usize) -> T {
        debug_assert_eq!(self.state, StatementState::HasRow);
        value::read_column(&self.raw, column_index(column))
    }

    /// Returns `true` if `column` of the current row is SQL NULL.
    #[must_use]
    pub fn is_column_null(&self, column: usize) -> bool {
        debug_assert_eq!(self.state, StatementState::HasRow);
        self.raw.column_type(column_index(column)) == ffi::SQLITE_NULL
    }

    /// Number of columns in the result set.
    #[must_use]
    pub fn column_count(&self) -> usize {
        usize::try_from(self.raw.column_count()).unwrap_or(0)
    }

    /// Number of parameter slots in the statement.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        usize::try_from(self.raw.bind_parameter_count()).unwrap_or(0)
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Columns past `c_int::MAX` map to an index the engine reads as NULL.
fn column_index(column: usize) -> c_int {
    c_int::try_from(column).unwrap_or(c_int::MAX)
}

fn fail_fast(statement_id: u64, code: c_int, message: &str) -> ! {
    error!(
        target: "sql",
        statement_id,
        code,
        message,
        "critical SQL statement failed, aborting"
    );
    std::process::abort()
}
