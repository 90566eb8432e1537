//! Named, nestable transaction scopes built on `SAVEPOINT`.

use tracing::info;

use super::connection::Connection;
use super::error::DbResult;
use super::statement::{OnError, Statement};

/// An open savepoint.
///
/// Rolls back on drop unless explicitly committed. Resolution (commit or
/// rollback) happens at most once; later calls are no-ops. A failure while
/// resolving aborts the process, since the transaction boundary can no longer
/// be trusted.
///
/// Only the `ROLLBACK TO` and `RELEASE` statements are kept; the `SAVEPOINT`
/// statement runs once in [`begin`](Self::begin) and is finalized there.
pub struct Savepoint<'conn> {
    conn: &'conn Connection,
    name: String,
    in_progress: bool,
    rollback: Statement<'conn>,
    release: Statement<'conn>,
}

impl<'conn> Savepoint<'conn> {
    /// Begins the savepoint `name` on `conn`.
    ///
    /// The resolution statements are compiled up front, and the `SAVEPOINT`
    /// statement has run by the time this returns.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Compile`](crate::DbError::Compile) or
    /// [`DbError::Step`](crate::DbError::Step) if the savepoint cannot be
    /// established.
    pub fn begin(conn: &'conn Connection, name: impl Into<String>) -> DbResult<Self> {
        let name = name.into();
        let ident = quote_identifier(&name);

        let mut begin = Statement::new(conn, format!("SAVEPOINT {ident}"))?;
        let rollback = Statement::new_persistent(conn, format!("ROLLBACK TO {ident}"))?;
        let release = Statement::new_persistent(conn, format!("RELEASE {ident}"))?;

        info!(target: "sql", savepoint = %name, "begin savepoint");
        begin.execute()?;

        Ok(Self {
            conn,
            name,
            in_progress: true,
            rollback,
            release,
        })
    }

    /// Begins a savepoint nested inside this one.
    ///
    /// The child borrows `self` mutably, so this savepoint cannot be
    /// resolved while the child is open.
    ///
    /// # Errors
    ///
    /// See [`Savepoint::begin`].
    pub fn savepoint(&mut self, name: impl Into<String>) -> DbResult<Savepoint<'_>> {
        Savepoint::begin(self.conn, name)
    }

    /// The savepoint's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` until the savepoint is committed or rolled back.
    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    /// The connection this savepoint was opened on.
    #[must_use]
    pub const fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Releases the savepoint, keeping its work.
    ///
    /// No-op if already resolved.
    ///
    /// # Aborts
    ///
    /// Aborts the process if the release fails. Committing while a later
    /// savepoint begun via [`Connection::savepoint`] is still live releases
    /// that one too, and its own resolution (or drop) then aborts.
    pub fn commit(&mut self) {
        if !self.in_progress {
            return;
        }
        info!(target: "sql", savepoint = %self.name, "commit savepoint");
        resolve(&mut self.release);
        self.in_progress = false;
    }

    /// Undoes all work since the savepoint began and removes it.
    ///
    /// No-op if already resolved.
    pub fn rollback(&mut self) {
        if !self.in_progress {
            return;
        }
        info!(target: "sql", savepoint = %self.name, "roll back savepoint");
        resolve(&mut self.rollback);
        // ROLLBACK TO leaves the savepoint on the stack (and an outermost
        // savepoint's transaction open) until it is released.
        resolve(&mut self.release);
        self.in_progress = false;
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        self.rollback();
    }
}

impl std::fmt::Debug for Savepoint<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Savepoint")
            .field("name", &self.name)
            .field("in_progress", &self.in_progress)
            .finish_non_exhaustive()
    }
}

/// Steps a resolution statement. Engine failures abort inside
/// `execute_with`; `ROLLBACK TO` and `RELEASE` never produce rows.
fn resolve(stmt: &mut Statement<'_>) {
    let _ = stmt.execute_with(OnError::Abort);
}

/// Quotes `name` as an SQL identifier, doubling embedded quotes.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
