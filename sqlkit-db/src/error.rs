//! Database error types for the safe `SQLite` wrapper.

use std::fmt;
use std::os::raw::c_int;

use thiserror::Error;

use super::ffi::{self, RawError};

/// Extended result code returned by `SQLite` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DbErrorCode(pub i32);

impl DbErrorCode {
    /// Primary result code (the low byte of the extended code).
    #[must_use]
    pub const fn primary(self) -> i32 {
        self.0 & 0xff
    }

    /// The engine's static English description of this code.
    #[must_use]
    pub fn description(self) -> String {
        ffi::errstr(self.0)
    }
}

impl fmt::Display for DbErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned by database operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DbError {
    /// The database could not be opened or configured.
    #[error("failed to open {target:?}: sqlite error {code}: {message}")]
    Open {
        /// Path or URI that was being opened.
        target: String,
        /// `SQLite` result code.
        code: DbErrorCode,
        /// Human-readable error message.
        message: String,
    },

    /// SQL text failed to compile.
    #[error("failed to prepare statement: sqlite error {code}: {message}")]
    Compile {
        /// `SQLite` result code.
        code: DbErrorCode,
        /// Human-readable error message.
        message: String,
    },

    /// A parameter could not be bound.
    #[error("failed to bind parameter {index}: sqlite error {code}: {message}")]
    Bind {
        /// 1-based parameter index.
        index: usize,
        /// `SQLite` result code.
        code: DbErrorCode,
        /// Human-readable error message.
        message: String,
    },

    /// Stepping a statement returned neither a row nor completion.
    #[error("statement step failed: sqlite error {code}: {message}")]
    Step {
        /// `SQLite` result code.
        code: DbErrorCode,
        /// Human-readable error message.
        message: String,
    },

    /// A batch passed to `execute_batch` failed.
    #[error("batch execution failed: sqlite error {code}: {message}")]
    Exec {
        /// `SQLite` result code.
        code: DbErrorCode,
        /// Human-readable error message.
        message: String,
    },

    /// A statement expected to produce no rows returned one.
    #[error("statement #{statement_id} unexpectedly returned a row")]
    UnexpectedRow {
        /// Diagnostic identifier of the offending statement.
        statement_id: u64,
    },

    /// A single-row query returned no rows.
    #[error("query returned no rows")]
    NoRows,
}

impl DbError {
    /// Returns the `SQLite` result code for engine-originated errors.
    #[must_use]
    pub const fn code(&self) -> Option<DbErrorCode> {
        match self {
            Self::Open { code, .. }
            | Self::Compile { code, .. }
            | Self::Bind { code, .. }
            | Self::Step { code, .. }
            | Self::Exec { code, .. } => Some(*code),
            Self::UnexpectedRow { .. } | Self::NoRows => None,
        }
    }

    pub(crate) fn open(target: &str, raw: RawError) -> Self {
        Self::Open {
            target: target.to_string(),
            code: DbErrorCode(raw.code),
            message: raw.message,
        }
    }

    pub(crate) fn compile(raw: RawError) -> Self {
        Self::Compile {
            code: DbErrorCode(raw.code),
            message: raw.message,
        }
    }

    pub(crate) fn exec(raw: RawError) -> Self {
        Self::Exec {
            code: DbErrorCode(raw.code),
            message: raw.message,
        }
    }

    pub(crate) fn step(code: c_int, message: String) -> Self {
        Self::Step {
            code: DbErrorCode(code),
            message,
        }
    }

    pub(crate) fn bind(index: usize, code: c_int, message: String) -> Self {
        Self::Bind {
            index,
            code: DbErrorCode(code),
            message,
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
