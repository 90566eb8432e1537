//! Minimal safe `SQLite` wrapper.
//!
//! This crate provides a small, safe Rust API over the `SQLite` C FFI:
//!
//! * [`Connection`] owns one native database handle, opened with an
//!   [`OpenDisposition`] and [`OpenFlags`] (or a [`ConnectionConfig`]).
//! * [`Statement`] owns one prepared statement borrowed from a connection and
//!   tracks its [`StatementState`]. Parameters are bound and columns read
//!   through the closed [`Bind`] / [`FromColumn`] type set.
//! * [`Savepoint`] is a named, nestable transaction scope that rolls back on
//!   drop unless committed.
//!
//! The raw symbols come from `libsqlite3-sys` with the bundled amalgamation.
//! Consumer code uses only the safe types defined here and never touches raw
//! FFI directly. The `ffi` module is the **only** file that contains `unsafe`
//! code or C types.
//!
//! All operations are synchronous. A connection and its statements must be
//! used from one thread at a time; statement ids are the only process-wide
//! state.
//!
//! Events are emitted through `tracing` under the `sql` target.

mod ffi;

mod connection;
pub mod error;
mod options;
mod savepoint;
mod statement;
pub mod value;

pub use connection::Connection;
pub use error::{DbError, DbErrorCode, DbResult};
pub use options::{ConnectionConfig, OpenDisposition, OpenFlags};
pub use savepoint::Savepoint;
pub use statement::{IntoSql, OnError, Statement, StatementState};
pub use value::{Bind, FromColumn, Null, Value};
