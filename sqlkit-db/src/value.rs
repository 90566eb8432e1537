//! Parameter binding and column extraction.
//!
//! The set of bindable and readable types is closed: [`Bind`] and
//! [`FromColumn`] are sealed and implemented only for the types below.
//!
//! | Type            | Bind                     | Read                        |
//! |-----------------|--------------------------|-----------------------------|
//! | [`Null`]        | `sqlite3_bind_null`      | -                           |
//! | `String`        | text, copied by engine   | `sqlite3_column_text`       |
//! | `&str`          | text, copied by engine   | -                           |
//! | `i32`           | `sqlite3_bind_int`       | `sqlite3_column_int`        |
//! | `i64`           | `sqlite3_bind_int64`     | `sqlite3_column_int64`      |
//! | `Option<T>`     | `None` binds NULL        | NULL reads as `None`        |
//! | [`Value`]       | by variant               | by column storage class     |

use std::os::raw::c_int;

use super::ffi::{self, RawStmt};

mod private {
    use std::os::raw::c_int;

    use crate::ffi::RawStmt;

    pub trait BindRaw {
        fn bind_raw(&self, stmt: &RawStmt<'_>, index: c_int) -> c_int;
    }

    pub trait ReadRaw: Sized {
        fn read_raw(stmt: &RawStmt<'_>, column: c_int) -> Self;
    }
}

use private::{BindRaw, ReadRaw};

/// A value that can be bound to a statement parameter slot.
pub trait Bind: BindRaw {}

/// A value that can be extracted from a result column.
pub trait FromColumn: ReadRaw {}

/// SQL NULL as a bindable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Null;

/// Binds `value` at the 1-based `index`, returning the engine result code.
pub(crate) fn bind_value<T: Bind>(stmt: &RawStmt<'_>, index: c_int, value: &T) -> c_int {
    value.bind_raw(stmt, index)
}

/// Reads the 0-based `column` of the current row.
pub(crate) fn read_column<T: FromColumn>(stmt: &RawStmt<'_>, column: c_int) -> T {
    T::read_raw(stmt, column)
}

impl private::BindRaw for Null {
    fn bind_raw(&self, stmt: &RawStmt<'_>, index: c_int) -> c_int {
        stmt.bind_null(index)
    }
}
impl Bind for Null {}

impl private::BindRaw for String {
    fn bind_raw(&self, stmt: &RawStmt<'_>, index: c_int) -> c_int {
        stmt.bind_text(index, self)
    }
}
impl Bind for String {}

impl private::BindRaw for &str {
    fn bind_raw(&self, stmt: &RawStmt<'_>, index: c_int) -> c_int {
        stmt.bind_text(index, self)
    }
}
impl Bind for &str {}

impl private::BindRaw for i32 {
    fn bind_raw(&self, stmt: &RawStmt<'_>, index: c_int) -> c_int {
        stmt.bind_int(index, *self)
    }
}
impl Bind for i32 {}

impl private::BindRaw for i64 {
    fn bind_raw(&self, stmt: &RawStmt<'_>, index: c_int) -> c_int {
        stmt.bind_int64(index, *self)
    }
}
impl Bind for i64 {}

impl<T: Bind> private::BindRaw for Option<T> {
    fn bind_raw(&self, stmt: &RawStmt<'_>, index: c_int) -> c_int {
        match self {
            Some(v) => v.bind_raw(stmt, index),
            None => stmt.bind_null(index),
        }
    }
}
impl<T: Bind> Bind for Option<T> {}

/// Text columns holding NULL read as an empty string.
impl private::ReadRaw for String {
    fn read_raw(stmt: &RawStmt<'_>, column: c_int) -> Self {
        stmt.column_text(column)
    }
}
impl FromColumn for String {}

impl private::ReadRaw for i32 {
    fn read_raw(stmt: &RawStmt<'_>, column: c_int) -> Self {
        stmt.column_int(column)
    }
}
impl FromColumn for i32 {}

impl private::ReadRaw for i64 {
    fn read_raw(stmt: &RawStmt<'_>, column: c_int) -> Self {
        stmt.column_int64(column)
    }
}
impl FromColumn for i64 {}

impl<T: FromColumn> private::ReadRaw for Option<T> {
    fn read_raw(stmt: &RawStmt<'_>, column: c_int) -> Self {
        if stmt.column_type(column) == ffi::SQLITE_NULL {
            None
        } else {
            Some(T::read_raw(stmt, column))
        }
    }
}
impl<T: FromColumn> FromColumn for Option<T> {}

/// A value that can be bound to a prepared statement parameter or read from
/// a result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// 64-bit signed integer.
    Integer(i64),
    /// UTF-8 text.
    Text(String),
    /// SQL NULL.
    Null,
}

impl private::BindRaw for Value {
    fn bind_raw(&self, stmt: &RawStmt<'_>, index: c_int) -> c_int {
        match self {
            Self::Integer(v) => stmt.bind_int64(index, *v),
            Self::Text(v) => stmt.bind_text(index, v),
            Self::Null => stmt.bind_null(index),
        }
    }
}
impl Bind for Value {}

/// Integer columns read as [`Value::Integer`], NULL as [`Value::Null`], and
/// every other storage class as its text rendering.
impl private::ReadRaw for Value {
    fn read_raw(stmt: &RawStmt<'_>, column: c_int) -> Self {
        match stmt.column_type(column) {
            ffi::SQLITE_NULL => Self::Null,
            ffi::SQLITE_INTEGER => Self::Integer(stmt.column_int64(column)),
            _ => Self::Text(stmt.column_text(column)),
        }
    }
}
impl FromColumn for Value {}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Null> for Value {
    fn from(_: Null) -> Self {
        Self::Null
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Convenience macro for building parameter lists.
///
/// Usage: `params![1_i64, "text", Null]`
#[macro_export]
macro_rules! params {
    ($($val:expr),* $(,)?) => {
        &[$($crate::Value::from($val)),*][..]
    };
}
