//! Raw FFI layer over the `SQLite` C API.
//!
//! The symbols come from `libsqlite3-sys` (bundled amalgamation). This is the
//! **only** module in the crate that contains `unsafe` code or C types; every
//! other module talks to the engine through [`RawDb`] and [`RawStmt`], whose
//! methods are safe and return raw result codes.
//!
//! Pointer ownership: a [`RawDb`] owns its `sqlite3*` and closes it on drop.
//! A [`RawStmt`] owns its `sqlite3_stmt*`, finalizes it on drop, and borrows
//! the [`RawDb`] it was prepared on, so the borrow checker guarantees the
//! connection outlives the statement.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_uchar, c_uint};
use std::ptr::{self, NonNull};

use libsqlite3_sys as sys;

// ── SQLite constants ────────────────────────────────────────────────────

pub const SQLITE_OK: c_int = 0;
pub const SQLITE_CANTOPEN: c_int = 14;
pub const SQLITE_MISUSE: c_int = 21;
pub const SQLITE_RANGE: c_int = 25;
const SQLITE_TOOBIG: c_int = 18;
pub const SQLITE_ROW: c_int = 100;
pub const SQLITE_DONE: c_int = 101;

// Column type constants
pub const SQLITE_INTEGER: c_int = 1;
pub const SQLITE_NULL: c_int = 5;

// Open flags
pub const SQLITE_OPEN_READONLY: c_int = 0x0000_0001;
pub const SQLITE_OPEN_READWRITE: c_int = 0x0000_0002;
pub const SQLITE_OPEN_CREATE: c_int = 0x0000_0004;
pub const SQLITE_OPEN_URI: c_int = 0x0000_0040;
pub const SQLITE_OPEN_MEMORY: c_int = 0x0000_0080;
pub const SQLITE_OPEN_NOMUTEX: c_int = 0x0000_8000;
pub const SQLITE_OPEN_FULLMUTEX: c_int = 0x0001_0000;
pub const SQLITE_OPEN_NOFOLLOW: c_int = 0x0100_0000;

// Prepare flags
const SQLITE_PREPARE_PERSISTENT: c_uint = 0x01;

// Text encoding for `sqlite3_bind_text64`
const SQLITE_UTF8: c_uchar = 1;

/// Result code plus message captured at the point of failure.
#[derive(Debug)]
pub struct RawError {
    pub code: c_int,
    pub message: String,
}

/// Returns the engine's static English description of `code`.
pub fn errstr(code: c_int) -> String {
    // SAFETY: sqlite3_errstr accepts any integer and returns a pointer to a
    // static, NUL-terminated string (or null on very old builds).
    let ptr = unsafe { sys::sqlite3_errstr(code) };
    if ptr.is_null() {
        return format!("result code {code}");
    }
    // SAFETY: non-null pointers from sqlite3_errstr are static C strings.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

// ── Connection handle ───────────────────────────────────────────────────

/// Owned `sqlite3*` handle. Closed exactly once, on drop.
pub struct RawDb {
    ptr: NonNull<sys::sqlite3>,
}

// SAFETY: the bundled engine is compiled thread-safe. A RawDb may move
// between threads; the wrapper is not `Sync`, so callers serialize access.
unsafe impl Send for RawDb {}

impl RawDb {
    /// Opens `filename` with `sqlite3_open_v2`.
    ///
    /// If the engine hands back a handle together with an error code, the
    /// message is read from it before the handle is closed.
    pub fn open(filename: &CStr, flags: c_int) -> Result<Self, RawError> {
        let mut db: *mut sys::sqlite3 = ptr::null_mut();
        // SAFETY: filename is NUL-terminated and db is a valid out-pointer.
        let rc = unsafe {
            sys::sqlite3_open_v2(filename.as_ptr(), &mut db, flags, ptr::null())
        };
        let Some(handle) = NonNull::new(db) else {
            return Err(RawError {
                code: rc,
                message: errstr(rc),
            });
        };
        let raw = Self { ptr: handle };
        if rc != SQLITE_OK {
            // `raw` is dropped here, closing the partially opened handle.
            return Err(RawError {
                code: rc,
                message: raw.errmsg(),
            });
        }
        Ok(raw)
    }

    /// Turns on extended result codes for this connection.
    pub fn enable_extended_result_codes(&self) -> c_int {
        // SAFETY: self.ptr is a live connection handle.
        unsafe { sys::sqlite3_extended_result_codes(self.ptr.as_ptr(), 1) }
    }

    /// Installs the engine's built-in busy handler.
    pub fn busy_timeout(&self, ms: c_int) -> c_int {
        // SAFETY: self.ptr is a live connection handle.
        unsafe { sys::sqlite3_busy_timeout(self.ptr.as_ptr(), ms) }
    }

    /// Runs zero or more semicolon-separated statements via `sqlite3_exec`.
    pub fn exec(&self, sql: &CStr) -> Result<(), RawError> {
        let mut errmsg: *mut c_char = ptr::null_mut();
        // SAFETY: sql is NUL-terminated, no callback is installed and errmsg
        // is a valid out-pointer.
        let rc = unsafe {
            sys::sqlite3_exec(
                self.ptr.as_ptr(),
                sql.as_ptr(),
                None,
                ptr::null_mut(),
                &mut errmsg,
            )
        };
        if rc == SQLITE_OK {
            return Ok(());
        }
        let message = if errmsg.is_null() {
            self.errmsg()
        } else {
            // SAFETY: errmsg was allocated by sqlite3_malloc and is a C string;
            // it is copied out and then released with sqlite3_free.
            unsafe {
                let s = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                sys::sqlite3_free(errmsg.cast());
                s
            }
        };
        Err(RawError { code: rc, message })
    }

    /// Compiles `sql` with `sqlite3_prepare_v3`.
    ///
    /// The byte count passed to the engine includes the terminating NUL.
    /// Returns `Ok(None)` when the text holds no statement (only whitespace
    /// or comments).
    pub fn prepare(
        &self,
        sql: &CStr,
        persistent: bool,
    ) -> Result<Option<RawStmt<'_>>, RawError> {
        let bytes = sql.to_bytes_with_nul();
        debug_assert_eq!(bytes.last(), Some(&0));
        let n_byte = c_int::try_from(bytes.len()).map_err(|_| RawError {
            code: SQLITE_TOOBIG,
            message: "SQL text is too long".to_string(),
        })?;
        let prep_flags = if persistent { SQLITE_PREPARE_PERSISTENT } else { 0 };

        let mut stmt: *mut sys::sqlite3_stmt = ptr::null_mut();
        // SAFETY: sql points at n_byte bytes ending in NUL; stmt is a valid
        // out-pointer and no tail pointer is requested.
        let rc = unsafe {
            sys::sqlite3_prepare_v3(
                self.ptr.as_ptr(),
                sql.as_ptr(),
                n_byte,
                prep_flags,
                &mut stmt,
                ptr::null_mut(),
            )
        };
        if rc != SQLITE_OK {
            return Err(RawError {
                code: rc,
                message: self.errmsg(),
            });
        }
        Ok(NonNull::new(stmt).map(|ptr| RawStmt { ptr, db: self }))
    }

    /// Rowid of the most recent successful INSERT on this connection.
    pub fn last_insert_rowid(&self) -> i64 {
        // SAFETY: self.ptr is a live connection handle.
        unsafe { sys::sqlite3_last_insert_rowid(self.ptr.as_ptr()) }
    }

    /// Rows modified by the most recently completed statement.
    pub fn changes(&self) -> c_int {
        // SAFETY: self.ptr is a live connection handle.
        unsafe { sys::sqlite3_changes(self.ptr.as_ptr()) }
    }

    /// Latest error message recorded on this connection.
    pub fn errmsg(&self) -> String {
        // SAFETY: self.ptr is a live connection handle; the returned string is
        // owned by the engine and copied before any further call.
        unsafe {
            let msg = sys::sqlite3_errmsg(self.ptr.as_ptr());
            if msg.is_null() {
                "unknown error".to_string()
            } else {
                CStr::from_ptr(msg).to_string_lossy().into_owned()
            }
        }
    }
}

impl Drop for RawDb {
    fn drop(&mut self) {
        // SAFETY: the handle is owned by this value and closed exactly once.
        // close_v2 defers the close if statements are still unfinalized.
        unsafe {
            sys::sqlite3_close_v2(self.ptr.as_ptr());
        }
    }
}

// ── Statement handle ────────────────────────────────────────────────────

/// Owned `sqlite3_stmt*` handle borrowing its connection.
pub struct RawStmt<'db> {
    ptr: NonNull<sys::sqlite3_stmt>,
    db: &'db RawDb,
}

impl RawStmt<'_> {
    pub fn step(&self) -> c_int {
        // SAFETY: self.ptr is a live statement handle.
        unsafe { sys::sqlite3_step(self.ptr.as_ptr()) }
    }

    pub fn reset(&self) -> c_int {
        // SAFETY: self.ptr is a live statement handle.
        unsafe { sys::sqlite3_reset(self.ptr.as_ptr()) }
    }

    pub fn bind_null(&self, index: c_int) -> c_int {
        // SAFETY: self.ptr is a live statement handle; bad indexes are
        // reported by the engine as SQLITE_RANGE.
        unsafe { sys::sqlite3_bind_null(self.ptr.as_ptr(), index) }
    }

    pub fn bind_int(&self, index: c_int, value: c_int) -> c_int {
        // SAFETY: see bind_null.
        unsafe { sys::sqlite3_bind_int(self.ptr.as_ptr(), index, value) }
    }

    pub fn bind_int64(&self, index: c_int, value: i64) -> c_int {
        // SAFETY: see bind_null.
        unsafe { sys::sqlite3_bind_int64(self.ptr.as_ptr(), index, value) }
    }

    /// Binds UTF-8 text. The engine takes its own copy (`SQLITE_TRANSIENT`),
    /// so `value` only has to live for the duration of the call.
    pub fn bind_text(&self, index: c_int, value: &str) -> c_int {
        // SAFETY: value points at value.len() initialized bytes; the
        // transient destructor makes the engine copy them before returning.
        unsafe {
            sys::sqlite3_bind_text64(
                self.ptr.as_ptr(),
                index,
                value.as_ptr().cast::<c_char>(),
                value.len() as u64,
                sys::SQLITE_TRANSIENT(),
                SQLITE_UTF8,
            )
        }
    }

    pub fn column_type(&self, column: c_int) -> c_int {
        // SAFETY: self.ptr is a live statement handle; out-of-range columns
        // are reported as NULL by the engine.
        unsafe { sys::sqlite3_column_type(self.ptr.as_ptr(), column) }
    }

    pub fn column_int(&self, column: c_int) -> c_int {
        // SAFETY: see column_type.
        unsafe { sys::sqlite3_column_int(self.ptr.as_ptr(), column) }
    }

    pub fn column_int64(&self, column: c_int) -> i64 {
        // SAFETY: see column_type.
        unsafe { sys::sqlite3_column_int64(self.ptr.as_ptr(), column) }
    }

    /// Reads a column as text. Returns an empty string for NULL.
    pub fn column_text(&self, column: c_int) -> String {
        // SAFETY: column_text is called before column_bytes, as the engine
        // requires, and the bytes are copied before the next engine call.
        unsafe {
            let text = sys::sqlite3_column_text(self.ptr.as_ptr(), column);
            let len = sys::sqlite3_column_bytes(self.ptr.as_ptr(), column);
            let len = usize::try_from(len).unwrap_or(0);
            if text.is_null() || len == 0 {
                return String::new();
            }
            let bytes = std::slice::from_raw_parts(text, len);
            String::from_utf8_lossy(bytes).into_owned()
        }
    }

    pub fn column_count(&self) -> c_int {
        // SAFETY: self.ptr is a live statement handle.
        unsafe { sys::sqlite3_column_count(self.ptr.as_ptr()) }
    }

    pub fn bind_parameter_count(&self) -> c_int {
        // SAFETY: self.ptr is a live statement handle.
        unsafe { sys::sqlite3_bind_parameter_count(self.ptr.as_ptr()) }
    }

    /// Latest error message on the owning connection.
    pub fn errmsg(&self) -> String {
        self.db.errmsg()
    }
}

impl Drop for RawStmt<'_> {
    fn drop(&mut self) {
        // SAFETY: the handle is owned by this value and finalized exactly
        // once; the borrowed RawDb is still open.
        unsafe {
            sys::sqlite3_finalize(self.ptr.as_ptr());
        }
    }
}
