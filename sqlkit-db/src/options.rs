//! Open disposition, open flags and connection configuration.

use std::ops::{BitOr, BitOrAssign};
use std::os::raw::c_int;

use serde::{Deserialize, Serialize};

use super::ffi;

/// Whether opening a target creates, requires, or exclusively creates the
/// underlying database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenDisposition {
    /// Open the database, creating it if it does not exist.
    #[default]
    CreateIfMissing,
    /// Open an existing database; fail if it does not exist.
    OpenExisting,
    /// Create a new database; fail if a file already exists at the target.
    CreateExclusive,
}

impl OpenDisposition {
    /// Engine flag bits contributed by this disposition.
    #[must_use]
    pub const fn bits(self) -> c_int {
        match self {
            Self::CreateIfMissing | Self::CreateExclusive => ffi::SQLITE_OPEN_CREATE,
            Self::OpenExisting => 0,
        }
    }
}

/// Bit flags passed to the engine's open call, combined with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpenFlags(c_int);

impl OpenFlags {
    /// No flags. Read-write access is implied at open time.
    pub const NONE: Self = Self(0);
    /// Open for reading only.
    pub const READ_ONLY: Self = Self(ffi::SQLITE_OPEN_READONLY);
    /// Open for reading and writing.
    pub const READ_WRITE: Self = Self(ffi::SQLITE_OPEN_READWRITE);
    /// The target names a purely in-memory database.
    pub const IN_MEMORY: Self = Self(ffi::SQLITE_OPEN_MEMORY);
    /// Interpret the target as a `file:` URI.
    pub const URI: Self = Self(ffi::SQLITE_OPEN_URI);
    /// Multi-thread mode: the connection must not be used by two threads at
    /// once, but no per-connection mutex is taken.
    pub const NO_MUTEX: Self = Self(ffi::SQLITE_OPEN_NOMUTEX);
    /// Serialized mode: the engine guards the connection with a mutex.
    pub const FULL_MUTEX: Self = Self(ffi::SQLITE_OPEN_FULLMUTEX);
    /// Refuse to open a target that is a symbolic link.
    pub const NO_FOLLOW: Self = Self(ffi::SQLITE_OPEN_NOFOLLOW);

    /// Raw bit pattern.
    #[must_use]
    pub const fn bits(self) -> c_int {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flags as handed to the engine: `READ_WRITE` is added when no access
    /// mode was requested.
    pub(crate) const fn with_access_mode(self) -> Self {
        if self.0 & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            Self(self.0 | ffi::SQLITE_OPEN_READWRITE)
        } else {
            self
        }
    }
}

impl BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Serializable description of how to open a connection.
///
/// ```json
/// { "disposition": "open_existing", "read_only": true, "busy_timeout_ms": 2500 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ConnectionConfig {
    /// Create / open policy.
    pub disposition: OpenDisposition,
    /// Open read-only instead of read-write.
    pub read_only: bool,
    /// Treat the target as an in-memory database.
    pub in_memory: bool,
    /// Interpret the target as a `file:` URI.
    pub uri: bool,
    /// Use multi-thread mode instead of the engine's default threading mode.
    pub multi_thread: bool,
    /// How long the engine retries on a locked database before failing.
    pub busy_timeout_ms: Option<u32>,
}

impl ConnectionConfig {
    /// Open flags described by this configuration.
    #[must_use]
    pub fn flags(&self) -> OpenFlags {
        let mut flags = if self.read_only {
            OpenFlags::READ_ONLY
        } else {
            OpenFlags::READ_WRITE
        };
        if self.in_memory {
            flags |= OpenFlags::IN_MEMORY;
        }
        if self.uri {
            flags |= OpenFlags::URI;
        }
        if self.multi_thread {
            flags |= OpenFlags::NO_MUTEX;
        }
        flags
    }
}
