//! The preallocation error.

use std::io;

/// An error that occured while preallocating the disk space.
///
/// Each variant carries the name of the native operation that failed along
/// with the underlying OS error.
/// None of these are fatal: the caller can always continue without
/// preallocation and let the file grow on demand.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The volume allocation geometry could not be determined.
    #[error("{op}: unable to query the volume allocation geometry")]
    QueryFailed {
        /// The failed operation.
        op: &'static str,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The geometry was known, but the reservation call itself failed.
    #[error("{op}: unable to reserve the disk space")]
    SetFailed {
        /// The failed operation.
        op: &'static str,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The filesystem (or the kernel) does not support preallocation.
    #[error("{op}: disk space preallocation is not supported here")]
    Unsupported {
        /// The failed operation.
        op: &'static str,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// The name of the native operation that failed.
    pub fn op(&self) -> &'static str {
        match self {
            Self::QueryFailed { op, .. }
            | Self::SetFailed { op, .. }
            | Self::Unsupported { op, .. } => *op,
        }
    }

    /// The underlying OS error.
    pub fn io_error(&self) -> &io::Error {
        match self {
            Self::QueryFailed { source, .. }
            | Self::SetFailed { source, .. }
            | Self::Unsupported { source, .. } => source,
        }
    }

    /// Whether the caller is expected to just carry on without preallocation.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// The raw OS error code, if the failure came from the OS.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.io_error().raw_os_error()
    }

    /// Whether the reservation failed due to the lack of the disk space.
    pub fn is_disk_full(&self) -> bool {
        matches!(self, Self::SetFailed { .. })
            && self.raw_os_error().map_or(false, is_disk_full_code)
    }
}

#[cfg(unix)]
fn is_disk_full_code(code: i32) -> bool {
    code == nix::libc::ENOSPC
}

#[cfg(windows)]
fn is_disk_full_code(code: i32) -> bool {
    use winapi::shared::winerror::{ERROR_DISK_FULL, ERROR_HANDLE_DISK_FULL};

    code == ERROR_DISK_FULL as i32 || code == ERROR_HANDLE_DISK_FULL as i32
}

#[cfg(not(any(unix, windows)))]
fn is_disk_full_code(_code: i32) -> bool {
    false
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Unsupported { .. } => io::ErrorKind::Unsupported,
            other => other.io_error().kind(),
        };
        io::Error::new(kind, err)
    }
}
