//! macOS and iOS implementation.

#![allow(unsafe_code)]

use crate::{Error, Strategy};
use nix::libc;
use std::{fs::File, io, num::NonZeroU64, os::unix::io::AsRawFd};

const FSTAT_OP: &str = "fstat";
const F_PREALLOCATE_OP: &str = "fcntl(F_PREALLOCATE)";

/// Allocate the disk space by using `fcntl` with `F_PREALLOCATE`.
///
/// The space is reserved past the physical end of the file, so only the
/// part not yet allocated is requested.
#[derive(Debug, Default, Clone, Copy)]
pub struct FPreallocate;

impl Strategy for FPreallocate {
    fn name(&self) -> &'static str {
        F_PREALLOCATE_OP
    }

    fn reserve(&self, file: &File, size: NonZeroU64) -> Result<(), Error> {
        let allocated = crate::posix::allocated_size(file).map_err(|source| Error::QueryFailed {
            op: FSTAT_OP,
            source,
        })?;
        let Some(missing) = size.get().checked_sub(allocated).filter(|missing| *missing > 0) else {
            tracing::trace!(message = "already allocated", %allocated, %size);
            return Ok(());
        };
        let length = libc::off_t::try_from(missing).map_err(|err| Error::SetFailed {
            op: F_PREALLOCATE_OP,
            source: io::Error::new(io::ErrorKind::InvalidInput, err),
        })?;

        let mut store = libc::fstore_t {
            fst_flags: libc::F_ALLOCATECONTIG | libc::F_ALLOCATEALL,
            fst_posmode: libc::F_PEOFPOSMODE,
            fst_offset: 0,
            fst_length: length,
            fst_bytesalloc: 0,
        };
        if fcntl_preallocate(file, &mut store).is_ok() {
            return Ok(());
        }

        // Contiguity is only a preference, settle for fragments.
        store.fst_flags = libc::F_ALLOCATEALL;
        fcntl_preallocate(file, &mut store).map_err(classify)
    }
}

fn fcntl_preallocate(file: &File, store: &mut libc::fstore_t) -> io::Result<()> {
    // SAFETY: the descriptor is valid for the lifetime of `file`, and `store`
    // outlives the call.
    let rv = unsafe {
        libc::fcntl(
            file.as_raw_fd(),
            libc::F_PREALLOCATE,
            store as *mut libc::fstore_t,
        )
    };
    if rv == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Tell the lack of support from the actual failures.
fn classify(source: io::Error) -> Error {
    match source.raw_os_error() {
        Some(libc::ENOTSUP) | Some(libc::EOPNOTSUPP) => Error::Unsupported {
            op: F_PREALLOCATE_OP,
            source,
        },
        _ => Error::SetFailed {
            op: F_PREALLOCATE_OP,
            source,
        },
    }
}
