//! Linux-specific implementation.
//! Other UNIX-es either have their own implementation or use the fallback.

use crate::{Error, Strategy};
use nix::{
    errno::Errno,
    fcntl::{fallocate, FallocateFlags},
    libc::off_t,
};
use std::{fs::File, io, num::NonZeroU64, os::unix::io::AsRawFd};

const FALLOCATE_OP: &str = "fallocate";

/// Allocate the disk space by using [`fallocate`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Fallocate;

impl Strategy for Fallocate {
    fn name(&self) -> &'static str {
        FALLOCATE_OP
    }

    fn reserve(&self, file: &File, size: NonZeroU64) -> Result<(), Error> {
        let len = off_t::try_from(size.get()).map_err(|err| Error::SetFailed {
            op: FALLOCATE_OP,
            source: io::Error::new(io::ErrorKind::InvalidInput, err),
        })?;
        fallocate(
            file.as_raw_fd(),
            // We need an actual allocation (not a hole), but neither the file
            // length nor the existing content are to be touched.
            FallocateFlags::FALLOC_FL_KEEP_SIZE,
            0,
            len,
        )
        .map_err(classify)
    }
}

/// Tell the lack of support from the actual failures.
fn classify(errno: Errno) -> Error {
    match errno {
        Errno::EOPNOTSUPP | Errno::ENOSYS => Error::Unsupported {
            op: FALLOCATE_OP,
            source: errno.into(),
        },
        _ => Error::SetFailed {
            op: FALLOCATE_OP,
            source: errno.into(),
        },
    }
}
