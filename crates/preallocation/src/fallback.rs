//! The fallback implementation.

use crate::{Error, Strategy};
use std::{fs::File, num::NonZeroU64};

#[cfg(not(any(unix, windows)))]
use {crate::VolumeGeometry, std::io};

/// A no-op, for the targets with no native reservation primitive.
///
/// Preallocation is just a hint, so there is nothing to fail here.
/// Can also be passed to [`crate::preallocate_with`] explicitly to turn
/// preallocation off.
#[derive(Debug, Default, Clone, Copy)]
pub struct Noop;

impl Strategy for Noop {
    fn name(&self) -> &'static str {
        "noop"
    }

    #[inline]
    fn reserve(&self, _file: &File, size: NonZeroU64) -> Result<(), Error> {
        tracing::trace!(message = "skipping preallocation", %size);
        Ok(())
    }
}

/// No way to learn the geometry here.
#[cfg(not(any(unix, windows)))]
pub(crate) fn query_volume_geometry(_file: &File) -> Result<VolumeGeometry, Error> {
    Err(Error::Unsupported {
        op: "query_volume_geometry",
        source: io::Error::from(io::ErrorKind::Unsupported),
    })
}

/// The reported length is as close as we can get.
#[cfg(not(any(unix, windows)))]
pub(crate) fn allocated_size(file: &File) -> io::Result<u64> {
    Ok(file.metadata()?.len())
}
