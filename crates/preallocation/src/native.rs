//! The cluster-aligned reservation protocol of the NT native API.
//!
//! The protocol itself does not depend on the OS, so it is kept here behind
//! the [`VolumeInformation`] trait and only the actual calls live in the
//! Windows-specific module.

#![cfg_attr(not(windows), allow(dead_code))]

use crate::{geometry::rounded_allocation_size, Error, VolumeGeometry};
use std::{io, mem, num::NonZeroU64};

/// The name of the geometry query operation.
pub(crate) const QUERY_VOLUME_OP: &str = "NtQueryVolumeInformationFile";
/// The name of the current allocation query operation.
pub(crate) const QUERY_FILE_OP: &str = "NtQueryInformationFile";
/// The name of the reservation operation.
pub(crate) const SET_FILE_OP: &str = "NtSetInformationFile";

/// `FS_INFORMATION_CLASS::FileFsSizeInformation`.
pub(crate) const FILE_FS_SIZE_INFORMATION_CLASS: u32 = 3;
/// `FILE_INFORMATION_CLASS::FileStandardInformation`.
pub(crate) const FILE_STANDARD_INFORMATION_CLASS: u32 = 5;
/// `FILE_INFORMATION_CLASS::FileAllocationInformation`.
pub(crate) const FILE_ALLOCATION_INFORMATION_CLASS: u32 = 19;

/// `IO_STATUS_BLOCK`.
///
/// Filled in by every call; nothing here reads it, as the calls complete
/// synchronously for regular disk files and report failures via the
/// returned status.
#[repr(C)]
#[derive(Debug, Default)]
#[allow(dead_code)]
pub(crate) struct IoStatusBlock {
    pub status: usize,
    pub information: usize,
}

/// `FILE_FS_SIZE_INFORMATION`.
#[repr(C)]
#[derive(Debug, Default)]
pub(crate) struct FileFsSizeInformation {
    pub total_allocation_units: i64,
    pub available_allocation_units: i64,
    pub sectors_per_allocation_unit: u32,
    pub bytes_per_sector: u32,
}

/// `FILE_STANDARD_INFORMATION`.
#[repr(C)]
#[derive(Debug, Default)]
#[allow(dead_code)]
pub(crate) struct FileStandardInformation {
    pub allocation_size: i64,
    pub end_of_file: i64,
    pub number_of_links: u32,
    pub delete_pending: u8,
    pub directory: u8,
}

/// `FILE_ALLOCATION_INFORMATION`.
#[repr(C)]
#[derive(Debug, Default)]
pub(crate) struct FileAllocationInformation {
    pub allocation_size: i64,
}

const _: () = assert!(mem::size_of::<IoStatusBlock>() == 2 * mem::size_of::<usize>());
const _: () = assert!(mem::size_of::<FileFsSizeInformation>() == 24);
const _: () = assert!(mem::size_of::<FileStandardInformation>() == 24);
const _: () = assert!(mem::size_of::<FileAllocationInformation>() == 8);

impl From<FileFsSizeInformation> for VolumeGeometry {
    fn from(info: FileFsSizeInformation) -> Self {
        Self {
            bytes_per_sector: info.bytes_per_sector,
            sectors_per_allocation_unit: info.sectors_per_allocation_unit,
            total_allocation_units: u64::try_from(info.total_allocation_units).unwrap_or(0),
            available_allocation_units: u64::try_from(info.available_allocation_units)
                .unwrap_or(0),
        }
    }
}

/// The native calls the reservation protocol is built from.
pub(crate) trait VolumeInformation {
    /// Query the size information of the volume the file resides on.
    fn query_size_information(&self) -> io::Result<VolumeGeometry>;

    /// Query the amount of the disk space currently allocated for the file.
    fn query_allocation_size(&self) -> io::Result<u64>;

    /// Set the allocation size of the file.
    fn set_allocation_size(&self, size: u64) -> io::Result<()>;
}

/// Reserve the disk space for at least `size` bytes, rounded up to whole
/// allocation units.
///
/// Never requests an allocation smaller than the current one, as that would
/// truncate the file.
pub(crate) fn reserve_clusters<V>(volume: &V, size: NonZeroU64) -> Result<(), Error>
where
    V: VolumeInformation + ?Sized,
{
    let geometry = volume
        .query_size_information()
        .map_err(|source| Error::QueryFailed {
            op: QUERY_VOLUME_OP,
            source,
        })?;

    let allocation_unit = geometry
        .allocation_unit_size()
        .ok_or_else(|| Error::QueryFailed {
            op: QUERY_VOLUME_OP,
            source: io::Error::new(
                io::ErrorKind::InvalidData,
                format!("volume reported a zero allocation unit: {geometry:?}"),
            ),
        })?;

    let rounded = rounded_allocation_size(size.get(), allocation_unit)
        .filter(|rounded| i64::try_from(*rounded).is_ok())
        .ok_or_else(|| Error::SetFailed {
            op: SET_FILE_OP,
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("allocation size for {size} bytes is out of range"),
            ),
        })?;

    let current = volume
        .query_allocation_size()
        .map_err(|source| Error::QueryFailed {
            op: QUERY_FILE_OP,
            source,
        })?;
    if current >= rounded {
        tracing::trace!(message = "already allocated", %current, %rounded);
        return Ok(());
    }

    tracing::trace!(
        message = "setting allocation size",
        requested = %size,
        %allocation_unit,
        %rounded,
    );
    volume
        .set_allocation_size(rounded)
        .map_err(|source| Error::SetFailed {
            op: SET_FILE_OP,
            source,
        })
}
