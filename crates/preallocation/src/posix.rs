//! Volume queries shared by all UNIX-es.

use crate::{Error, VolumeGeometry};
use nix::sys::statvfs::fstatvfs;
use std::{fs::File, io, os::unix::fs::MetadataExt};

const FSTATVFS_OP: &str = "fstatvfs";

/// The unit `st_blocks` is counted in, regardless of the filesystem block size.
const ST_BLOCKS_UNIT: u64 = 512;

/// Query the volume geometry via [`fstatvfs`].
///
/// POSIX has no notion of sectors, so the fragment size (the fundamental
/// allocation unit of the filesystem) is reported as a single-sector
/// allocation unit.
pub(crate) fn query_volume_geometry(file: &File) -> Result<VolumeGeometry, Error> {
    let stat = fstatvfs(file).map_err(|errno| Error::QueryFailed {
        op: FSTATVFS_OP,
        source: errno.into(),
    })?;

    let fragment_size = u32::try_from(stat.fragment_size()).map_err(|err| Error::QueryFailed {
        op: FSTATVFS_OP,
        source: io::Error::new(io::ErrorKind::InvalidData, err),
    })?;

    Ok(VolumeGeometry {
        bytes_per_sector: fragment_size,
        sectors_per_allocation_unit: 1,
        total_allocation_units: u64::from(stat.blocks()),
        available_allocation_units: u64::from(stat.blocks_available()),
    })
}

/// The on-disk allocation as reported by `st_blocks`.
pub(crate) fn allocated_size(file: &File) -> io::Result<u64> {
    Ok(file.metadata()?.blocks() * ST_BLOCKS_UNIT)
}
