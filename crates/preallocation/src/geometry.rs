//! Volume allocation geometry and the allocation size rounding.

use std::num::NonZeroU64;

/// How the storage of a volume is quantized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeGeometry {
    /// The size of a sector in bytes.
    pub bytes_per_sector: u32,
    /// The amount of sectors in an allocation unit (cluster).
    pub sectors_per_allocation_unit: u32,
    /// The total amount of allocation units on the volume.
    pub total_allocation_units: u64,
    /// The amount of allocation units available to the caller.
    pub available_allocation_units: u64,
}

impl VolumeGeometry {
    /// The size of the allocation unit in bytes.
    ///
    /// Returns `None` if the volume reported a zero sector size or a zero
    /// amount of sectors per allocation unit.
    pub fn allocation_unit_size(&self) -> Option<NonZeroU64> {
        NonZeroU64::new(
            u64::from(self.bytes_per_sector) * u64::from(self.sectors_per_allocation_unit),
        )
    }
}

/// Round the `size` up to the closest multiple of the `allocation_unit`.
///
/// Returns `None` if the result does not fit in a `u64`.
pub fn rounded_allocation_size(size: u64, allocation_unit: NonZeroU64) -> Option<u64> {
    let unit = allocation_unit.get();
    let units = match size.checked_sub(1) {
        Some(last_byte) => last_byte / unit + 1,
        None => return Some(0),
    };
    units.checked_mul(unit)
}
