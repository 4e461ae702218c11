//! The disk space preallocation facilities.
//!
//! Preallocation asks the filesystem to reserve on-disk extents for a file
//! ahead of writing into it, without changing the file's reported length.
//! Sequential writes into a preallocated file then have a higher chance to
//! land in a single linear blob instead of a set of fragmented stripes.
//!
//! Preallocation is a performance hint: it is a no-op on targets without a
//! native reservation primitive, and every failure is surfaced to the caller
//! as an [`Error`] it may choose to ignore and fall back to ordinary writes.
//!
//! All the calls here are synchronous and may block on filesystem metadata
//! I/O. Async callers should run them in a blocking-capable context.

use std::{fs::File, io, num::NonZeroU64};

mod error;
mod fallback;
mod geometry;
mod native;

pub use error::Error;
pub use fallback::Noop;
pub use geometry::{rounded_allocation_size, VolumeGeometry};

#[cfg(unix)]
mod posix;

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        mod unix;
        pub use self::unix::Fallocate as Platform;
    } else if #[cfg(any(target_os = "macos", target_os = "ios"))] {
        mod apple;
        pub use self::apple::FPreallocate as Platform;
    } else if #[cfg(windows)] {
        mod windows;
        pub use self::windows::NtAllocation as Platform;
    } else {
        pub use self::fallback::Noop as Platform;
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        use self::posix as volume;
    } else if #[cfg(windows)] {
        use self::windows as volume;
    } else {
        use self::fallback as volume;
    }
}

/// A platform-specific way of reserving the disk space for a file.
///
/// There is one implementation per target family, exported as [`Platform`].
pub trait Strategy {
    /// The name of the native primitive this strategy uses, for diagnostics.
    fn name(&self) -> &'static str;

    /// Reserve at least `size` bytes of the disk space for the `file`,
    /// keeping its reported length intact.
    fn reserve(&self, file: &File, size: NonZeroU64) -> Result<(), Error>;
}

/// Preallocate the disk space for a given file.
///
/// This function will attempt to ensure that the given `file` has at least
/// `size` bytes of real reserved space on the underlying filesystem (not
/// a "hole"), rounded up to the filesystem allocation granularity.
/// The reported length of the file is not changed, the existing content is
/// never touched, and the allocation is never shrunk, so calling this
/// repeatedly with non-decreasing sizes is safe.
///
/// A `size` of zero or less is a no-op: nothing is reserved and no system
/// calls are issued.
///
/// The `file` has to be open for writing. It is borrowed for the duration of
/// the call only; concurrent calls on the same file must be serialized by
/// the caller.
pub fn preallocate(file: &File, size: i64) -> Result<(), Error> {
    preallocate_with(&Platform, file, size)
}

/// Preallocate the disk space for a given file via an explicit [`Strategy`].
///
/// See [`preallocate`] for the semantics.
pub fn preallocate_with<S>(strategy: &S, file: &File, size: i64) -> Result<(), Error>
where
    S: Strategy + ?Sized,
{
    let Some(size) = u64::try_from(size).ok().and_then(NonZeroU64::new) else {
        tracing::trace!(message = "nothing to preallocate", %size);
        return Ok(());
    };

    tracing::trace!(message = "preallocating", strategy = strategy.name(), %size);
    let result = strategy.reserve(file, size);
    if let Err(ref err) = result {
        if err.is_soft() {
            tracing::debug!(message = "preallocation is not supported", op = err.op(), error = %err);
        }
    }
    result
}

/// Query the geometry of the volume the `file` resides on.
///
/// Heavily platform-dependent; reports [`Error::Unsupported`] where there is
/// no way to obtain it.
pub fn query_volume_geometry(file: &File) -> Result<VolumeGeometry, Error> {
    volume::query_volume_geometry(file)
}

/// The amount of the disk space currently allocated for the `file`.
///
/// Falls back to the reported length where the allocation can't be
/// observed.
pub fn allocated_size(file: &File) -> io::Result<u64> {
    volume::allocated_size(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// A strategy that records the sizes it was asked to reserve.
    #[derive(Default)]
    struct Recording {
        calls: RefCell<Vec<u64>>,
        fail_with: Option<fn() -> Error>,
    }

    impl Strategy for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn reserve(&self, _file: &File, size: NonZeroU64) -> Result<(), Error> {
            self.calls.borrow_mut().push(size.get());
            match self.fail_with {
                Some(make_error) => Err(make_error()),
                None => Ok(()),
            }
        }
    }

    fn scratch_file() -> File {
        tempfile::tempfile().unwrap()
    }

    #[test]
    fn non_positive_sizes_are_noop() {
        let strategy = Recording::default();
        let file = scratch_file();

        for size in [0, -1, -4096, i64::MIN] {
            preallocate_with(&strategy, &file, size).unwrap();
        }

        assert_eq!(*strategy.calls.borrow(), Vec::<u64>::new());
    }

    #[test]
    fn positive_size_is_passed_through() {
        let strategy = Recording::default();
        let file = scratch_file();

        preallocate_with(&strategy, &file, 5000).unwrap();
        preallocate_with(&strategy, &file, i64::MAX).unwrap();

        assert_eq!(*strategy.calls.borrow(), vec![5000, i64::MAX as u64]);
    }

    #[test]
    fn increasing_requests_all_succeed() {
        let strategy = Recording::default();
        let file = scratch_file();

        for size in [4096, 4096, 8192, 1 << 20] {
            preallocate_with(&strategy, &file, size).unwrap();
        }

        assert_eq!(*strategy.calls.borrow(), vec![4096, 4096, 8192, 1 << 20]);
    }

    #[test]
    fn errors_are_propagated_unchanged() {
        let strategy = Recording {
            fail_with: Some(|| Error::Unsupported {
                op: "stub",
                source: io::Error::from(io::ErrorKind::Unsupported),
            }),
            ..Default::default()
        };
        let file = scratch_file();

        let err = preallocate_with(&strategy, &file, 1).unwrap_err();
        assert!(err.is_soft());
        assert_eq!(err.op(), "stub");
        assert_eq!(strategy.calls.borrow().len(), 1);
    }

    #[test]
    fn platform_strategy_is_safe_to_call() {
        let file = scratch_file();
        match preallocate(&file, 4096) {
            Ok(()) => {}
            Err(err) if err.is_soft() => {}
            Err(err) => panic!("unexpected preallocation failure: {err}"),
        }
        assert_eq!(file.metadata().unwrap().len(), 0);
    }
}
