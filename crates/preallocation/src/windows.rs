//! Windows-specific implementation.
//!
//! Uses the NT native API, as the Win32 layer has no way to set the
//! allocation size without also moving the end of file.

#![allow(unsafe_code)]

use crate::{
    native::{
        self, FileAllocationInformation, FileFsSizeInformation, FileStandardInformation,
        IoStatusBlock, VolumeInformation, FILE_ALLOCATION_INFORMATION_CLASS,
        FILE_FS_SIZE_INFORMATION_CLASS, FILE_STANDARD_INFORMATION_CLASS, QUERY_VOLUME_OP,
    },
    Error, Strategy, VolumeGeometry,
};
use once_cell::sync::OnceCell;
use std::{fs::File, io, mem, num::NonZeroU64, os::windows::io::AsRawHandle};
use winapi::{
    shared::{
        minwindef::{FARPROC, ULONG},
        ntdef::{NTSTATUS, PVOID},
    },
    um::{
        libloaderapi::{GetModuleHandleA, GetProcAddress},
        winnt::HANDLE,
    },
};

/// The signature shared by `NtQueryVolumeInformationFile`,
/// `NtQueryInformationFile` and `NtSetInformationFile`.
type NtFileInformationFn = unsafe extern "system" fn(
    file_handle: HANDLE,
    io_status_block: *mut IoStatusBlock,
    file_information: PVOID,
    length: ULONG,
    file_information_class: u32,
) -> NTSTATUS;

/// `RtlNtStatusToDosError`.
type RtlNtStatusToDosErrorFn = unsafe extern "system" fn(status: NTSTATUS) -> ULONG;

/// The `ntdll.dll` entry points, resolved once per process.
static NTDLL: OnceCell<Ntdll> = OnceCell::new();

struct Ntdll {
    query_volume_information_file: NtFileInformationFn,
    query_information_file: NtFileInformationFn,
    set_information_file: NtFileInformationFn,
    rtl_nt_status_to_dos_error: RtlNtStatusToDosErrorFn,
}

impl Ntdll {
    /// Get the entry points, resolving them on the first use.
    fn get() -> io::Result<&'static Self> {
        NTDLL.get_or_try_init(Self::resolve)
    }

    fn resolve() -> io::Result<Self> {
        // `ntdll.dll` is mapped into every process, no need to load it.
        let module = unsafe { GetModuleHandleA(b"ntdll.dll\0".as_ptr().cast()) };
        if module.is_null() {
            return Err(io::Error::last_os_error());
        }

        let symbol = |name: &'static [u8]| -> io::Result<FARPROC> {
            let proc = unsafe { GetProcAddress(module, name.as_ptr().cast()) };
            if proc.is_null() {
                return Err(io::Error::last_os_error());
            }
            Ok(proc)
        };

        // SAFETY: the signatures match the documented ones of the resolved
        // functions.
        unsafe {
            Ok(Self {
                query_volume_information_file: mem::transmute::<FARPROC, NtFileInformationFn>(
                    symbol(b"NtQueryVolumeInformationFile\0")?,
                ),
                query_information_file: mem::transmute::<FARPROC, NtFileInformationFn>(symbol(
                    b"NtQueryInformationFile\0",
                )?),
                set_information_file: mem::transmute::<FARPROC, NtFileInformationFn>(symbol(
                    b"NtSetInformationFile\0",
                )?),
                rtl_nt_status_to_dos_error: mem::transmute::<FARPROC, RtlNtStatusToDosErrorFn>(
                    symbol(b"RtlNtStatusToDosError\0")?,
                ),
            })
        }
    }

    /// Interpret the `NTSTATUS` returned by a native API call.
    fn check(&self, status: NTSTATUS) -> io::Result<()> {
        if status >= 0 {
            return Ok(());
        }
        let code = unsafe { (self.rtl_nt_status_to_dos_error)(status) };
        Err(io::Error::from_raw_os_error(code as i32))
    }
}

/// A borrowed file handle along with the native API to operate on it.
struct NtFile<'a> {
    file: &'a File,
    ntdll: &'static Ntdll,
}

impl<'a> NtFile<'a> {
    fn new(file: &'a File) -> io::Result<Self> {
        Ok(Self {
            file,
            ntdll: Ntdll::get()?,
        })
    }

    fn handle(&self) -> HANDLE {
        self.file.as_raw_handle() as HANDLE
    }

    /// Issue a call with a fixed-layout information record `T`.
    ///
    /// # Safety
    ///
    /// `call` must be one of the resolved file information functions, and `T`
    /// must be the record the `class` expects.
    unsafe fn call<T>(
        &self,
        call: NtFileInformationFn,
        info: &mut T,
        class: u32,
    ) -> io::Result<()> {
        let mut io_status_block = IoStatusBlock::default();
        let status = call(
            self.handle(),
            &mut io_status_block,
            (info as *mut T).cast(),
            mem::size_of::<T>() as ULONG,
            class,
        );
        self.ntdll.check(status)
    }
}

impl VolumeInformation for NtFile<'_> {
    fn query_size_information(&self) -> io::Result<VolumeGeometry> {
        let mut info = FileFsSizeInformation::default();
        unsafe {
            self.call(
                self.ntdll.query_volume_information_file,
                &mut info,
                FILE_FS_SIZE_INFORMATION_CLASS,
            )?;
        }
        Ok(info.into())
    }

    fn query_allocation_size(&self) -> io::Result<u64> {
        let mut info = FileStandardInformation::default();
        unsafe {
            self.call(
                self.ntdll.query_information_file,
                &mut info,
                FILE_STANDARD_INFORMATION_CLASS,
            )?;
        }
        u64::try_from(info.allocation_size)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    fn set_allocation_size(&self, size: u64) -> io::Result<()> {
        let allocation_size = i64::try_from(size)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        let mut info = FileAllocationInformation { allocation_size };
        unsafe {
            self.call(
                self.ntdll.set_information_file,
                &mut info,
                FILE_ALLOCATION_INFORMATION_CLASS,
            )
        }
    }
}

/// Allocate the disk space by setting the file allocation size via
/// `NtSetInformationFile`, in whole clusters.
#[derive(Debug, Default, Clone, Copy)]
pub struct NtAllocation;

impl Strategy for NtAllocation {
    fn name(&self) -> &'static str {
        native::SET_FILE_OP
    }

    fn reserve(&self, file: &File, size: NonZeroU64) -> Result<(), Error> {
        let volume = NtFile::new(file).map_err(|source| Error::QueryFailed {
            op: QUERY_VOLUME_OP,
            source,
        })?;
        native::reserve_clusters(&volume, size)
    }
}

/// Query the volume geometry via `NtQueryVolumeInformationFile`.
pub(crate) fn query_volume_geometry(file: &File) -> Result<VolumeGeometry, Error> {
    NtFile::new(file)
        .and_then(|volume| volume.query_size_information())
        .map_err(|source| Error::QueryFailed {
            op: QUERY_VOLUME_OP,
            source,
        })
}

/// The allocation size as reported by `NtQueryInformationFile`.
pub(crate) fn allocated_size(file: &File) -> io::Result<u64> {
    NtFile::new(file)?.query_allocation_size()
}
