#![cfg(any(target_os = "linux", target_os = "android"))]

use pretty_assertions::assert_eq;
use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
};
use tempfile::NamedTempFile;

/// Preallocate, skipping the test if the filesystem under the temp dir
/// can't do it.
fn preallocate_or_skip(file: &File, size: i64) -> bool {
    match prealloc::preallocate(file, size) {
        Ok(()) => true,
        Err(err) if err.is_soft() => {
            eprintln!("skipping: {err}");
            false
        }
        Err(err) => panic!("preallocation failed: {err:?}"),
    }
}

#[test]
fn reserves_space_without_changing_the_length() {
    let tmp = NamedTempFile::new().unwrap();
    let file = tmp.reopen().unwrap();
    let size = 3 * 1024 * 1024;

    if !preallocate_or_skip(&file, size) {
        return;
    }

    assert_eq!(file.metadata().unwrap().len(), 0);
    assert!(prealloc::allocated_size(&file).unwrap() >= size as u64);
}

#[test]
fn allocation_is_monotonic() {
    let tmp = NamedTempFile::new().unwrap();
    let file = tmp.reopen().unwrap();

    let mut previous = prealloc::allocated_size(&file).unwrap();
    for size in [4096, 4096, 64 * 1024, 1024 * 1024, 4096] {
        if !preallocate_or_skip(&file, size) {
            return;
        }
        let allocated = prealloc::allocated_size(&file).unwrap();
        assert!(
            allocated >= previous,
            "allocation shrunk from {previous} to {allocated}"
        );
        previous = allocated;
    }
    assert!(previous >= 1024 * 1024);
}

#[test]
fn existing_content_is_preserved() {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(b"hello, preallocation").unwrap();
    tmp.flush().unwrap();
    let file = tmp.reopen().unwrap();

    if !preallocate_or_skip(&file, 1024 * 1024) {
        return;
    }

    let mut content = String::new();
    let mut reader = tmp.reopen().unwrap();
    reader.seek(SeekFrom::Start(0)).unwrap();
    reader.read_to_string(&mut content).unwrap();
    assert_eq!(content, "hello, preallocation");
    assert_eq!(file.metadata().unwrap().len(), 20);
}

#[test]
fn non_positive_sizes_leave_the_file_alone() {
    let tmp = NamedTempFile::new().unwrap();
    let file = tmp.reopen().unwrap();

    prealloc::preallocate(&file, 0).unwrap();
    prealloc::preallocate(&file, -1).unwrap();

    assert_eq!(file.metadata().unwrap().len(), 0);
    assert_eq!(prealloc::allocated_size(&file).unwrap(), 0);
}

#[test]
fn read_only_handle_is_a_hard_failure() {
    let tmp = NamedTempFile::new().unwrap();
    let file = File::open(tmp.path()).unwrap();

    let err = prealloc::preallocate(&file, 4096).unwrap_err();

    assert!(!err.is_soft());
    assert_eq!(err.op(), "fallocate");
}

#[test]
fn volume_geometry_rounds_requests() {
    let tmp = NamedTempFile::new().unwrap();
    let file = tmp.reopen().unwrap();

    let geometry = prealloc::query_volume_geometry(&file).unwrap();
    let unit = geometry.allocation_unit_size().unwrap();
    let rounded = prealloc::rounded_allocation_size(unit.get() + 1, unit).unwrap();

    assert_eq!(rounded, unit.get() * 2);
}
