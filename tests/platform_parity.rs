//! Cross-checks our mappings against an independent mapping and plain file I/O.

use mmap_region::{map, utils, MapFlags, MapOptions, Protection};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;

fn tmp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("mmap_region_parity_{}_{}", name, std::process::id()));
    p
}

#[test]
fn flushed_writes_are_visible_to_other_mappings() {
    let _ = env_logger::builder().is_test(true).try_init();
    let path = tmp_path("flush_visible");
    let _ = fs::remove_file(&path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .expect("create");
    file.set_len(3 * utils::page_size() as u64).expect("set_len");

    let mut m = map(&file, Protection::READWRITE, MapFlags::empty()).expect("rw");
    let at = utils::page_size() as u64 + 10;
    m.update_region(at, b"cross-check").expect("write");
    m.flush().expect("flush");

    // SAFETY: the file is not resized while this mapping is alive.
    let other = unsafe { memmap2::Mmap::map(&file) }.expect("memmap2");
    let at = at as usize;
    assert_eq!(&other[at..at + 11], b"cross-check");
    assert_eq!(&other[..], &m[..]);
    drop(other);

    m.unmap().expect("unmap");
    let on_disk = fs::read(&path).expect("read");
    assert_eq!(&on_disk[at..at + 11], b"cross-check");
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn unmap_flushes_before_release() {
    let _ = env_logger::builder().is_test(true).try_init();
    let path = tmp_path("unmap_flushes");
    let _ = fs::remove_file(&path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .expect("create");
    file.set_len(4096).expect("set_len");

    let mut m = MapOptions::new()
        .protection(Protection::READWRITE)
        .map(&file)
        .expect("rw");
    m.update_region(0, b"on unmap").expect("write");
    m.unmap().expect("unmap");

    assert_eq!(&fs::read(&path).expect("read")[..8], b"on unmap");
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn independent_writes_are_visible_to_us() {
    let _ = env_logger::builder().is_test(true).try_init();
    let path = tmp_path("external_writes");
    let _ = fs::remove_file(&path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .expect("create");
    file.set_len(4096).expect("set_len");

    let ours = map(&file, Protection::READONLY, MapFlags::empty()).expect("ro");
    // SAFETY: as above.
    let mut theirs = unsafe { memmap2::MmapMut::map_mut(&file) }.expect("memmap2");
    theirs[100..105].copy_from_slice(b"hello");
    theirs.flush().expect("flush");

    assert_eq!(&ours[100..105], b"hello");
    drop(theirs);
    drop(ours);
    fs::remove_file(&path).expect("cleanup");
}
