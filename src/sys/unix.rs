//! POSIX backend: one `mmap` call per mapping, `mlock`/`munlock`, `msync`, `munmap`.
//!
//! 32-bit x86 and ARM Linux go through `mmap2`, which takes its offset in
//! 4096-byte units instead of bytes.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::ptr::{self, NonNull};

use libc::{c_int, c_void};

use super::MapRequest;
use crate::errors::{MmapError, Result};
use crate::flags::{MapFlags, Protection};
use crate::utils::{is_aligned, page_size};

/// Backing file descriptor.
pub(crate) type RawSource = c_int;

/// Descriptor passed for anonymous mappings.
pub(crate) const NO_SOURCE: RawSource = -1;

pub(crate) fn raw_source(file: &File) -> RawSource {
    file.as_raw_fd()
}

/// Translate portable flags into `(prot, flags)` for `mmap`.
pub(crate) fn native_flags(protection: Protection, flags: MapFlags) -> (c_int, c_int) {
    let mut prot = libc::PROT_READ;
    let mut map_flags = libc::MAP_SHARED;
    if protection.contains(Protection::COPYONWRITE) {
        prot |= libc::PROT_WRITE;
        map_flags = libc::MAP_PRIVATE;
    } else if protection.contains(Protection::READWRITE) {
        prot |= libc::PROT_WRITE;
    }
    if protection.contains(Protection::EXECUTABLE) {
        prot |= libc::PROT_EXEC;
    }
    if flags.contains(MapFlags::ANONYMOUS) {
        map_flags |= libc::MAP_ANON;
    }
    (prot, map_flags)
}

/// Create the mapping described by `req`.
pub(crate) fn map(req: &MapRequest) -> Result<NonNull<u8>> {
    let (fd, offset) = if req.is_anonymous() {
        (NO_SOURCE, 0)
    } else {
        let granularity = page_size() as u64;
        if !is_aligned(req.offset, granularity) {
            return Err(MmapError::InvalidArgument(format!(
                "offset {} is not a multiple of the page size ({granularity})",
                req.offset
            )));
        }
        (req.source, req.offset)
    };
    let (prot, flags) = native_flags(req.protection, req.flags);

    // SAFETY: a null hint never replaces an existing mapping; the kernel
    // validates fd, length and protection.
    let addr = unsafe { mmap_call(req.len, prot, flags, fd, offset)? };
    NonNull::new(addr.cast::<u8>()).ok_or_else(|| MmapError::Platform {
        call: "mmap",
        source: std::io::Error::new(std::io::ErrorKind::Other, "kernel returned a null mapping"),
    })
}

#[cfg(all(target_os = "linux", any(target_arch = "x86", target_arch = "arm")))]
unsafe fn mmap_call(
    len: usize,
    prot: c_int,
    flags: c_int,
    fd: c_int,
    offset: u64,
) -> Result<*mut c_void> {
    // mmap2 counts in 4096-byte units whatever the page size is.
    if offset & 0xFFF != 0 {
        return Err(MmapError::InvalidArgument(format!(
            "offset {offset} is not a multiple of 4096"
        )));
    }
    let pgoff = libc::c_long::try_from(offset >> 12).map_err(|_| {
        MmapError::InvalidArgument(format!("offset {offset} is too large for mmap2"))
    })?;
    let ret = libc::syscall(
        libc::SYS_mmap2,
        ptr::null_mut::<c_void>(),
        len,
        prot,
        flags,
        fd,
        pgoff,
    );
    if ret == -1 {
        return Err(MmapError::last_os_error("mmap2"));
    }
    Ok(ret as *mut c_void)
}

#[cfg(not(all(target_os = "linux", any(target_arch = "x86", target_arch = "arm"))))]
unsafe fn mmap_call(
    len: usize,
    prot: c_int,
    flags: c_int,
    fd: c_int,
    offset: u64,
) -> Result<*mut c_void> {
    let off = libc::off_t::try_from(offset).map_err(|_| {
        MmapError::InvalidArgument(format!("offset {offset} does not fit in off_t"))
    })?;
    let addr = libc::mmap(ptr::null_mut(), len, prot, flags, fd, off);
    if addr == libc::MAP_FAILED {
        return Err(MmapError::last_os_error("mmap"));
    }
    Ok(addr)
}

/// Synchronously write dirty pages in `[addr, addr+len)` back to the file.
///
/// # Safety
///
/// `addr` must be page aligned and the range must lie in a live mapping.
pub(crate) unsafe fn flush(addr: *mut u8, len: usize) -> Result<()> {
    if libc::msync(addr.cast::<c_void>(), len, libc::MS_SYNC) != 0 {
        return Err(MmapError::last_os_error("msync"));
    }
    Ok(())
}

/// # Safety
///
/// The range must lie in a live mapping.
pub(crate) unsafe fn lock(addr: *mut u8, len: usize) -> Result<()> {
    if libc::mlock(addr.cast::<c_void>().cast_const(), len) != 0 {
        return Err(MmapError::last_os_error("mlock"));
    }
    Ok(())
}

/// # Safety
///
/// The range must lie in a live mapping.
pub(crate) unsafe fn unlock(addr: *mut u8, len: usize) -> Result<()> {
    if libc::munlock(addr.cast::<c_void>().cast_const(), len) != 0 {
        return Err(MmapError::last_os_error("munlock"));
    }
    Ok(())
}

/// Release the mapping. Flushing is the caller's job.
///
/// # Safety
///
/// `addr`/`len` must be exactly what `map` produced, and nothing may touch
/// the range afterwards.
pub(crate) unsafe fn unmap(addr: *mut u8, len: usize) -> Result<()> {
    if libc::munmap(addr.cast::<c_void>(), len) != 0 {
        return Err(MmapError::last_os_error("munmap"));
    }
    Ok(())
}
