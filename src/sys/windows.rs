//! Windows backend: `CreateFileMappingW` then `MapViewOfFile`.
//!
//! The mapping-object handle is not part of the portable region, so it is
//! kept in a [`HandleTable`] keyed by view address until the view is
//! released.

use std::fs::File;
use std::os::windows::io::AsRawHandle;
use std::ptr::{self, NonNull};

use core::ffi::c_void;

use super::MapRequest;
use crate::errors::{MmapError, Result};
use crate::flags::Protection;
use crate::registry::HandleTable;
use crate::utils::{is_aligned, offset_granularity};

#[allow(clippy::upper_case_acronyms)]
type HANDLE = isize;

/// Backing file handle.
pub(crate) type RawSource = HANDLE;

/// `INVALID_HANDLE_VALUE`: selects a pagefile-backed (anonymous) mapping.
pub(crate) const NO_SOURCE: RawSource = -1;

const PAGE_READONLY: u32 = 0x02;
const PAGE_READWRITE: u32 = 0x04;
const PAGE_WRITECOPY: u32 = 0x08;

const FILE_MAP_COPY: u32 = 0x01;
const FILE_MAP_WRITE: u32 = 0x02;
const FILE_MAP_READ: u32 = 0x04;
const FILE_MAP_EXECUTE: u32 = 0x20;

#[allow(non_snake_case)]
extern "system" {
    fn CreateFileMappingW(
        hFile: HANDLE,
        lpFileMappingAttributes: *const c_void,
        flProtect: u32,
        dwMaximumSizeHigh: u32,
        dwMaximumSizeLow: u32,
        lpName: *const u16,
    ) -> HANDLE;
    fn MapViewOfFile(
        hFileMappingObject: HANDLE,
        dwDesiredAccess: u32,
        dwFileOffsetHigh: u32,
        dwFileOffsetLow: u32,
        dwNumberOfBytesToMap: usize,
    ) -> *mut c_void;
    fn UnmapViewOfFile(lpBaseAddress: *const c_void) -> i32;
    fn FlushViewOfFile(lpBaseAddress: *const c_void, dwNumberOfBytesToFlush: usize) -> i32;
    fn VirtualLock(lpAddress: *const c_void, dwSize: usize) -> i32;
    fn VirtualUnlock(lpAddress: *const c_void, dwSize: usize) -> i32;
    fn CloseHandle(hObject: HANDLE) -> i32;
}

pub(crate) fn raw_source(file: &File) -> RawSource {
    file.as_raw_handle() as RawSource
}

/// Translate portable protection into `(flProtect, dwDesiredAccess)`.
///
/// The `PAGE_EXECUTE_*` constants sit four bits above their non-executable
/// counterparts, so adding execute is a shift.
pub(crate) fn native_protection(protection: Protection) -> (u32, u32) {
    let (mut page, mut access) = if protection.contains(Protection::COPYONWRITE) {
        (PAGE_WRITECOPY, FILE_MAP_COPY)
    } else if protection.contains(Protection::READWRITE) {
        (PAGE_READWRITE, FILE_MAP_WRITE)
    } else {
        (PAGE_READONLY, FILE_MAP_READ)
    };
    if protection.contains(Protection::EXECUTABLE) {
        page <<= 4;
        access |= FILE_MAP_EXECUTE;
    }
    (page, access)
}

/// Create the mapping object and a view of it, recording the pair in `registry`.
pub(crate) fn map(req: &MapRequest, registry: &HandleTable) -> Result<NonNull<u8>> {
    let (source, offset) = if req.is_anonymous() {
        (NO_SOURCE, 0)
    } else {
        let granularity = offset_granularity() as u64;
        if !is_aligned(req.offset, granularity) {
            return Err(MmapError::InvalidArgument(format!(
                "offset {} is not a multiple of the allocation granularity ({granularity})",
                req.offset
            )));
        }
        (req.source, req.offset)
    };
    let (page, access) = native_protection(req.protection);
    let max_size = offset.checked_add(req.len as u64).ok_or_else(|| {
        MmapError::InvalidArgument(format!("offset {offset} + length {} overflows", req.len))
    })?;

    // SAFETY: plain FFI call; a zero return is checked below.
    let handle = unsafe {
        CreateFileMappingW(
            source,
            ptr::null(),
            page,
            (max_size >> 32) as u32,
            (max_size & 0xFFFF_FFFF) as u32,
            ptr::null(),
        )
    };
    if handle == 0 {
        return Err(MmapError::last_os_error("CreateFileMapping"));
    }

    // SAFETY: `handle` is a live mapping object created above.
    let view = unsafe {
        MapViewOfFile(
            handle,
            access,
            (offset >> 32) as u32,
            (offset & 0xFFFF_FFFF) as u32,
            req.len,
        )
    };
    let Some(view) = NonNull::new(view.cast::<u8>()) else {
        let err = MmapError::last_os_error("MapViewOfFile");
        // SAFETY: the handle is ours and has no views.
        unsafe { CloseHandle(handle) };
        return Err(err);
    };

    registry.record(view.as_ptr() as usize, handle);
    Ok(view)
}

/// # Safety
///
/// The range must lie in a live view.
pub(crate) unsafe fn flush(addr: *mut u8, len: usize) -> Result<()> {
    if FlushViewOfFile(addr.cast::<c_void>().cast_const(), len) == 0 {
        return Err(MmapError::last_os_error("FlushViewOfFile"));
    }
    Ok(())
}

/// # Safety
///
/// The range must lie in a live view.
pub(crate) unsafe fn lock(addr: *mut u8, len: usize) -> Result<()> {
    if VirtualLock(addr.cast::<c_void>().cast_const(), len) == 0 {
        return Err(MmapError::last_os_error("VirtualLock"));
    }
    Ok(())
}

/// Errors are surfaced as-is, including `ERROR_NOT_LOCKED`.
///
/// # Safety
///
/// The range must lie in a live view.
pub(crate) unsafe fn unlock(addr: *mut u8, len: usize) -> Result<()> {
    if VirtualUnlock(addr.cast::<c_void>().cast_const(), len) == 0 {
        return Err(MmapError::last_os_error("VirtualUnlock"));
    }
    Ok(())
}

/// Unmap the view, then close the mapping object recorded for it.
///
/// # Safety
///
/// `addr` must be a view base returned by `map` with the same registry, and
/// nothing may touch the range afterwards.
pub(crate) unsafe fn unmap(addr: *mut u8, _len: usize, registry: &HandleTable) -> Result<()> {
    if UnmapViewOfFile(addr.cast::<c_void>().cast_const()) == 0 {
        return Err(MmapError::last_os_error("UnmapViewOfFile"));
    }
    let handle = registry.take(addr as usize)?;
    if CloseHandle(handle) == 0 {
        return Err(MmapError::last_os_error("CloseHandle"));
    }
    Ok(())
}
