//! Kernel-mediated copies on Windows.
//!
//! Reading our own address space with `ReadProcessMemory` turns an in-page
//! error or access violation into a failed call with a partial byte count,
//! so nothing is intercepted.

use core::ffi::c_void;

use crate::errors::Result;

#[allow(non_snake_case)]
extern "system" {
    fn GetCurrentProcess() -> isize;
    fn ReadProcessMemory(
        hProcess: isize,
        lpBaseAddress: *const c_void,
        lpBuffer: *mut c_void,
        nSize: usize,
        lpNumberOfBytesRead: *mut usize,
    ) -> i32;
}

/// Copy into `dst` from `src`, returning how many bytes arrived before the
/// first bad source address.
pub(super) unsafe fn copy(src: *const u8, dst: &mut [u8]) -> Result<usize> {
    if dst.is_empty() {
        return Ok(0);
    }
    let mut read = 0usize;
    let ok = ReadProcessMemory(
        GetCurrentProcess(),
        src.cast::<c_void>(),
        dst.as_mut_ptr().cast::<c_void>(),
        dst.len(),
        &mut read,
    );
    if ok != 0 {
        return Ok(dst.len());
    }
    log::trace!(
        "ReadProcessMemory stopped after {read} of {} bytes: {}",
        dst.len(),
        std::io::Error::last_os_error()
    );
    Ok(read.min(dst.len()))
}
