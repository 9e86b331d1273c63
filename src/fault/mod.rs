//! Scoped, non-faulting copies out of a mapped range.
//!
//! [`catch`] arms a per-thread window over one region for the duration of a
//! closure and disarms it on every exit path. Inside it, [`copy`] moves bytes
//! through a kernel path that reports a bad source page as a short copy
//! instead of raising a signal: `process_vm_readv` on Linux, a pipe
//! round-trip on other Unix systems, and `ReadProcessMemory` on Windows. A
//! short copy whose failing address lies in the window is recorded as the
//! window's fault.
//!
//! The mapping itself is never touched, so a page that failed once reads
//! normally as soon as its backing store is back. No signal handler is
//! installed: a fault raised anywhere else, including inside the window by
//! code that does not go through [`copy`], reaches the process with its
//! original disposition.

use std::cell::Cell;
use std::io;

use crate::errors::{MmapError, Result};

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use self::unix as imp;
    } else {
        mod windows;
        use self::windows as imp;
    }
}

/// Address range to intercept faults on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Window {
    pub start: usize,
    pub len: usize,
}

impl Window {
    pub(crate) fn contains(&self, addr: usize) -> bool {
        addr >= self.start && addr - self.start < self.len
    }
}

/// A fault claimed inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fault {
    pub addr: usize,
}

#[derive(Clone, Copy)]
struct Armed {
    window: Option<Window>,
    /// First claimed fault address, 0 if none.
    fault: usize,
}

thread_local! {
    static ARMED: Cell<Armed> = const { Cell::new(Armed { window: None, fault: 0 }) };
}

/// Restores the enclosing window when dropped.
struct Scope {
    previous: Armed,
}

impl Drop for Scope {
    fn drop(&mut self) {
        ARMED.with(|cell| cell.set(self.previous));
    }
}

/// Run `f` with `window` armed on the calling thread.
///
/// Returns the closure's output and the first fault claimed while it ran.
/// The previous window, if any, is restored afterwards, even on panic.
pub(crate) fn catch<R>(window: Window, f: impl FnOnce() -> R) -> (R, Option<Fault>) {
    let previous = ARMED.with(|cell| {
        cell.replace(Armed {
            window: Some(window),
            fault: 0,
        })
    });
    let scope = Scope { previous };
    let out = f();
    let addr = ARMED.with(|cell| cell.get().fault);
    drop(scope);
    (out, (addr != 0).then_some(Fault { addr }))
}

/// Copy `dst.len()` bytes from `src` into `dst` without faulting.
///
/// A bad source page inside the armed window stops the copy and is recorded
/// for [`tripped`]; `dst` then holds only the bytes before it.
///
/// # Errors
///
/// Returns `MmapError::Platform` if the copy mechanism itself fails, or if
/// the bad address is not inside the armed window.
///
/// # Safety
///
/// `src..src+dst.len()` must lie inside the armed window.
pub(crate) unsafe fn copy(src: *const u8, dst: &mut [u8]) -> Result<()> {
    let copied = imp::copy(src, dst)?;
    if copied == dst.len() {
        return Ok(());
    }
    let addr = src as usize + copied;
    let claimed = ARMED.with(|cell| {
        let mut armed = cell.get();
        match armed.window {
            Some(window) if window.contains(addr) => {
                if armed.fault == 0 {
                    armed.fault = addr;
                    cell.set(armed);
                }
                true
            }
            _ => false,
        }
    });
    if claimed {
        Ok(())
    } else {
        Err(MmapError::Platform {
            call: "copy",
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("bad address {addr:#x} outside the armed window"),
            ),
        })
    }
}

/// Whether a fault has been claimed in the current window.
pub(crate) fn tripped() -> bool {
    ARMED.with(|cell| cell.get().fault != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_bounds_are_half_open() {
        let w = Window {
            start: 0x1000,
            len: 0x2000,
        };
        assert!(!w.contains(0xfff));
        assert!(w.contains(0x1000));
        assert!(w.contains(0x2fff));
        assert!(!w.contains(0x3000));
    }

    #[test]
    fn clean_copy_records_nothing() {
        let buf = [7u8; 64];
        let window = Window {
            start: buf.as_ptr() as usize,
            len: buf.len(),
        };
        let mut out = [0u8; 64];
        let (copied, fault) = catch(window, || {
            // SAFETY: `buf` is the armed range and is fully readable.
            let r = unsafe { copy(buf.as_ptr(), &mut out) };
            assert!(!tripped());
            r
        });
        copied.expect("copy");
        assert!(fault.is_none());
        assert_eq!(out, buf);
        assert!(!tripped());
    }

    #[test]
    fn nested_windows_restore_outer() {
        let outer = Window {
            start: 0x10_0000,
            len: 0x1000,
        };
        let inner = Window {
            start: 0x20_0000,
            len: 0x1000,
        };
        let (inner_fault, outer_fault) = catch(outer, || {
            let ((), f) = catch(inner, || ());
            f
        });
        assert!(inner_fault.is_none());
        assert!(outer_fault.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_page_is_a_claimed_fault() {
        let page = crate::utils::page_size();
        // SAFETY: fresh inaccessible mapping owned by this test.
        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                page,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        assert_ne!(base, libc::MAP_FAILED);
        let start = base as usize;
        let window = Window { start, len: page };
        let mut out = [0u8; 32];
        let (copied, fault) = catch(window, || {
            // SAFETY: inside the armed window; the copy path never faults.
            unsafe { copy((start + 16) as *const u8, &mut out) }
        });
        copied.expect("claimed faults are not errors");
        assert_eq!(fault, Some(Fault { addr: start + 16 }));

        // Outside any window the same failure is an error.
        // SAFETY: as above.
        let err = unsafe { copy(start as *const u8, &mut out) }.expect_err("unarmed");
        assert!(matches!(err, MmapError::Platform { call: "copy", .. }));

        // SAFETY: unmapping our own test mapping.
        unsafe { libc::munmap(base, page) };
    }
}
