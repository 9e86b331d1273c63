//! Kernel-mediated copies on Unix.
//!
//! Linux reads our own address space with `process_vm_readv`, which fails
//! with `EFAULT` or returns short instead of raising `SIGBUS`/`SIGSEGV`.
//! Where that call is missing or filtered, and on every other Unix, bytes
//! go through a per-thread pipe: `write` from the source reports a bad page
//! the same way, and the bytes it accepted are read straight back.

use std::cell::RefCell;
use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};

use libc::{c_int, c_void};

use crate::errors::{MmapError, Result};

/// Largest single pipe write. Every pipe holds at least this much, so the
/// write never blocks on an empty pipe.
const PIPE_CHUNK: usize = 4096;

/// Copy into `dst` from `src`, returning how many bytes arrived before the
/// first bad source address.
pub(super) unsafe fn copy(src: *const u8, dst: &mut [u8]) -> Result<usize> {
    if dst.is_empty() {
        return Ok(0);
    }
    cfg_if::cfg_if! {
        if #[cfg(target_os = "linux")] {
            if let Some(copied) = vm_readv::copy(src, dst)? {
                return Ok(copied);
            }
        }
    }
    pipe_copy(src, dst)
}

#[cfg(target_os = "linux")]
mod vm_readv {
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};

    use libc::{c_void, iovec};

    use crate::errors::{MmapError, Result};

    static UNAVAILABLE: AtomicBool = AtomicBool::new(false);

    /// `None` when the call cannot be used here and the pipe should be.
    pub(super) unsafe fn copy(src: *const u8, dst: &mut [u8]) -> Result<Option<usize>> {
        if UNAVAILABLE.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let local = iovec {
            iov_base: dst.as_mut_ptr().cast::<c_void>(),
            iov_len: dst.len(),
        };
        let remote = iovec {
            iov_base: src.cast_mut().cast::<c_void>(),
            iov_len: dst.len(),
        };
        loop {
            let n = libc::process_vm_readv(libc::getpid(), &local, 1, &remote, 1, 0);
            if n >= 0 {
                return Ok(Some(n as usize));
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EFAULT) => return Ok(Some(0)),
                Some(libc::EINTR) => continue,
                Some(libc::ENOSYS | libc::EPERM) => {
                    log::debug!("process_vm_readv unavailable ({err}), copying through a pipe");
                    UNAVAILABLE.store(true, Ordering::Relaxed);
                    return Ok(None);
                }
                _ => {
                    return Err(MmapError::Platform {
                        call: "process_vm_readv",
                        source: err,
                    })
                }
            }
        }
    }
}

struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl Pipe {
    fn open() -> Result<Self> {
        let mut fds = [0 as c_int; 2];
        // SAFETY: `fds` has room for both descriptors.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(MmapError::last_os_error("pipe"));
        }
        // SAFETY: both descriptors were just created and are owned here.
        let pipe = unsafe {
            Pipe {
                read: OwnedFd::from_raw_fd(fds[0]),
                write: OwnedFd::from_raw_fd(fds[1]),
            }
        };
        for fd in [&pipe.read, &pipe.write] {
            // SAFETY: valid descriptor.
            if unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) } != 0 {
                return Err(MmapError::last_os_error("fcntl"));
            }
        }
        Ok(pipe)
    }
}

thread_local! {
    static PIPE: RefCell<Option<Pipe>> = const { RefCell::new(None) };
}

/// Copy through this thread's pipe. A pipe left in an unknown state by an
/// error is dropped and reopened on the next call.
pub(super) unsafe fn pipe_copy(src: *const u8, dst: &mut [u8]) -> Result<usize> {
    PIPE.with(|cell| {
        let mut slot = cell.borrow_mut();
        let pipe = match slot.take() {
            Some(pipe) => pipe,
            None => Pipe::open()?,
        };
        let copied = transfer(&pipe, src, dst)?;
        *slot = Some(pipe);
        Ok(copied)
    })
}

unsafe fn transfer(pipe: &Pipe, src: *const u8, dst: &mut [u8]) -> Result<usize> {
    let mut done = 0;
    while done < dst.len() {
        let want = (dst.len() - done).min(PIPE_CHUNK);
        let n = libc::write(
            pipe.write.as_raw_fd(),
            src.add(done).cast::<c_void>(),
            want,
        );
        if n < 0 {
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EFAULT) => break,
                Some(libc::EINTR) => continue,
                _ => return Err(MmapError::Platform { call: "write", source: err }),
            }
        }
        let n = n as usize;
        drain(pipe, &mut dst[done..done + n])?;
        done += n;
        if n < want {
            break;
        }
    }
    Ok(done)
}

/// Read exactly `buf.len()` bytes that are already sitting in the pipe.
fn drain(pipe: &Pipe, buf: &mut [u8]) -> Result<()> {
    let mut got = 0;
    while got < buf.len() {
        // SAFETY: the destination range is a live, writable slice.
        let n = unsafe {
            libc::read(
                pipe.read.as_raw_fd(),
                buf[got..].as_mut_ptr().cast::<c_void>(),
                buf.len() - got,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(MmapError::Platform { call: "read", source: err });
        }
        if n == 0 {
            return Err(MmapError::Platform {
                call: "read",
                source: io::Error::from(io::ErrorKind::UnexpectedEof),
            });
        }
        got += n as usize;
    }
    Ok(())
}
