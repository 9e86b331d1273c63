//! The mapped region handle.

use std::fs::File;
use std::ops::Deref;
use std::ptr::NonNull;
use std::slice;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(windows)]
use std::sync::Arc;

use crate::errors::{MmapError, Result};
use crate::fault::Window;
use crate::flags::{MapFlags, Protection};
use crate::options::MapOptions;
use crate::sys;
use crate::utils::slice_range;

#[cfg(windows)]
use crate::registry::HandleTable;

/// An active memory mapping, exclusively owned.
///
/// The handle dereferences to `[u8]` for the whole mapped length, which is
/// fixed at creation: later size changes of the backing file are not
/// reflected. Borrowed slices are the only derived views, so they cannot
/// outlive the handle or be unmapped in its place.
///
/// [`unmap`](Mmap::unmap) consumes the handle, which makes use-after-unmap
/// and double-unmap compile errors. A handle dropped without `unmap` is
/// released the same way (flush, then unmap), and a failure is logged.
///
/// # Examples
///
/// ```no_run
/// use mmap_region::{MapOptions, Protection};
///
/// let file = std::fs::OpenOptions::new().read(true).write(true).open("data.bin")?;
/// let mut map = MapOptions::new().protection(Protection::READWRITE).map(&file)?;
///
/// map.update_region(0, b"Hello, mmap!")?;
/// map.flush()?;
/// assert_eq!(&map[..12], b"Hello, mmap!");
/// map.unmap()?;
/// # Ok::<(), mmap_region::MmapError>(())
/// ```
pub struct Mmap {
    ptr: NonNull<u8>,
    len: usize,
    protection: Protection,
    flags: MapFlags,
    pub(crate) locked: AtomicBool,
    released: bool,
    #[cfg(windows)]
    registry: Arc<HandleTable>,
}

// SAFETY: the mapping is plain memory owned by this handle; shared access is
// read-only and mutation needs `&mut self`.
unsafe impl Send for Mmap {}
unsafe impl Sync for Mmap {}

impl std::fmt::Debug for Mmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mmap")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("protection", &self.protection)
            .field("flags", &self.flags)
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl Mmap {
    /// Map a region as described by `options`.
    ///
    /// `backing` is ignored for anonymous mappings and required otherwise.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::InvalidArgument` if the request breaks a descriptor
    /// invariant, `MmapError::Io` if the file size cannot be read, and
    /// `MmapError::Platform` if the OS refuses the mapping.
    pub fn map(options: &MapOptions, backing: Option<&File>) -> Result<Self> {
        let req = options.request(backing)?;

        #[cfg(windows)]
        let registry = options.registry_or_global();
        #[cfg(windows)]
        let ptr = sys::map(&req, &registry)?;
        #[cfg(not(windows))]
        let ptr = sys::map(&req)?;

        log::debug!(
            "mapped {} bytes at {:p} (offset={}, protection={:?}, flags={:?})",
            req.len,
            ptr,
            req.offset,
            req.protection,
            req.flags
        );
        Ok(Self {
            ptr,
            len: req.len,
            protection: req.protection,
            flags: req.flags,
            locked: AtomicBool::new(false),
            released: false,
            #[cfg(windows)]
            registry,
        })
    }

    /// Length of the mapping in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping is empty. Mappings are never created empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base address of the mapping.
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Protection the mapping was created with.
    #[must_use]
    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Flags the mapping was created with.
    #[must_use]
    pub fn flags(&self) -> MapFlags {
        self.flags
    }

    /// Whether the mapping has no backing file.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.flags.contains(MapFlags::ANONYMOUS)
    }

    /// Whether [`lock`](Mmap::lock) succeeded and has not been undone.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// The whole mapping as a byte slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr..ptr+len is mapped and readable for the life of self.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// The whole mapping as a mutable byte slice.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::InvalidMode` for read-only mappings.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        if !self.protection.is_writable() {
            return Err(MmapError::InvalidMode("mutable access on read-only mapping"));
        }
        // SAFETY: writable mapping, and `&mut self` makes the borrow unique.
        Ok(unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) })
    }

    /// Copy bytes from the mapping at `offset` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::OutOfBounds` if the range exceeds the mapping.
    pub fn read_into(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let (start, end) = slice_range(offset, buf.len() as u64, self.len as u64)?;
        buf.copy_from_slice(&self.as_slice()[start..end]);
        Ok(())
    }

    /// Copy `data` into the mapping at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::InvalidMode` for read-only mappings.
    /// Returns `MmapError::OutOfBounds` if the range exceeds the mapping.
    pub fn update_region(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let total = self.len as u64;
        let (start, end) = slice_range(offset, data.len() as u64, total)?;
        self.as_mut_slice()?[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Flush and release the mapping.
    ///
    /// Dirty pages are written back first, then the mapping is released. A
    /// flush failure does not stop the release; its error is the one
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::Platform` if the flush or the release fails, and
    /// `MmapError::UnknownMapping` if the registry has no entry for this view.
    ///
    /// The handle is gone afterwards:
    ///
    /// ```compile_fail
    /// let map = mmap_region::map_anon(4096, mmap_region::Protection::READWRITE)?;
    /// map.unmap()?;
    /// let _ = map.len();
    /// # Ok::<(), mmap_region::MmapError>(())
    /// ```
    pub fn unmap(mut self) -> Result<()> {
        self.released = true;
        self.release()
    }

    fn release(&self) -> Result<()> {
        let flushed = self.flush();
        // SAFETY: ptr/len are exactly what the backend returned, and callers
        // guarantee nothing touches the range afterwards.
        #[cfg(windows)]
        let released = unsafe { sys::unmap(self.ptr.as_ptr(), self.len, &self.registry) };
        // SAFETY: as above.
        #[cfg(not(windows))]
        let released = unsafe { sys::unmap(self.ptr.as_ptr(), self.len) };
        log::debug!("unmapped {} bytes at {:p}", self.len, self.ptr);
        flushed.and(released)
    }

    pub(crate) fn window(&self) -> Window {
        Window {
            start: self.ptr.as_ptr() as usize,
            len: self.len,
        }
    }
}

impl Deref for Mmap {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Mmap {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Drop for Mmap {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.release() {
            log::warn!("failed to release mapping at {:p}: {e}", self.ptr);
        }
    }
}
