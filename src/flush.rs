//! Writing dirty pages back to the backing file.

use crate::errors::Result;
use crate::mmap::Mmap;
use crate::sys;
use crate::utils::{align_down, page_size, slice_range};

impl Mmap {
    /// Synchronously flush the whole mapping.
    ///
    /// Harmless on anonymous and copy-on-write mappings, where there is
    /// nothing to write back.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::Platform` if `msync`/`FlushViewOfFile` fails.
    pub fn flush(&self) -> Result<()> {
        // SAFETY: the base is page aligned and the full length is mapped.
        unsafe { sys::flush(self.as_ptr().cast_mut(), self.len()) }
    }

    /// Synchronously flush `[offset, offset+len)`.
    ///
    /// The start is rounded down to a page boundary, so a few bytes before
    /// `offset` may be written back as well.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::OutOfBounds` if the range exceeds the mapping.
    /// Returns `MmapError::Platform` if the platform flush fails.
    pub fn flush_range(&self, offset: u64, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let (start, end) = slice_range(offset, len, self.len() as u64)?;
        let aligned = align_down(start as u64, page_size() as u64) as usize;
        // SAFETY: aligned..end lies inside the mapping and starts on a page.
        unsafe { sys::flush(self.as_ptr().cast_mut().add(aligned), end - aligned) }
    }
}
