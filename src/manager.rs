//! Convenience entry points.
//!
//! Thin wrappers over [`MapOptions`] that take protection, flags and a signed
//! length, where a negative length means "the whole file".

use std::fs::File;

use crate::errors::{MmapError, Result};
use crate::flags::{MapFlags, Protection};
use crate::mmap::Mmap;
use crate::options::MapOptions;

/// Map all of `file`.
///
/// # Errors
///
/// Returns errors from [`Mmap::map`]; an empty file is `InvalidArgument`.
pub fn map(file: &File, protection: Protection, flags: MapFlags) -> Result<Mmap> {
    map_region(Some(file), -1, protection, flags, 0)
}

/// Map `len` bytes of `file` starting at `offset`, or anonymous memory when
/// `flags` contains [`MapFlags::ANONYMOUS`].
///
/// A negative `len` maps from `offset` to the end of the file. Anonymous
/// mappings need a positive `len` and ignore `file` and `offset`.
///
/// # Errors
///
/// Returns `MmapError::InvalidArgument` for a non-positive anonymous length,
/// a missing file, or a misaligned offset; otherwise errors from
/// [`Mmap::map`].
pub fn map_region(
    file: Option<&File>,
    len: i64,
    protection: Protection,
    flags: MapFlags,
    offset: u64,
) -> Result<Mmap> {
    let mut options = MapOptions::new()
        .protection(protection)
        .flags(flags)
        .offset(offset);
    if len >= 0 {
        let len = usize::try_from(len).map_err(|_| {
            MmapError::InvalidArgument(format!("length {len} does not fit in the address space"))
        })?;
        options = options.len(len);
    } else if flags.contains(MapFlags::ANONYMOUS) {
        return Err(MmapError::InvalidArgument(format!(
            "anonymous mapping requires a positive length, got {len}"
        )));
    }
    options.map_with(file)
}

/// Map `len` bytes of zero-filled anonymous memory.
///
/// # Errors
///
/// Returns `MmapError::InvalidArgument` if `len` is zero and
/// `MmapError::Platform` if the OS refuses.
pub fn map_anon(len: usize, protection: Protection) -> Result<Mmap> {
    MapOptions::new().len(len).protection(protection).map_anon()
}
