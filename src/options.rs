//! Builder for mapping requests.

use std::fs::File;
use std::sync::Arc;

use crate::errors::{MmapError, Result};
use crate::flags::{MapFlags, Protection};
use crate::mmap::Mmap;
use crate::registry::HandleTable;
use crate::sys::{self, MapRequest};

/// Describes a mapping to create: protection, flags, length and offset.
///
/// Without an explicit [`len`](MapOptions::len), a file-backed mapping
/// covers the file from `offset` to its current end. Anonymous mappings
/// always need a non-zero length.
///
/// # Examples
///
/// ```no_run
/// use mmap_region::{MapOptions, Protection};
///
/// // 1 MiB of private scratch memory
/// let scratch = MapOptions::new()
///     .len(1 << 20)
///     .protection(Protection::READWRITE)
///     .map_anon()?;
/// assert_eq!(scratch.len(), 1 << 20);
///
/// // Second page of a file, read-only
/// let file = std::fs::File::open("data.bin")?;
/// let page = mmap_region::utils::offset_granularity();
/// let view = MapOptions::new().offset(page as u64).len(page).map(&file)?;
/// # Ok::<(), mmap_region::MmapError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapOptions {
    protection: Protection,
    flags: MapFlags,
    len: Option<usize>,
    offset: u64,
    #[cfg_attr(not(windows), allow(dead_code))]
    registry: Option<Arc<HandleTable>>,
}

impl MapOptions {
    /// Read-only, file-backed, whole-extent defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set protection and visibility.
    #[must_use]
    pub fn protection(mut self, protection: Protection) -> Self {
        self.protection = protection;
        self
    }

    /// Set mapping flags.
    #[must_use]
    pub fn flags(mut self, flags: MapFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Map exactly `len` bytes.
    #[must_use]
    pub fn len(mut self, len: usize) -> Self {
        self.len = Some(len);
        self
    }

    /// Start the mapping `offset` bytes into the file. Must be a multiple of
    /// [`offset_granularity`](crate::utils::offset_granularity).
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Track mapping-object handles in `registry` instead of the global table.
    ///
    /// Only backends that keep a companion handle per view (Windows) consult
    /// it.
    #[must_use]
    pub fn registry(mut self, registry: Arc<HandleTable>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Map `file` with these options.
    ///
    /// # Errors
    ///
    /// See [`Mmap::map`].
    pub fn map(&self, file: &File) -> Result<Mmap> {
        Mmap::map(self, Some(file))
    }

    /// Map anonymous memory with these options, whatever the flags say.
    ///
    /// # Errors
    ///
    /// See [`Mmap::map`].
    pub fn map_anon(&self) -> Result<Mmap> {
        let opts = self.clone().flags(self.flags | MapFlags::ANONYMOUS);
        Mmap::map(&opts, None)
    }

    /// Map with an optional backing file.
    ///
    /// # Errors
    ///
    /// See [`Mmap::map`].
    pub fn map_with(&self, backing: Option<&File>) -> Result<Mmap> {
        Mmap::map(self, backing)
    }

    #[cfg(windows)]
    pub(crate) fn registry_or_global(&self) -> Arc<HandleTable> {
        self.registry.clone().unwrap_or_else(HandleTable::global)
    }

    /// Check the descriptor invariants and resolve the length.
    pub(crate) fn request(&self, backing: Option<&File>) -> Result<MapRequest> {
        let anonymous = self.flags.contains(MapFlags::ANONYMOUS);
        let (len, source) = if anonymous {
            match self.len {
                Some(len) if len > 0 => (len, sys::NO_SOURCE),
                _ => {
                    return Err(MmapError::InvalidArgument(
                        "anonymous mapping requires non-zero length".into(),
                    ))
                }
            }
        } else {
            let file = backing.ok_or_else(|| {
                MmapError::InvalidArgument("file-backed mapping requires a backing file".into())
            })?;
            let len = match self.len {
                Some(len) => len,
                None => self.remaining_extent(file)?,
            };
            if len == 0 {
                return Err(MmapError::InvalidArgument("cannot map zero bytes".into()));
            }
            (len, sys::raw_source(file))
        };
        Ok(MapRequest {
            len,
            offset: if anonymous { 0 } else { self.offset },
            protection: self.protection,
            flags: self.flags,
            source,
        })
    }

    fn remaining_extent(&self, file: &File) -> Result<usize> {
        let size = file.metadata()?.len();
        let remaining = size.checked_sub(self.offset).ok_or_else(|| {
            MmapError::InvalidArgument(format!(
                "offset {} is past the end of the file ({size} bytes)",
                self.offset
            ))
        })?;
        usize::try_from(remaining).map_err(|_| {
            MmapError::InvalidArgument(format!(
                "file extent of {remaining} bytes does not fit in the address space"
            ))
        })
    }
}
