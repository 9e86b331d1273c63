//! Platform mapping backends.
//!
//! Each backend turns a [`MapRequest`] into the native call sequence and
//! implements lock, unlock, flush and unmap over a raw address/length pair.

use crate::flags::{MapFlags, Protection};

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub(crate) use self::unix::*;
    } else if #[cfg(windows)] {
        mod windows;
        pub(crate) use self::windows::*;
    } else {
        compile_error!("mmap-region supports Unix and Windows targets only");
    }
}

/// A validated mapping request, ready for the backend.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MapRequest {
    pub len: usize,
    pub offset: u64,
    pub protection: Protection,
    pub flags: MapFlags,
    /// Backing descriptor or handle. Ignored for anonymous requests.
    pub source: RawSource,
}

impl MapRequest {
    pub(crate) fn is_anonymous(&self) -> bool {
        self.flags.contains(MapFlags::ANONYMOUS)
    }
}
