//! Crate-specific error types for mmap-region.

use std::io;
use thiserror::Error;

/// Result alias for mmap-region operations.
pub type Result<T> = std::result::Result<T, MmapError>;

/// Error type covering caller misuse, platform failures, intercepted faults and
/// internal bookkeeping violations.
#[derive(Debug, Error)]
pub enum MmapError {
    /// The request was malformed: misaligned offset, non-positive anonymous length,
    /// missing backing file, or a length the platform cannot express.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A mapping, lock, flush or unmap call failed at the OS level.
    #[error("{call} failed: {source}")]
    Platform {
        /// Name of the platform call that failed.
        call: &'static str,
        /// The OS error as reported.
        #[source]
        source: io::Error,
    },

    /// A memory fault hit the mapped region during a fault-safe read.
    #[error("memory fault at {addr:#x} (offset {offset} into mapped region)")]
    Fault {
        /// Faulting address.
        addr: usize,
        /// Offset of the faulting address from the region base.
        offset: u64,
    },

    /// Unmap found no registry entry for a live view address.
    #[error("unknown mapping at base address {0:#x}")]
    UnknownMapping(usize),

    /// Error returned when attempting an operation in an incompatible mode.
    #[error("invalid access mode: {0}")]
    InvalidMode(&'static str),

    /// Error when a requested offset/length pair is out of bounds.
    #[error("range out of bounds: offset={offset}, len={len}, total={total}")]
    OutOfBounds {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: u64,
        /// Total size of the mapped region.
        total: u64,
    },

    /// Wrapper for `std::io::Error` from querying the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MmapError {
    /// Wrap the calling thread's last OS error as a failure of `call`.
    pub(crate) fn last_os_error(call: &'static str) -> Self {
        MmapError::Platform {
            call,
            source: io::Error::last_os_error(),
        }
    }

    /// Whether this error is an intercepted memory fault.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, MmapError::Fault { .. })
    }
}

impl From<MmapError> for io::Error {
    fn from(err: MmapError) -> Self {
        match err {
            MmapError::Io(e) => e,
            MmapError::InvalidArgument(_) | MmapError::OutOfBounds { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}
