//! Portable protection and mapping flags.
//!
//! The values are stable and independent of the host OS; each backend
//! translates them into native constants.

bitflags::bitflags! {
    /// Access protection and visibility requested for a mapping.
    ///
    /// `READONLY` is the empty set. `COPYONWRITE` takes precedence over
    /// `READWRITE` when both are set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Protection: u32 {
        /// Read-only, shared mapping. Writing through it is a fault.
        const READONLY = 0;
        /// Read-write, shared mapping. Writes reach the backing file.
        const READWRITE = 1 << 1;
        /// Private copy-on-write mapping. Writes stay in this process.
        const COPYONWRITE = 1 << 2;
        /// Pages are additionally executable.
        const EXECUTABLE = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Flags that change how a mapping is backed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MapFlags: u32 {
        /// Not backed by a file. Any backing handle is ignored.
        const ANONYMOUS = 1 << 0;
    }
}

impl Protection {
    /// Whether pages of this mapping accept writes.
    #[must_use]
    pub fn is_writable(self) -> bool {
        self.intersects(Protection::READWRITE | Protection::COPYONWRITE)
    }

    /// Whether writes are kept private to the mapping.
    #[must_use]
    pub fn is_private(self) -> bool {
        self.contains(Protection::COPYONWRITE)
    }

    /// Whether the executable bit is requested.
    #[must_use]
    pub fn is_executable(self) -> bool {
        self.contains(Protection::EXECUTABLE)
    }
}
