//! Pinning a mapping in physical memory.

use std::sync::atomic::Ordering;

use crate::errors::Result;
use crate::mmap::Mmap;
use crate::sys;

impl Mmap {
    /// Lock the mapping's pages so they cannot be swapped out.
    ///
    /// Locked pages count against `RLIMIT_MEMLOCK` on Unix and the working
    /// set quota on Windows, so this often needs elevated privileges.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::Platform` with the OS error from `mlock` or
    /// `VirtualLock`.
    pub fn lock(&self) -> Result<()> {
        // SAFETY: the whole range is mapped for the life of self.
        unsafe { sys::lock(self.as_ptr().cast_mut(), self.len())? };
        self.locked.store(true, Ordering::Release);
        Ok(())
    }

    /// Undo [`lock`](Mmap::lock).
    ///
    /// # Errors
    ///
    /// Returns `MmapError::Platform` if the OS refuses, including when the
    /// mapping was never locked.
    pub fn unlock(&self) -> Result<()> {
        // munlock succeeds on unlocked pages, VirtualUnlock does not.
        #[cfg(unix)]
        if !self.is_locked() {
            return Err(crate::errors::MmapError::Platform {
                call: "munlock",
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "the segment is already unlocked",
                ),
            });
        }
        // SAFETY: as in lock.
        unsafe { sys::unlock(self.as_ptr().cast_mut(), self.len())? };
        self.locked.store(false, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::MmapError;
    use crate::flags::Protection;
    use crate::options::MapOptions;

    #[test]
    fn unlock_without_lock_is_a_platform_error() {
        let m = MapOptions::new()
            .len(4096)
            .protection(Protection::READWRITE)
            .map_anon()
            .expect("map");
        assert!(matches!(m.unlock(), Err(MmapError::Platform { .. })));
        assert!(!m.is_locked());
    }

    #[test]
    fn lock_then_unlock() {
        let m = MapOptions::new()
            .len(4096)
            .protection(Protection::READWRITE)
            .map_anon()
            .expect("map");
        match m.lock() {
            Ok(()) => {
                assert!(m.is_locked());
                m.unlock().expect("unlock after lock");
                assert!(!m.is_locked());
            }
            // Without the privilege or headroom to pin memory.
            Err(MmapError::Platform { call, .. }) => {
                assert!(call == "mlock" || call == "VirtualLock");
                assert!(!m.is_locked());
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
