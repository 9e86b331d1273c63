//! Registry from mapped view address to the kernel object that backs it.
//!
//! Windows maps in two steps: a file-mapping object, then a view of it. The
//! portable unmap contract only carries the view's address and length, so the
//! object handle is recorded here when the view is created and taken back out
//! when it is released. Every table operation goes through a single mutex,
//! held only for the insert or remove itself.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::errors::{MmapError, Result};

/// Raw value of a platform mapping-object handle.
pub type RawMappingHandle = isize;

/// Table of live views and their companion mapping handles.
///
/// A table can be shared across threads; map and unmap calls on different
/// regions may run concurrently. Use [`HandleTable::global`] for the process
/// default, or inject a private table through
/// [`MapOptions::registry`](crate::MapOptions::registry).
#[derive(Debug, Default)]
pub struct HandleTable {
    entries: Mutex<HashMap<usize, RawMappingHandle>>,
}

impl HandleTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table used when no registry is injected.
    #[must_use]
    pub fn global() -> Arc<HandleTable> {
        static GLOBAL: OnceLock<Arc<HandleTable>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(HandleTable::new())).clone()
    }

    /// Record the mapping handle for a newly created view.
    ///
    /// Returns the handle previously recorded under the same address, which
    /// can only happen if a view was released without going through this
    /// table.
    pub fn record(&self, view: usize, handle: RawMappingHandle) -> Option<RawMappingHandle> {
        let previous = self.entries.lock().insert(view, handle);
        if let Some(stale) = previous {
            log::warn!("view {view:#x} re-registered; dropping stale handle {stale:#x}");
        }
        previous
    }

    /// Remove and return the handle recorded for `view`.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::UnknownMapping` if no entry exists.
    pub fn take(&self, view: usize) -> Result<RawMappingHandle> {
        let handle = self.entries.lock().remove(&view);
        handle.ok_or_else(|| {
            log::warn!("no mapping handle recorded for view {view:#x}");
            MmapError::UnknownMapping(view)
        })
    }

    /// Number of live views.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no views are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn record_then_take() {
        let table = HandleTable::new();
        assert!(table.record(0x1000, 7).is_none());
        assert_eq!(table.len(), 1);
        assert_eq!(table.take(0x1000).expect("take"), 7);
        assert!(table.is_empty());
    }

    #[test]
    fn take_missing_is_unknown_mapping() {
        let table = HandleTable::new();
        match table.take(0x2000) {
            Err(MmapError::UnknownMapping(addr)) => assert_eq!(addr, 0x2000),
            other => panic!("expected UnknownMapping, got {other:?}"),
        }
    }

    #[test]
    fn take_is_single_shot() {
        let table = HandleTable::new();
        table.record(0x3000, 1);
        table.take(0x3000).expect("first take");
        assert!(table.take(0x3000).is_err());
    }

    #[test]
    fn concurrent_cycles_leave_table_empty() {
        let table = Arc::new(HandleTable::new());
        let workers: Vec<_> = (0..8usize)
            .map(|t| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for i in 0..500usize {
                        let view = (t << 28) | (i << 12);
                        table.record(view, (t * 1000 + i) as RawMappingHandle);
                        assert_eq!(
                            table.take(view).expect("take"),
                            (t * 1000 + i) as RawMappingHandle
                        );
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().expect("worker panicked");
        }
        assert!(table.is_empty());
    }
}
