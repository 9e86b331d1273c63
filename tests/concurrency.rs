//! Concurrent mapping and unmapping.

use std::sync::Arc;
use std::thread;

use mmap_region::{HandleTable, MapOptions, Protection};

const THREADS: usize = 8;
const CYCLES: usize = 200;

#[test]
fn concurrent_map_unmap_cycles() {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = Arc::new(HandleTable::new());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..CYCLES {
                    let len = 4096 * (1 + (t + i) % 4);
                    let mut m = MapOptions::new()
                        .len(len)
                        .protection(Protection::READWRITE)
                        .registry(Arc::clone(&registry))
                        .map_anon()
                        .expect("map");
                    let stamp = [t as u8, i as u8];
                    m.update_region(len as u64 - 2, &stamp).expect("write");
                    assert_eq!(&m[len - 2..], &stamp);
                    m.unmap().expect("unmap");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("worker");
    }

    // Only the Windows backend records views; elsewhere the table stays empty.
    #[cfg(windows)]
    assert!(registry.is_empty());
}

#[test]
#[cfg(windows)]
fn dropped_mappings_are_released() {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = Arc::new(HandleTable::new());
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..CYCLES / 4 {
                    let m = MapOptions::new()
                        .len(8192)
                        .registry(Arc::clone(&registry))
                        .map_anon()
                        .expect("map");
                    assert_eq!(m.len(), 8192);
                }
            });
        }
    });
    assert!(registry.is_empty());
}

#[test]
#[cfg(windows)]
fn global_registry_tracks_live_views() {
    let before = HandleTable::global().len();
    let m = MapOptions::new().len(4096).map_anon().expect("map");
    assert_eq!(HandleTable::global().len(), before + 1);
    m.unmap().expect("unmap");
    assert_eq!(HandleTable::global().len(), before);
}
