//! # mmap-region: portable memory-mapped regions with fault-safe reads
//!
//! This crate maps files or anonymous memory behind one byte-addressable
//! handle on POSIX systems (including the page-unit `mmap2` call of 32-bit
//! Linux) and Windows, and offers a reader that survives faults in the
//! mapped range.
//!
//! ## Features
//!
//! - **One flag set everywhere**: read-only, read-write, copy-on-write,
//!   executable and anonymous translate to each platform's native constants
//! - **Ownership-checked lifetime**: [`Mmap::unmap`] consumes the handle, and
//!   borrowed slices cannot outlive it
//! - **Lock, unlock, flush**: pin pages in memory and write dirty pages back
//! - **Fault-safe reads**: [`FaultReader`] copies through the kernel, so a
//!   failed backing store inside the region becomes [`MmapError::Fault`]
//!   instead of `SIGBUS`/`SIGSEGV` or a Windows in-page error; no signal
//!   handler is installed
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::io::Read;
//! use mmap_region::{FaultReader, MapOptions, Protection};
//!
//! let file = std::fs::OpenOptions::new().read(true).write(true).open("data.bin")?;
//! let mut map = MapOptions::new().protection(Protection::READWRITE).map(&file)?;
//! map.update_region(100, b"Hello, mmap!")?;
//! map.flush()?;
//!
//! let mut text = [0u8; 12];
//! FaultReader::new(&map).read_at(&mut text, 100)?;
//! assert_eq!(&text, b"Hello, mmap!");
//! map.unmap()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`errors`]: Error type for all operations
//! - [`flags`]: Protection and mapping flags
//! - [`options`]: The `MapOptions` builder
//! - [`mmap`]: The `Mmap` region handle
//! - [`reader`]: The fault-safe `FaultReader`
//! - [`registry`]: Table of Windows mapping-object handles
//! - [`manager`]: Free-function entry points
//! - [`utils`]: Page size, alignment and bounds helpers

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![deny(missing_docs)]

pub mod errors;
pub mod flags;
pub mod manager;
pub mod mmap;
pub mod options;
pub mod reader;
pub mod registry;
pub mod utils;

mod fault;
mod flush;
mod lock;
mod sys;

pub use errors::{MmapError, Result};
pub use flags::{MapFlags, Protection};
pub use manager::{map, map_anon, map_region};
pub use mmap::Mmap;
pub use options::MapOptions;
pub use reader::FaultReader;
pub use registry::{HandleTable, RawMappingHandle};
