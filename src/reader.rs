//! Fault-safe sequential and positional reads over a mapping.
//!
//! Reads from a file mapping fault when the backing store fails underneath
//! them: the file was truncated, the disk returned an I/O error, or a network
//! filesystem went away. [`FaultReader`] turns those faults into
//! [`MmapError::Fault`] values instead of letting them kill the process.
//! Faults at addresses outside the mapping are left alone.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::errors::{MmapError, Result};
use crate::fault::{self, Fault};
use crate::mmap::Mmap;
use crate::utils::page_size;

/// A cursor over a [`Mmap`] whose reads survive memory faults in the mapped
/// range.
///
/// The reader borrows the region and never owns it. Each instance is meant
/// for one thread at a time; separate readers over the same region may run
/// on separate threads.
///
/// A fault leaves the mapping untouched. Once the backing store is back,
/// for example after a truncated file grows again, the same range reads
/// normally.
///
/// # Examples
///
/// ```no_run
/// use std::io::Read;
/// use mmap_region::{FaultReader, MapOptions};
///
/// let file = std::fs::File::open("data.bin")?;
/// let map = MapOptions::new().map(&file)?;
/// let mut reader = FaultReader::new(&map);
/// let mut header = [0u8; 16];
/// match reader.read_exact(&mut header) {
///     Ok(()) => println!("header: {header:?}"),
///     Err(e) => eprintln!("backing store failed: {e}"),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct FaultReader<'a> {
    map: &'a Mmap,
    pos: u64,
}

impl<'a> FaultReader<'a> {
    /// Reader positioned at the start of `map`.
    #[must_use]
    pub fn new(map: &'a Mmap) -> Self {
        Self { map, pos: 0 }
    }

    /// The region being read.
    #[must_use]
    pub fn get_ref(&self) -> &'a Mmap {
        self.map
    }

    /// Bytes left between the cursor and the end of the region.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.size().saturating_sub(self.pos)
    }

    /// Whether the cursor is at or past the end.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of the region.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.map.len() as u64
    }

    /// Current cursor position. May be past the end after a seek.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Read into `buf` starting at `offset`, without moving the cursor.
    ///
    /// Returns the number of bytes copied, which is short only at the end
    /// of the region and 0 at or past it.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::Fault` if a fault hit the region during the copy.
    /// Nothing useful is left in `buf` in that case.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let size = self.size();
        if offset >= size || buf.is_empty() {
            return Ok(0);
        }
        let n = buf.len().min((size - offset) as usize);
        self.copy_out(offset as usize, &mut buf[..n])?;
        Ok(n)
    }

    /// Copy everything from the cursor to the end into `sink`.
    ///
    /// Data goes through a page-sized buffer; the sink is invoked while the
    /// fault window is armed. The cursor advances past every chunk the sink
    /// accepted, so on error it points at the first byte not written.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::Fault` on a fault in the region and
    /// `MmapError::Io` if the sink fails.
    pub fn write_to<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<u64> {
        let size = self.size();
        if self.pos >= size {
            return Ok(0);
        }
        let start = self.pos;
        let map = self.map;
        let base = map.as_ptr();
        let ps = page_size();
        let mut bounce = vec![0u8; ps];
        let pos = &mut self.pos;

        let (outcome, fault) = fault::catch(map.window(), || -> Result<()> {
            while *pos < size {
                let at = *pos as usize;
                let chunk = (ps - at % ps).min((size - *pos) as usize);
                // SAFETY: at..at+chunk lies inside the armed mapping.
                unsafe { fault::copy(base.add(at), &mut bounce[..chunk])? };
                if fault::tripped() {
                    return Ok(());
                }
                sink.write_all(&bounce[..chunk])?;
                *pos += chunk as u64;
            }
            Ok(())
        });

        if let Some(fault) = fault {
            return Err(self.fault_error(fault));
        }
        outcome?;
        Ok(self.pos - start)
    }

    /// Copy `dst.len()` bytes at `offset`, stopping at the first fault.
    fn copy_out(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let base = self.map.as_ptr();
        let (copied, fault) = fault::catch(self.map.window(), || {
            // SAFETY: offset..offset+dst.len() lies inside the armed mapping.
            unsafe { fault::copy(base.add(offset), dst) }
        });
        match fault {
            Some(fault) => Err(self.fault_error(fault)),
            None => copied,
        }
    }

    fn fault_error(&self, fault: Fault) -> MmapError {
        debug_assert!(self.map.window().contains(fault.addr));
        let offset = fault.addr - self.map.as_ptr() as usize;
        log::debug!(
            "memory fault at {:#x} (offset {offset}) while reading mapping at {:p}",
            fault.addr,
            self.map.as_ptr()
        );
        MmapError::Fault {
            addr: fault.addr,
            offset: offset as u64,
        }
    }
}

impl Read for FaultReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for FaultReader<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.size().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}
