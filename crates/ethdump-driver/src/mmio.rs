//! Memory-mapped windows onto the tt-kmd device file.
//!
//! Two mappings are made per device: the slice of BAR0 holding the TLB
//! configuration registers, and the 2 MiB TLB window itself. Both are
//! uncached, so every access is a PCIe transaction.

// Register words are naturally aligned; mmap returns page-aligned memory
#![allow(clippy::cast_ptr_alignment)]
#![allow(clippy::cast_possible_truncation)]

use crate::error::{DriverError, Result};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::os::unix::io::AsFd;
use std::sync::atomic::{fence, Ordering};

/// Shared mapping of part of a device file.
///
/// `offset` passed to the accessors is relative to the start the caller
/// asked for, not to the page-aligned start of the underlying mapping.
pub struct MappedRegion {
    /// Page-aligned start of the mapping
    base: *mut u8,
    /// Total mapped length
    map_len: usize,
    /// Distance from `base` to the requested start
    skew: usize,
    /// Requested length
    len: usize,
    what: &'static str,
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("what", &self.what)
            .field("base", &format_args!("{:p}", self.base))
            .field("skew", &self.skew)
            .field("len", &self.len)
            .finish()
    }
}

// SAFETY: Send - the mapping is process-wide and owned exclusively by this value.
unsafe impl Send for MappedRegion {}

// SAFETY: Sync - all accesses are bounds-checked volatile word operations.
unsafe impl Sync for MappedRegion {}

impl MappedRegion {
    /// Map `len` bytes of `fd` starting at byte `offset`.
    ///
    /// `offset` need not be page aligned; the mapping is widened to page
    /// boundaries and the skew hidden from callers.
    ///
    /// # Errors
    ///
    /// Returns an error if mmap fails.
    pub fn map<Fd: AsFd>(fd: Fd, offset: u64, len: usize, what: &'static str) -> Result<Self> {
        let page = rustix::param::page_size() as u64;
        let aligned = offset & !(page - 1);
        let skew = (offset - aligned) as usize;
        let map_len = (skew + len).next_multiple_of(page as usize);

        // SAFETY: mmap necessary for MMIO - maps device memory into the process.
        // Invariants: (1) fd is an open tt-kmd device; (2) aligned is page aligned;
        // (3) the result is valid for map_len bytes or Err.
        let base = unsafe {
            mmap(
                std::ptr::null_mut(),
                map_len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                fd,
                aligned,
            )
        }
        .map_err(|e| DriverError::map(what, e.to_string()))?;

        tracing::debug!("Mapped {what} at {base:p}: offset={offset:#x} len={len:#x}");

        Ok(Self {
            base: base.cast(),
            map_len,
            skew,
            len,
            what,
        })
    }

    /// Read a 32-bit word.
    ///
    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the requested length.
    pub fn read32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.len, "{} offset {offset:#x} out of bounds", self.what);
        // SAFETY: read_volatile necessary for MMIO - hardware can change value.
        // Invariants: (1) base valid for map_len; (2) skew+offset+4 <= map_len; (3) aligned.
        unsafe { std::ptr::read_volatile(self.base.add(self.skew + offset).cast::<u32>()) }
    }

    /// Write a 32-bit word.
    ///
    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the requested length.
    pub fn write32(&self, offset: usize, value: u32) {
        assert!(offset + 4 <= self.len, "{} offset {offset:#x} out of bounds", self.what);
        // SAFETY: write_volatile necessary for MMIO - triggers hardware side effects.
        // Invariants: (1) base valid for map_len; (2) skew+offset+4 <= map_len; (3) aligned.
        unsafe {
            std::ptr::write_volatile(self.base.add(self.skew + offset).cast::<u32>(), value);
        }
    }

    /// Write a word then order it before any later access.
    pub fn write32_fenced(&self, offset: usize, value: u32) {
        self.write32(offset, value);
        fence(Ordering::SeqCst);
    }

    /// Requested length in bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the region is empty.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        // SAFETY: munmap of the exact range returned by mmap in map(); Drop runs once.
        unsafe {
            let _ = munmap(self.base.cast(), self.map_len);
        }
        tracing::debug!("Unmapped {}", self.what);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_unaligned_file_offset() {
        let mut file = tempfile::tempfile().unwrap();
        let mut data = vec![0u8; 3 * 4096];
        data[4096 + 8..4096 + 12].copy_from_slice(&0xDEAD_BEEFu32.to_ne_bytes());
        std::io::Write::write_all(&mut file, &data).unwrap();

        let region = MappedRegion::map(&file, 4096 + 8, 16, "test").unwrap();
        assert_eq!(region.read32(0), 0xDEAD_BEEF);
        region.write32(4, 7);
        assert_eq!(region.read32(4), 7);
        assert_eq!(region.len(), 16);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn rejects_out_of_bounds() {
        let mut file = tempfile::tempfile().unwrap();
        std::io::Write::write_all(&mut file, &[0u8; 4096]).unwrap();
        let region = MappedRegion::map(&file, 0, 8, "test").unwrap();
        let _ = region.read32(8);
    }
}
