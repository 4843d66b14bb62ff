//! Host memory the device can write into.
//!
//! The Ethernet tile pushes captured frames and ring metadata over the NoC
//! into host memory, which therefore has to be pinned and have a NoC
//! address. tt-kmd offers several ways to get such memory and none of them
//! works everywhere, so they are tried in order:
//!
//! 1. Plain anonymous pages, pinned. Works for a single page, or for any
//!    size when an IOMMU is enabled.
//! 2. An anonymous huge page of exactly the requested size, pinned. Works
//!    when that size is a configured huge page size.
//! 3. A DMA buffer allocated by the driver and mapped back. Works up to the
//!    driver's limit, subject to fragmentation.

// mmap lengths and offsets cross between usize and u64
#![allow(clippy::cast_possible_truncation)]

use crate::error::{DriverError, Result};
use crate::kmd::{DmaBuf, Kmd, PinnedPages};
use rustix::mm::{mmap, mmap_anonymous, munmap, MapFlags, ProtFlags};
use std::os::unix::io::AsFd;
use std::ptr::NonNull;

/// Host page size.
pub fn host_page_size() -> usize {
    rustix::param::page_size()
}

/// How a [`HostBuffer`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    /// Anonymous pages pinned with `PIN_PAGES`
    Anonymous,
    /// One huge page pinned with `PIN_PAGES`
    HugePage,
    /// Driver-allocated DMA buffer
    DriverDma,
    /// Plain heap memory with a made-up NoC address; never seen by a device
    Owned,
}

/// One way of obtaining pinned memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocStrategy {
    /// Anonymous mmap + `PIN_PAGES`
    PinnedPages,
    /// `MAP_HUGETLB` mmap + `PIN_PAGES`
    PinnedHugePages,
    /// `ALLOCATE_DMA_BUF` + shared mmap
    DriverDma,
}

/// Strategies in the order they are tried.
pub const ALLOC_CASCADE: [AllocStrategy; 3] = [
    AllocStrategy::PinnedPages,
    AllocStrategy::PinnedHugePages,
    AllocStrategy::DriverDma,
];

/// The driver requests the allocation cascade relies on.
///
/// DMA buffers are mapped through the driver's file descriptor.
pub trait PinningDriver: AsFd {
    /// Pin `size` bytes at `virtual_address` and give them a NoC address.
    ///
    /// # Errors
    ///
    /// Returns the driver's refusal.
    fn pin_pages(&self, virtual_address: u64, size: u64) -> Result<PinnedPages>;

    /// Allocate a driver-owned DMA buffer reachable from the NoC.
    ///
    /// # Errors
    ///
    /// Returns the driver's refusal.
    fn allocate_dma_buf(&self, size: u32) -> Result<DmaBuf>;
}

impl PinningDriver for Kmd {
    fn pin_pages(&self, virtual_address: u64, size: u64) -> Result<PinnedPages> {
        Kmd::pin_pages(self, virtual_address, size)
    }

    fn allocate_dma_buf(&self, size: u32) -> Result<DmaBuf> {
        Kmd::allocate_dma_buf(self, size)
    }
}

/// Owns an mmap until it is handed to a [`HostBuffer`].
struct MapGuard {
    ptr: NonNull<u8>,
    len: usize,
}

impl MapGuard {
    fn anonymous(len: usize, flags: MapFlags) -> Result<Self> {
        // SAFETY: fresh private anonymous mapping; no existing memory is affected.
        let ptr = unsafe {
            mmap_anonymous(std::ptr::null_mut(), len, ProtFlags::READ | ProtFlags::WRITE, flags)
        }
        .map_err(|e| DriverError::map("anonymous host memory", e))?;
        Self::from_raw(ptr, len)
    }

    fn shared(fd: impl AsFd, offset: u64, len: usize) -> Result<Self> {
        // SAFETY: shared mapping of a DMA buffer the driver just allocated at `offset`.
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                fd,
                offset,
            )
        }
        .map_err(|e| DriverError::map("driver DMA buffer", e))?;
        Self::from_raw(ptr, len)
    }

    fn from_raw(ptr: *mut std::ffi::c_void, len: usize) -> Result<Self> {
        NonNull::new(ptr.cast::<u8>())
            .map(|ptr| Self { ptr, len })
            .ok_or_else(|| DriverError::map("host memory", "mmap returned null"))
    }

    fn addr(&self) -> u64 {
        self.ptr.as_ptr() as u64
    }

    fn release(self) -> NonNull<u8> {
        let ptr = self.ptr;
        std::mem::forget(self);
        ptr
    }
}

impl Drop for MapGuard {
    fn drop(&mut self) {
        // SAFETY: unmaps exactly the range mapped by the constructor; nothing else refers to it.
        unsafe {
            let _ = munmap(self.ptr.as_ptr().cast(), self.len);
        }
    }
}

impl AllocStrategy {
    /// Try this strategy once. Partial allocations are released on failure.
    ///
    /// # Errors
    ///
    /// Returns the mmap or ioctl failure that stopped this attempt.
    pub fn attempt<K: PinningDriver + ?Sized>(self, kmd: &K, size: usize) -> Result<HostBuffer> {
        let (map, noc_addr, backing) = match self {
            Self::PinnedPages => {
                let map = MapGuard::anonymous(size, MapFlags::PRIVATE)?;
                let pinned = kmd.pin_pages(map.addr(), size as u64)?;
                (map, pinned.noc_address, Backing::Anonymous)
            }
            Self::PinnedHugePages => {
                let huge = libc::MAP_HUGETLB | ((size.trailing_zeros() as libc::c_int) << libc::MAP_HUGE_SHIFT);
                let flags = MapFlags::PRIVATE | MapFlags::from_bits_retain(huge as u32);
                let map = MapGuard::anonymous(size, flags)?;
                let pinned = kmd.pin_pages(map.addr(), size as u64)?;
                (map, pinned.noc_address, Backing::HugePage)
            }
            Self::DriverDma => {
                let request = u32::try_from(size)
                    .map_err(|_| DriverError::map("driver DMA buffer", "size exceeds 4 GiB"))?;
                let dma = kmd.allocate_dma_buf(request)?;
                let map = MapGuard::shared(kmd.as_fd(), dma.mapping_offset, size)?;
                (map, dma.noc_address, Backing::DriverDma)
            }
        };
        Ok(HostBuffer {
            ptr: map.release(),
            size,
            noc_addr,
            backing,
            _owned: None,
        })
    }
}

/// Pinned host memory with a NoC address.
///
/// The device writes into this memory behind the compiler's back, so all
/// word accesses are volatile and take `&self`.
pub struct HostBuffer {
    ptr: NonNull<u8>,
    size: usize,
    noc_addr: u64,
    backing: Backing,
    /// Storage for `Backing::Owned`
    _owned: Option<Vec<u64>>,
}

impl std::fmt::Debug for HostBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBuffer")
            .field("ptr", &format_args!("{:p}", self.ptr))
            .field("size", &self.size)
            .field("noc_addr", &format_args!("{:#x}", self.noc_addr))
            .field("backing", &self.backing)
            .finish()
    }
}

// SAFETY: Send - the buffer exclusively owns its mapping or heap storage.
unsafe impl Send for HostBuffer {}

impl HostBuffer {
    /// Allocate `size` bytes of pinned memory, trying each strategy of
    /// [`ALLOC_CASCADE`] in turn.
    ///
    /// `size` must be a power of two and at least one host page.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::HostBufferUnavailable`] if every strategy fails.
    pub fn allocate<K: PinningDriver + ?Sized>(kmd: &K, size: usize) -> Result<Self> {
        for strategy in ALLOC_CASCADE {
            match strategy.attempt(kmd, size) {
                Ok(buf) => {
                    tracing::debug!("Host buffer of {size:#x} bytes via {strategy:?} at NoC {:#x}", buf.noc_addr);
                    return Ok(buf);
                }
                Err(e) => tracing::debug!("{strategy:?} failed for {size:#x} bytes: {e}"),
            }
        }
        Err(DriverError::HostBufferUnavailable { size })
    }

    /// Zeroed heap memory posing as a host buffer at `noc_addr`.
    ///
    /// For simulation only: no device can reach it.
    pub fn owned(size: usize, noc_addr: u64) -> Self {
        let mut storage = vec![0u64; size.div_ceil(8)];
        let ptr = NonNull::from(storage.as_mut_slice()).cast::<u8>();
        Self {
            ptr,
            size,
            noc_addr,
            backing: Backing::Owned,
            _owned: Some(storage),
        }
    }

    /// Size in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Address at which the device sees this buffer.
    pub const fn noc_addr(&self) -> u64 {
        self.noc_addr
    }

    /// How the memory was obtained.
    pub const fn backing(&self) -> Backing {
        self.backing
    }

    /// Volatile read of the word at byte `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the word is out of bounds or misaligned.
    pub fn read_u32(&self, offset: usize) -> u32 {
        assert!(offset % 4 == 0 && offset + 4 <= self.size, "host buffer offset {offset:#x} invalid");
        // SAFETY: in bounds and aligned (checked above); ptr is valid for size bytes.
        unsafe { std::ptr::read_volatile(self.ptr.as_ptr().add(offset).cast::<u32>()) }
    }

    /// Volatile write of the word at byte `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the word is out of bounds or misaligned.
    pub fn write_u32(&self, offset: usize, value: u32) {
        assert!(offset % 4 == 0 && offset + 4 <= self.size, "host buffer offset {offset:#x} invalid");
        // SAFETY: in bounds and aligned (checked above); ptr is valid for size bytes.
        unsafe { std::ptr::write_volatile(self.ptr.as_ptr().add(offset).cast::<u32>(), value) }
    }

    /// Copy `bytes` into the buffer at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn write_bytes(&self, offset: usize, bytes: &[u8]) {
        assert!(offset + bytes.len() <= self.size, "host buffer range out of bounds");
        // SAFETY: in bounds (checked above); source is a distinct Rust slice.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.as_ptr().add(offset), bytes.len());
        }
    }

    /// Borrow `len` bytes at `offset`.
    ///
    /// Only ranges the device has finished writing (below the published
    /// `write_ptr` and not yet handed back) may be borrowed.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        assert!(offset + len <= self.size, "host buffer range out of bounds");
        // SAFETY: in bounds (checked above); the device does not write the range while borrowed.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().add(offset), len) }
    }
}

impl Drop for HostBuffer {
    fn drop(&mut self) {
        if self.backing != Backing::Owned {
            // SAFETY: ptr/size are exactly what MapGuard mapped; Drop runs once.
            unsafe {
                let _ = munmap(self.ptr.as_ptr().cast(), self.size);
            }
        }
    }
}
