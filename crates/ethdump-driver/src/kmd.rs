//! tt-kmd control requests.
//!
//! Struct layouts follow the kernel driver's `ioctl.h` exactly. Only the
//! requests `ethdump` needs are wrapped.
//!
//! libc is used for the ioctls themselves: each request has its own struct
//! shape and rustix's typed ioctl API would need an `Ioctl` impl per request.

// FFI structs mirror the kernel ABI field for field
#![allow(clippy::cast_possible_truncation)]

use crate::error::{DriverError, Result};
use std::fs::File;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd};

/// Request numbers: `_IO(0xFA, nr)`.
mod ioctls {
    use std::os::raw::c_ulong;

    const fn io(nr: u8) -> c_ulong {
        (0xFA << 8) | (nr as c_ulong)
    }

    pub const GET_DEVICE_INFO: c_ulong = io(0x00);
    pub const QUERY_MAPPINGS: c_ulong = io(0x02);
    pub const ALLOCATE_DMA_BUF: c_ulong = io(0x03);
    pub const PIN_PAGES: c_ulong = io(0x07);
    pub const ALLOCATE_TLB: c_ulong = io(0x0B);
    pub const SET_NOC_CLEANUP: c_ulong = io(0x0E);
}

/// Mapping id of BAR0, uncached.
pub const MAPPING_RESOURCE0_UC: u32 = 1;

/// `ALLOCATE_DMA_BUF` flag: the buffer will be a NoC DMA target.
pub const ALLOCATE_DMA_BUF_NOC_DMA: u8 = 2;

/// `PIN_PAGES` flag: the pages will be a NoC DMA target.
pub const PIN_PAGES_NOC_DMA: u32 = 2;

/// `PIN_PAGES` flag: allocate the NoC address top-down.
pub const PIN_PAGES_NOC_TOP_DOWN: u32 = 4;

/// Maximum number of mappings returned by `QUERY_MAPPINGS`.
const MAX_MAPPINGS: usize = 8;

#[repr(C)]
#[derive(Debug, Default)]
struct GetDeviceInfo {
    in_output_size_bytes: u32,
    out: DeviceInfo,
}

/// Identity reported by `GET_DEVICE_INFO`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceInfo {
    /// Size of this struct as filled in by the driver
    pub output_size_bytes: u32,
    /// PCI vendor id
    pub vendor_id: u16,
    /// PCI device id
    pub device_id: u16,
    /// PCI subsystem vendor id
    pub subsystem_vendor_id: u16,
    /// PCI subsystem id
    pub subsystem_id: u16,
    /// `[0:2]` function, `[3:7]` device, `[8:15]` bus
    pub bus_dev_fn: u16,
    /// log2 of the largest DMA buffer the driver will allocate
    pub max_dma_buf_size_log2: u16,
    /// PCI domain
    pub pci_domain: u16,
}

/// One BAR mapping reported by `QUERY_MAPPINGS`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Mapping {
    /// Mapping id (`MAPPING_RESOURCE0_UC`, ...)
    pub mapping_id: u32,
    reserved: u32,
    /// mmap offset of the BAR
    pub mapping_base: u64,
    /// Size of the BAR
    pub mapping_size: u64,
}

#[repr(C)]
#[derive(Debug, Default)]
struct QueryMappings {
    output_mapping_count: u32,
    reserved: u32,
    mappings: [Mapping; MAX_MAPPINGS],
}

#[repr(C)]
#[derive(Debug, Default)]
struct AllocateDmaBuf {
    requested_size: u32,
    buf_index: u8,
    flags: u8,
    reserved0: [u8; 2],
    reserved1: [u64; 2],
    out: DmaBuf,
}

/// Result of `ALLOCATE_DMA_BUF`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DmaBuf {
    /// Physical address or IOVA
    pub physical_address: u64,
    /// mmap offset for mapping the buffer
    pub mapping_offset: u64,
    /// Allocated size
    pub size: u32,
    reserved0: u32,
    /// NoC address (valid with `ALLOCATE_DMA_BUF_NOC_DMA`)
    pub noc_address: u64,
    reserved1: u64,
}

#[repr(C)]
#[derive(Debug, Default)]
struct PinPages {
    output_size_bytes: u32,
    flags: u32,
    virtual_address: u64,
    size: u64,
    out: PinnedPages,
}

/// Result of `PIN_PAGES` (extended output).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct PinnedPages {
    /// Physical address or IOVA
    pub physical_address: u64,
    /// NoC address of the pinned range
    pub noc_address: u64,
}

#[repr(C)]
#[derive(Debug, Default)]
struct AllocateTlb {
    size: u64,
    reserved: u64,
    out: Tlb,
}

/// Result of `ALLOCATE_TLB`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Tlb {
    /// TLB index
    pub id: u32,
    reserved0: u32,
    /// mmap offset of the uncached window
    pub mmap_offset_uc: u64,
    /// mmap offset of the write-combining window
    pub mmap_offset_wc: u64,
    reserved1: u64,
}

#[repr(C)]
#[derive(Debug, Default)]
struct SetNocCleanup {
    argsz: u32,
    flags: u32,
    enabled: u8,
    x: u8,
    y: u8,
    noc: u8,
    reserved0: u32,
    addr: u64,
    data: u64,
}

/// Open tt-kmd device file.
#[derive(Debug)]
pub struct Kmd {
    file: File,
}

impl Kmd {
    /// Wrap an already opened device file.
    pub fn new(file: File) -> Self {
        Self { file }
    }

    /// Issue `request` with `arg` as the argument struct.
    fn ioctl<T>(&self, name: &'static str, request: std::os::raw::c_ulong, arg: &mut T) -> Result<()> {
        // SAFETY: ioctl necessary - tt-kmd has no other interface.
        // Invariants: (1) file is an open tt-kmd device; (2) arg is a #[repr(C)] struct
        // matching the request's kernel layout; (3) arg lives across the call.
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, std::ptr::from_mut(arg)) };
        if ret < 0 {
            return Err(DriverError::ioctl(name));
        }
        Ok(())
    }

    /// Query PCI identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub fn device_info(&self) -> Result<DeviceInfo> {
        let mut req = GetDeviceInfo {
            in_output_size_bytes: std::mem::size_of::<DeviceInfo>() as u32,
            ..Default::default()
        };
        self.ioctl("GET_DEVICE_INFO", ioctls::GET_DEVICE_INFO, &mut req)?;
        Ok(req.out)
    }

    /// Allocate a TLB window of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver has no free TLB of that size (or predates TLB allocation).
    pub fn allocate_tlb(&self, size: u64) -> Result<Tlb> {
        let mut req = AllocateTlb {
            size,
            ..Default::default()
        };
        self.ioctl("ALLOCATE_TLB", ioctls::ALLOCATE_TLB, &mut req)?;
        Ok(req.out)
    }

    /// List BAR mappings.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub fn query_mappings(&self) -> Result<Vec<Mapping>> {
        let mut req = QueryMappings {
            output_mapping_count: MAX_MAPPINGS as u32,
            ..Default::default()
        };
        self.ioctl("QUERY_MAPPINGS", ioctls::QUERY_MAPPINGS, &mut req)?;
        Ok(req.mappings.to_vec())
    }

    /// Find a mapping by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails; a missing mapping is `Ok(None)`.
    pub fn mapping(&self, mapping_id: u32) -> Result<Option<Mapping>> {
        Ok(self
            .query_mappings()?
            .into_iter()
            .find(|m| m.mapping_id == mapping_id && m.mapping_size != 0))
    }

    /// Pin `size` bytes at `virtual_address` for NoC DMA.
    ///
    /// # Errors
    ///
    /// Returns an error if the pages cannot be pinned (e.g. not contiguous without an IOMMU).
    pub fn pin_pages(&self, virtual_address: u64, size: u64) -> Result<PinnedPages> {
        let mut req = PinPages {
            output_size_bytes: std::mem::size_of::<PinnedPages>() as u32,
            flags: PIN_PAGES_NOC_DMA | PIN_PAGES_NOC_TOP_DOWN,
            virtual_address,
            size,
            ..Default::default()
        };
        self.ioctl("PIN_PAGES", ioctls::PIN_PAGES, &mut req)?;
        Ok(req.out)
    }

    /// Allocate a driver-owned DMA buffer reachable from the NoC.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver cannot allocate contiguous memory of that size.
    pub fn allocate_dma_buf(&self, size: u32) -> Result<DmaBuf> {
        let mut req = AllocateDmaBuf {
            requested_size: size,
            flags: ALLOCATE_DMA_BUF_NOC_DMA,
            ..Default::default()
        };
        self.ioctl("ALLOCATE_DMA_BUF", ioctls::ALLOCATE_DMA_BUF, &mut req)?;
        Ok(req.out)
    }

    /// Ask the driver to write `data` to `addr` on tile `(x, y)` when the
    /// file is closed, including when the process is killed.
    ///
    /// # Errors
    ///
    /// Older drivers reject this with `EINVAL`.
    pub fn set_noc_cleanup(&self, x: u8, y: u8, addr: u64, data: u64) -> Result<()> {
        let mut req = SetNocCleanup {
            argsz: std::mem::size_of::<SetNocCleanup>() as u32,
            enabled: 1,
            x,
            y,
            addr,
            data,
            ..Default::default()
        };
        self.ioctl("SET_NOC_CLEANUP", ioctls::SET_NOC_CLEANUP, &mut req)
    }

    /// The underlying device file.
    pub fn file(&self) -> &File {
        &self.file
    }
}

impl AsFd for Kmd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_numbers() {
        assert_eq!(ioctls::GET_DEVICE_INFO, 0xFA00);
        assert_eq!(ioctls::PIN_PAGES, 0xFA07);
        assert_eq!(ioctls::SET_NOC_CLEANUP, 0xFA0E);
    }

    #[test]
    fn abi_sizes() {
        assert_eq!(std::mem::size_of::<Mapping>(), 24);
        assert_eq!(std::mem::size_of::<QueryMappings>(), 8 + 8 * 24);
        assert_eq!(std::mem::size_of::<PinPages>(), 24 + 16);
        assert_eq!(std::mem::size_of::<AllocateTlb>(), 16 + 32);
        assert_eq!(std::mem::size_of::<AllocateDmaBuf>(), 24 + 40);
        assert_eq!(std::mem::size_of::<SetNocCleanup>(), 32);
    }
}
