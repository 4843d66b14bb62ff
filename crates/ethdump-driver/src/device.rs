//! Blackhole PCIe device handle.

use crate::access::TileAccess;
use crate::error::{DriverError, Result};
use crate::kmd::{DeviceInfo, Kmd, MAPPING_RESOURCE0_UC};
use crate::mmio::MappedRegion;
use crate::tlb::{Bar0TlbRegs, TlbWindow};
use ethdump_chip::pcie::{
    BLACKHOLE_DEVICE_ID, DEVICE_DIR, TLB_CONFIG_ADDR, TLB_CONFIG_ADDR_END, TLB_WINDOW_SIZE,
    VENDOR_ID,
};
use ethdump_chip::tile::TileCoord;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Turn a device argument into a path.
///
/// An empty string or a number below 100 selects `/dev/tenstorrent/N`;
/// anything else is taken as a path.
pub fn resolve_device_path(device: &str) -> PathBuf {
    let trimmed = device.trim();
    let number = if trimmed.is_empty() {
        Some(0)
    } else {
        trimmed.strip_prefix('+').unwrap_or(trimmed).parse::<u32>().ok()
    };
    match number {
        Some(n) if n < 100 => Path::new(DEVICE_DIR).join(n.to_string()),
        _ => PathBuf::from(device),
    }
}

/// Open Blackhole with one 2 MiB TLB window.
///
/// The window is reprogrammed directly through BAR0 rather than through the
/// kernel driver, so pointing it at a new tile or address costs one or two
/// uncached writes.
#[derive(Debug)]
pub struct PcieDevice {
    path: PathBuf,
    info: DeviceInfo,
    tlb: TlbWindow<Bar0TlbRegs>,
    window: MappedRegion,
    // Dropped last so the mappings go first
    kmd: Kmd,
}

impl PcieDevice {
    /// Open a device by path or number.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened, is not a Blackhole,
    /// has no free 2 MiB TLB, or its memory cannot be mapped.
    pub fn open(device: &str) -> Result<Self> {
        let path = resolve_device_path(device);
        tracing::debug!("Opening {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| DriverError::Open {
                path: path.clone(),
                source,
            })?;
        let kmd = Kmd::new(file);

        let info = match kmd.device_info() {
            Ok(info) if info.vendor_id == VENDOR_ID && info.device_id == BLACKHOLE_DEVICE_ID => info,
            _ => return Err(DriverError::NotBlackhole { path }),
        };

        let tlb = kmd.allocate_tlb(TLB_WINDOW_SIZE as u64)?;
        tracing::debug!("Allocated TLB {} (uc offset {:#x})", tlb.id, tlb.mmap_offset_uc);

        let bar0 = kmd.mapping(MAPPING_RESOURCE0_UC)?;
        let bar0_size = bar0.map_or(0, |m| m.mapping_size);
        let Some(bar0) = bar0.filter(|m| m.mapping_size >= TLB_CONFIG_ADDR_END) else {
            return Err(DriverError::Bar0TooSmall {
                path,
                size: bar0_size,
                required: TLB_CONFIG_ADDR_END,
            });
        };

        let config = MappedRegion::map(
            kmd.file(),
            bar0.mapping_base + TLB_CONFIG_ADDR,
            (TLB_CONFIG_ADDR_END - TLB_CONFIG_ADDR) as usize,
            "TLB configuration registers",
        )?;
        let window = MappedRegion::map(kmd.file(), tlb.mmap_offset_uc, TLB_WINDOW_SIZE, "TLB window")?;
        let tlb = TlbWindow::new(Bar0TlbRegs::init(config, tlb.id));

        tracing::info!(
            "Opened {} (bus {:#06x}, domain {})",
            path.display(),
            info.bus_dev_fn,
            info.pci_domain
        );

        Ok(Self {
            path,
            info,
            tlb,
            window,
            kmd,
        })
    }

    /// Device path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PCI identity.
    pub const fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Kernel driver handle, for host buffer allocation.
    pub const fn kmd(&self) -> &Kmd {
        &self.kmd
    }
}

impl TileAccess for PcieDevice {
    fn set_tile(&mut self, tile: TileCoord) {
        self.tlb.set_tile(tile);
    }

    fn tile(&self) -> TileCoord {
        self.tlb.tile()
    }

    fn read_u32(&mut self, addr: u64) -> u32 {
        let offset = self.tlb.translate(addr);
        self.window.read32(offset)
    }

    fn write_u32(&mut self, addr: u64, value: u32) {
        let offset = self.tlb.translate(addr);
        self.window.write32(offset, value);
    }

    fn arm_reset_on_exit(&mut self, addr: u64, value: u32) -> Result<()> {
        let tile = self.tlb.tile();
        self.kmd.set_noc_cleanup(tile.x, tile.y, addr, u64::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_map_to_device_dir() {
        assert_eq!(resolve_device_path(""), PathBuf::from("/dev/tenstorrent/0"));
        assert_eq!(resolve_device_path("3"), PathBuf::from("/dev/tenstorrent/3"));
        assert_eq!(resolve_device_path("99"), PathBuf::from("/dev/tenstorrent/99"));
    }

    #[test]
    fn paths_pass_through() {
        assert_eq!(resolve_device_path("100"), PathBuf::from("100"));
        assert_eq!(
            resolve_device_path("/dev/tenstorrent/1"),
            PathBuf::from("/dev/tenstorrent/1")
        );
    }

    #[test]
    fn missing_device_is_open_error() {
        let err = PcieDevice::open("/nonexistent/tenstorrent").unwrap_err();
        assert!(matches!(err, DriverError::Open { .. }));
    }

    #[test]
    #[ignore] // Requires hardware
    fn open_first_device() {
        let mut dev = PcieDevice::open("0").unwrap();
        dev.set_tile(TileCoord::new(25, 25));
        let _ = dev.read_u32(0xFFB2_0048);
    }
}
