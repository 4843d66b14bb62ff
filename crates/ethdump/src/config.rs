//! Validated capture settings.

use crate::error::{CaptureError, Result};
use ethdump_chip::tile::{TileCoord, DEFAULT_ETHERNET_X};
use std::path::PathBuf;

/// Smallest device ring.
pub const DEVICE_RING_MIN: u32 = 4 << 10;
/// Largest device ring; bounded by tile L1.
pub const DEVICE_RING_MAX: u32 = 256 << 10;
/// Default device ring.
pub const DEVICE_RING_DEFAULT: u32 = 256 << 10;

/// Smallest host ring.
pub const HOST_RING_MIN: u32 = 4 << 10;
/// Largest host ring.
pub const HOST_RING_MAX: u32 = 2 << 30;
/// Default host ring.
pub const HOST_RING_DEFAULT: u32 = 2 << 20;

/// Everything `ethdump` needs to know about one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Device path or number
    pub device: String,
    /// X coordinate of the Ethernet tile
    pub ethernet_x: u8,
    /// Bytes of tile L1 used as the RX ring
    pub device_ring_size: u32,
    /// Bytes of pinned host memory used as the capture ring
    pub host_ring_size: u32,
    /// Output file; `tt_<x>.pcap` if unset
    pub output: Option<PathBuf>,
    /// Loopback mode to retrain the link with
    pub loopback_mode: Option<u8>,
    /// Print the Ethernet tile status table
    pub hwinfo: bool,
    /// Print the TX header templates
    pub txheaders: bool,
    /// Send a counter-stamped packet whenever the link is idle
    pub generate_traffic: bool,
    /// Give up after this many back-to-back loss recoveries
    pub max_recoveries: Option<u32>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            ethernet_x: DEFAULT_ETHERNET_X,
            device_ring_size: DEVICE_RING_DEFAULT,
            host_ring_size: HOST_RING_DEFAULT,
            output: None,
            loopback_mode: None,
            hwinfo: false,
            txheaders: false,
            generate_traffic: false,
            max_recoveries: None,
        }
    }
}

fn check_ring(which: &'static str, size: u32, min: u32, max: u32) -> Result<()> {
    if size.is_power_of_two() && (min..=max).contains(&size) {
        Ok(())
    } else {
        Err(CaptureError::InvalidRingSize {
            which,
            size: u64::from(size),
            min: u64::from(min),
            max: u64::from(max),
        })
    }
}

impl CaptureConfig {
    /// Check ring sizes and the tile column.
    ///
    /// # Errors
    ///
    /// Returns the first constraint that does not hold.
    pub fn validate(&self) -> Result<()> {
        check_ring("device", self.device_ring_size, DEVICE_RING_MIN, DEVICE_RING_MAX)?;
        check_ring("host", self.host_ring_size, HOST_RING_MIN, HOST_RING_MAX)?;
        if self.host_ring_size < self.device_ring_size {
            return Err(CaptureError::HostRingTooSmall {
                host: self.host_ring_size,
                device: self.device_ring_size,
            });
        }
        self.ethernet_tile().map(|_| ())
    }

    /// The Ethernet tile at `ethernet_x`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NotEthernetColumn`] if X is in neither row.
    pub fn ethernet_tile(&self) -> Result<TileCoord> {
        TileCoord::ethernet(self.ethernet_x).ok_or(CaptureError::NotEthernetColumn(self.ethernet_x))
    }

    /// Whether to capture. Printing tables alone does not capture unless an
    /// output file or traffic generation was also asked for.
    pub fn capturing(&self) -> bool {
        !(self.hwinfo || self.txheaders) || self.output.is_some() || self.generate_traffic
    }

    /// Output path, defaulting to `tt_<x>.pcap`.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("tt_{}.pcap", self.ethernet_x)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CaptureConfig::default();
        config.validate().unwrap();
        assert!(config.capturing());
        assert_eq!(config.output_path(), PathBuf::from("tt_25.pcap"));
    }

    #[test]
    fn ring_bounds() {
        let mut config = CaptureConfig {
            device_ring_size: 512 << 10,
            ..CaptureConfig::default()
        };
        assert!(matches!(config.validate(), Err(CaptureError::InvalidRingSize { which: "device", .. })));

        config.device_ring_size = 3 << 12;
        assert!(config.validate().is_err());

        config.device_ring_size = 4 << 10;
        config.host_ring_size = 2 << 30;
        config.validate().unwrap();

        config.host_ring_size = 2 << 10;
        assert!(matches!(config.validate(), Err(CaptureError::InvalidRingSize { which: "host", .. })));
    }

    #[test]
    fn host_ring_not_smaller_than_device_ring() {
        let config = CaptureConfig {
            device_ring_size: 256 << 10,
            host_ring_size: 128 << 10,
            ..CaptureConfig::default()
        };
        assert!(matches!(config.validate(), Err(CaptureError::HostRingTooSmall { .. })));
    }

    #[test]
    fn tile_column() {
        let config = CaptureConfig {
            ethernet_x: 9,
            ..CaptureConfig::default()
        };
        assert!(matches!(config.validate(), Err(CaptureError::NotEthernetColumn(9))));
        let config = CaptureConfig {
            ethernet_x: 3,
            ..CaptureConfig::default()
        };
        assert_eq!(config.ethernet_tile().unwrap(), TileCoord::new(3, 1));
    }

    #[test]
    fn print_only_runs_skip_capture() {
        let mut config = CaptureConfig {
            hwinfo: true,
            ..CaptureConfig::default()
        };
        assert!(!config.capturing());
        config.generate_traffic = true;
        assert!(config.capturing());
        config.generate_traffic = false;
        config.output = Some(PathBuf::from("x.pcap"));
        assert!(config.capturing());
        assert_eq!(config.output_path(), PathBuf::from("x.pcap"));
    }
}
