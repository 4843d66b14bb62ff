//! Error types for capture operations

use ethdump_chip::tile::TileCoord;
use ethdump_driver::DriverError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Errors that end a capture.
///
/// Everything here is fatal. Packet loss reported by the device is not an
/// error: the capture loop handles it by reconfiguring.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Device access failed
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A ring entry header has reserved bits set or is too short
    #[error(
        "Ring is corrupt at read pointer {read_ptr:#x} / write pointer {write_ptr:#x}, \
         as hardware metadata for a ring entry should never be {header:#010x}"
    )]
    RingCorrupt {
        /// Host read pointer
        read_ptr: u32,
        /// Last observed device write pointer
        write_ptr: u32,
        /// Offending header, after byte swap
        header: u32,
    },

    /// The device did not answer a liveness request
    #[error("Timed out waiting for echo from device")]
    LivenessTimeout,

    /// Packet loss kept recurring
    #[error("Dropped packets {0} times in a row without capturing anything; giving up")]
    TooManyRecoveries(u32),

    /// Opening the output file failed
    #[error("Could not open path '{}' for pcap writing: {source}", path.display())]
    OutputOpen {
        /// Output path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Writing captured data failed
    #[error("Could not write to output file: {0}")]
    Output(#[source] std::io::Error),

    /// X is outside both Ethernet rows
    #[error("X={0} is not in the valid range for potential Ethernet tiles; try between 20 and 31 instead")]
    NotEthernetColumn(u8),

    /// The selected tile is something other than an Ethernet tile
    #[error("Tile at {tile} is not an Ethernet tile; it reports NOC_ENDPOINT_ID={endpoint_id:#010x}")]
    NotEthernetTile {
        /// Selected tile
        tile: TileCoord,
        /// Endpoint id it reported
        endpoint_id: u32,
    },

    /// The selected Ethernet tile is fused off
    #[error("Ethernet tile at {0} has been harvested; try a different one")]
    Harvested(TileCoord),

    /// The selected Ethernet tile has no port
    #[error("Selected Ethernet tile does not have an Ethernet port (status {0}); try a different one")]
    NoPort(u32),

    /// Training finished with a status the firmware does not define
    #[error("Selected Ethernet tile has unknown port status {0} after conclusion of training")]
    UnknownPortStatus(u32),

    /// Training did not conclude in time
    #[error("Timed out waiting for Ethernet port training")]
    TrainingTimeout,

    /// Training concluded with the link down
    #[error("Selected Ethernet tile's port is down; try a different one")]
    LinkDown,

    /// A ring size is outside its bounds or not a power of two
    #[error("Invalid {which} ring size {size}: must be a power of two between {min} and {max} bytes")]
    InvalidRingSize {
        /// "device" or "host"
        which: &'static str,
        /// Rejected size
        size: u64,
        /// Smallest allowed size
        min: u64,
        /// Largest allowed size
        max: u64,
    },

    /// Host ring smaller than device ring
    #[error("Host ring size ({host} bytes) cannot be smaller than device ring size ({device} bytes)")]
    HostRingTooSmall {
        /// Host ring size
        host: u32,
        /// Device ring size
        device: u32,
    },
}
