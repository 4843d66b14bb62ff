//! Error types for device access

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors raised while opening or driving a device.
///
/// All of these are fatal for `ethdump`; the only soft failure (kill-cleanup
/// registration) is surfaced as [`DriverError::Ioctl`] and ignored by the caller.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Device node could not be opened
    #[error("Could not open device path '{}': {source}", path.display())]
    Open {
        /// Path that was tried
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Device node exists but is not a Blackhole
    #[error("Path '{}' does not seem to be a Tenstorrent Blackhole device", path.display())]
    NotBlackhole {
        /// Path that was opened
        path: PathBuf,
    },

    /// A tt-kmd ioctl failed
    #[error("{request} failed: {source}")]
    Ioctl {
        /// Name of the request
        request: &'static str,
        /// errno from the kernel
        source: std::io::Error,
    },

    /// BAR0 is too small to contain the TLB configuration block
    #[error("BAR0 on device '{}' is only {size} bytes, which is less than the required {required} bytes", path.display())]
    Bar0TooSmall {
        /// Device path
        path: PathBuf,
        /// Reported BAR0 size
        size: u64,
        /// Required size
        required: u64,
    },

    /// Mapping device or host memory failed
    #[error("Could not map {what}: {reason}")]
    Map {
        /// What was being mapped
        what: &'static str,
        /// Reason for failure
        reason: String,
    },

    /// Every host buffer allocation strategy failed
    #[error("Could not allocate and pin a host buffer of {size} bytes")]
    HostBufferUnavailable {
        /// Requested size
        size: usize,
    },
}

impl DriverError {
    /// Create an ioctl error from the current errno
    pub fn ioctl(request: &'static str) -> Self {
        Self::Ioctl {
            request,
            source: std::io::Error::last_os_error(),
        }
    }

    /// Create a mapping error
    pub fn map(what: &'static str, reason: impl ToString) -> Self {
        Self::Map {
            what,
            reason: reason.to_string(),
        }
    }
}
