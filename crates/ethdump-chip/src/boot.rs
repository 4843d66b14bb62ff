//! Boot parameters and boot results of the E0 link firmware.
//!
//! The firmware reads its parameters from `BOOT_PARAMS_ADDR` and publishes
//! link state at `BOOT_RESULTS_ADDR`. Offsets below are word indices.

/// Base of the boot parameter block.
pub const BOOT_PARAMS_ADDR: u64 = 0x0007_C000;

/// Base of the boot results block.
pub const BOOT_RESULTS_ADDR: u64 = 0x0007_CC00;

/// Word indices into the boot parameter block.
pub mod params {
    /// Bitmask of enabled Ethernet instances.
    pub const ENABLED_MASK: u64 = 0;
    /// Loopback mode requested for the next training run.
    pub const LOOPBACK_MODE: u64 = 2;
    /// MAC address, upper 24 bits.
    pub const MAC_MAJOR: u64 = 36;
    /// MAC address, lower 24 bits of the first port.
    pub const MAC_MINOR: u64 = 37;
}

/// Word indices into the boot results block.
pub mod results {
    pub const PORT_STATUS: u64 = 1;
    pub const TRAIN_STATUS: u64 = 2;
    pub const SERDES_POSTCODE: u64 = 32;
    pub const SERDES_INSTANCE: u64 = 33;
    pub const SERDES_LANES: u64 = 34;
    pub const PEER_MAC_MAJOR: u64 = 243;
    pub const PEER_MAC_MINOR: u64 = 244;
    pub const CHIP_INFO_EXCHANGED: u64 = 247;
}

/// Byte address of word `index` in a block at `base`.
#[must_use]
pub const fn word_addr(base: u64, index: u64) -> u64 {
    base + index * 4
}

/// Serdes postcodes in this range mean the serdes fields are valid.
pub const SERDES_POSTCODE_VALID: std::ops::RangeInclusive<u32> = 0xC0DE_1000..=0xC0DE_FFFF;

/// Link state reported in `results::PORT_STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    /// Training has not concluded.
    Unknown,
    /// Link is up.
    Up,
    /// Link is down.
    Down,
    /// Tile has no Ethernet port.
    NoPort,
    /// Value not defined by the firmware.
    Other(u32),
}

impl PortStatus {
    /// Decode a raw status word.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Unknown,
            1 => Self::Up,
            2 => Self::Down,
            3 => Self::NoPort,
            other => Self::Other(other),
        }
    }

    /// Raw value for writing back to the results block.
    #[must_use]
    pub const fn raw(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::Up => 1,
            Self::Down => 2,
            Self::NoPort => 3,
            Self::Other(v) => v,
        }
    }

    /// Short label for status tables.
    #[must_use]
    pub const fn label(self) -> Option<&'static str> {
        match self {
            Self::Unknown => Some("Unknown"),
            Self::Up => Some("Up"),
            Self::Down => Some("Down"),
            Self::NoPort => Some("No"),
            Self::Other(_) => None,
        }
    }
}

/// Labels for `results::TRAIN_STATUS` values.
pub const TRAIN_STATUS_LABELS: [&str; 11] = [
    "In Progress",
    "Skipped",
    "Complete",
    "Int Loopback",
    "Ext Loopback",
    "Timeout (EQ)",
    "Timeout (AN)",
    "Timeout (CL)",
    "Timeout (BL)",
    "Timeout (LU)",
    "Timeout (CI)",
];

/// Combine the two 24-bit MAC halves into six bytes.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn mac_bytes(major: u32, minor: u32) -> [u8; 6] {
    [
        (major >> 16) as u8,
        (major >> 8) as u8,
        major as u8,
        (minor >> 16) as u8,
        (minor >> 8) as u8,
        minor as u8,
    ]
}

/// MAC minor half the firmware assigns to Ethernet instance `instance`:
/// the base value plus the number of enabled instances below it.
#[must_use]
pub const fn derived_mac_minor(enabled_mask: u32, base_minor: u32, instance: u32) -> u32 {
    let below = enabled_mask & ((1u32 << (instance & 0x1F)) - 1);
    base_minor + below.count_ones()
}
