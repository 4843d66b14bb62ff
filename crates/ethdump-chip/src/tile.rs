//! Ethernet tile coordinates.
//!
//! Ethernet tiles sit on two rows of the NoC grid. The lower row (Y = 1)
//! runs X = 1..=16 with the PCIe columns 8 and 9 excluded; the upper row
//! (Y = 25) runs X = 20..=31.

/// NoC Y coordinate of the lower Ethernet row.
pub const LOWER_ROW_Y: u8 = 1;

/// NoC Y coordinate of the upper Ethernet row.
pub const UPPER_ROW_Y: u8 = 25;

/// Default X coordinate used when none is specified.
pub const DEFAULT_ETHERNET_X: u8 = 25;

/// Endpoint id type field identifying an Ethernet endpoint.
pub const ETHERNET_ENDPOINT_TYPE: u16 = 0x0200;

/// A NoC tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// NoC X.
    pub x: u8,
    /// NoC Y.
    pub y: u8,
}

impl TileCoord {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// The Ethernet tile with the given X, if X is in either Ethernet row.
    #[must_use]
    pub const fn ethernet(x: u8) -> Option<Self> {
        match x {
            1..=7 | 10..=16 => Some(Self::new(x, LOWER_ROW_Y)),
            20..=31 => Some(Self::new(x, UPPER_ROW_Y)),
            _ => None,
        }
    }

    /// Lower-row Ethernet tiles, in the order the status table lists them.
    pub fn lower_row() -> impl Iterator<Item = Self> {
        (1..=16u8)
            .filter(|x| !matches!(x, 8 | 9))
            .map(|x| Self::new(x, LOWER_ROW_Y))
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "X={},Y={}", self.x, self.y)
    }
}

/// True if a `NOC_ENDPOINT_ID` value identifies an Ethernet endpoint.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn is_ethernet_endpoint(endpoint_id: u32) -> bool {
    (endpoint_id >> 8) as u16 == ETHERNET_ENDPOINT_TYPE
}

/// Ethernet instance number encoded in the low byte of the endpoint id.
#[must_use]
pub const fn ethernet_instance(endpoint_id: u32) -> u32 {
    endpoint_id & 0xFF
}
