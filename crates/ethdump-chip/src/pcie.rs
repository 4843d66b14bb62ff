//! PCIe identity and the BAR0 TLB configuration block.
//!
//! A Blackhole exposes its NoC address space to the host through
//! fixed-size TLB windows. Each 2 MiB TLB has three 32-bit configuration
//! words in BAR0; the kernel driver hands out a TLB id and an mmap offset
//! for the window itself, and we reprogram the configuration words directly.
//!
//! ```text
//! cfg[0]  bits  0..31  device address bits 21..52
//! cfg[1]  bits  0..10  device address bits 53..63
//!         bits 11..16  NoC X
//!         bits 17..22  NoC Y
//! cfg[2]  bit   6      strict AXI ordering
//! ```

/// Tenstorrent PCI vendor id.
pub const VENDOR_ID: u16 = 0x1E52;

/// Blackhole PCI device id.
pub const BLACKHOLE_DEVICE_ID: u16 = 0xB140;

/// Directory holding the character devices created by tt-kmd.
pub const DEVICE_DIR: &str = "/dev/tenstorrent";

/// BAR0 offset of the first TLB configuration triple.
pub const TLB_CONFIG_ADDR: u64 = 0x1FC0_0000;

/// BAR0 offset of the per-TLB stride registers (one word per TLB id < 32).
pub const TLB_CONFIG_ADDR_STRIDES: u64 = 0x1FC0_09D8;

/// End of the TLB configuration block; BAR0 must be at least this large.
pub const TLB_CONFIG_ADDR_END: u64 = 0x1FC0_0A58;

/// Words per TLB configuration entry.
pub const TLB_CONFIG_WORDS: usize = 3;

/// TLB ids below this have a stride register.
pub const TLB_STRIDE_COUNT: u32 = 32;

/// `cfg[2]` bit requesting strict AXI ordering.
pub const TLB_CFG_STRICT_AXI: u32 = 1 << 6;

/// log2 of the TLB window size.
pub const TLB_WINDOW_SHIFT: u32 = 21;

/// Size of the TLB window in bytes (2 MiB).
pub const TLB_WINDOW_SIZE: usize = 1 << TLB_WINDOW_SHIFT;

/// Bits of `cfg[1]` holding the high address field.
pub const TLB_CFG1_ADDR_MASK: u32 = 0x7FF;

/// Bit position of the X coordinate in `cfg[1]`.
pub const TLB_CFG1_X_SHIFT: u32 = 11;

/// Bit position of the Y coordinate in `cfg[1]`.
pub const TLB_CFG1_Y_SHIFT: u32 = 17;

/// Width mask of a NoC coordinate.
pub const NOC_COORD_MASK: u32 = 0x3F;

/// NoC coordinates of the PCIe tile, packed as `x + (y << 6)`.
///
/// Used as the NIU return-address high word so that writes issued by an
/// Ethernet tile land in host memory.
pub const PCIE_NOC_XY: u32 = 19 + (24 << 6);

/// A device address split into the three parts the TLB consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbAddress {
    /// Offset inside the 2 MiB window.
    pub offset: usize,
    /// Value for `cfg[0]`.
    pub mid: u32,
    /// Address bits 53..63, to be merged with the coordinates in `cfg[1]`.
    pub hi: u32,
}

impl TlbAddress {
    /// Split a 64-bit device address.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn split(addr: u64) -> Self {
        Self {
            offset: (addr & (TLB_WINDOW_SIZE as u64 - 1)) as usize,
            mid: (addr >> TLB_WINDOW_SHIFT) as u32,
            hi: (addr >> 53) as u32,
        }
    }
}

/// Pack NoC coordinates into the coordinate bits of `cfg[1]`.
#[must_use]
pub const fn tlb_cfg1_xy(x: u8, y: u8) -> u32 {
    ((x as u32 & NOC_COORD_MASK) << TLB_CFG1_X_SHIFT) | ((y as u32 & NOC_COORD_MASK) << TLB_CFG1_Y_SHIFT)
}

/// Extract `(x, y)` from a `cfg[1]` word.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn tlb_cfg1_coords(cfg1: u32) -> (u8, u8) {
    (
        ((cfg1 >> TLB_CFG1_X_SHIFT) & NOC_COORD_MASK) as u8,
        ((cfg1 >> TLB_CFG1_Y_SHIFT) & NOC_COORD_MASK) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_low_address() {
        let a = TlbAddress::split(0xFFB1_21B0);
        assert_eq!(a.offset, 0x1_21B0);
        assert_eq!(a.mid, 0xFFB1_21B0 >> 21);
        assert_eq!(a.hi, 0);
    }

    #[test]
    fn split_high_address() {
        let a = TlbAddress::split(0x1000_0000_0000_0010);
        assert_eq!(a.offset, 0x10);
        assert_eq!(a.hi, 0x80);
    }

    #[test]
    fn coords_roundtrip_through_cfg1() {
        let cfg1 = tlb_cfg1_xy(25, 25) | 0x7;
        assert_eq!(tlb_cfg1_coords(cfg1), (25, 25));
        assert_eq!(cfg1 & TLB_CFG1_ADDR_MASK, 0x7);
    }

    #[test]
    fn config_block_fits_before_end() {
        assert!(TLB_CONFIG_ADDR_STRIDES < TLB_CONFIG_ADDR_END);
        assert_eq!(TLB_CONFIG_ADDR_END - TLB_CONFIG_ADDR_STRIDES, 32 * 4);
    }
}
