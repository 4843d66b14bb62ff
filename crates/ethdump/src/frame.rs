//! Framing of the host ring.
//!
//! The E1 payload copies each received frame into the ring behind a 4-byte
//! big-endian header produced by the RX queue. Frames are packed back to
//! back with no alignment, so a header may straddle the end of the ring.
//!
//! ```text
//! bit  31..29  reserved (zero)
//! bit      23  reserved (zero)
//! bit      19  reserved (zero)
//! bits 19..0   at least 14 (an Ethernet header)
//! bits 13..0   frame length in bytes
//! ```

use ethdump_driver::HostBuffer;

/// Bytes of header in front of every frame.
pub const HEADER_LEN: u32 = 4;

/// Header bits that are never set by hardware.
pub const RESERVED_MASK: u32 = 0xE088_0000;

/// Header bits holding the frame length.
pub const LENGTH_MASK: u32 = 0x3FFF;

/// Bits compared against [`MIN_FRAME_LEN`].
const MIN_CHECK_MASK: u32 = 0xF_FFFF;

/// Shortest frame the RX queue delivers.
pub const MIN_FRAME_LEN: u32 = 14;

/// A validated ring entry header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader(u32);

impl FrameHeader {
    /// Validate a decoded header word.
    ///
    /// Returns `None` if reserved bits are set or the frame is too short;
    /// either means the ring can no longer be trusted.
    pub const fn parse(word: u32) -> Option<Self> {
        if word & RESERVED_MASK != 0 || word & MIN_CHECK_MASK < MIN_FRAME_LEN {
            None
        } else {
            Some(Self(word))
        }
    }

    /// Frame length in bytes, excluding the header.
    pub const fn len(self) -> u32 {
        self.0 & LENGTH_MASK
    }

    /// Ring bytes taken by header and frame together.
    pub const fn entry_len(self) -> u32 {
        HEADER_LEN + self.len()
    }

    /// Header word as decoded.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Load the header word at `read_ptr`.
///
/// A header crossing the end of the ring is assembled from the aligned last
/// and first words of the ring rather than read across the wrap.
pub fn load_header(ring: &HostBuffer, read_ptr: u32) -> u32 {
    let size = ring.size();
    let masked = read_ptr as usize & (size - 1);
    if masked <= size - HEADER_LEN as usize {
        let b = ring.bytes(masked, HEADER_LEN as usize);
        return u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
    }
    let end = u32::from_le(ring.read_u32(size - 4));
    let start = u32::from_le(ring.read_u32(0));
    // 8, 16 or 24: bits of header before the wrap
    let shift = ((size - masked) * 8) as u32;
    let le = (end >> (32 - shift)) | (start << shift);
    u32::from_be_bytes(le.to_le_bytes())
}
