//! RV32 capture payload for the Ethernet tile's E1 core.
//!
//! The payload drains RX queue 2 and uses NIU 1 to copy its contents into a
//! ring buffer in host memory. Everything it needs is configured by the host
//! beforehand; the code itself only moves data and keeps three counters in
//! the host metadata block up to date:
//!
//! ```text
//! metadata + 0   write_ptr      bytes published to the host ring
//! metadata + 4   mailbox_echo   copy of ROUTER_CFG_2 when the host asks for one
//! metadata + 8   error          set to 1 when the RX queue dropped frames
//! ```
//!
//! The host publishes its read pointer in NIU 1 `ROUTER_CFG_4`, which the
//! payload reads to compute free space in the host ring.
//!
//! ## Layout
//!
//! | Offset | Content |
//! |--------|---------|
//! | `0x000` | [`CODE_WORDS`] (98 instructions) |
//! | `0x188` | [`PayloadArgs`] (32 bytes) |
//!
//! ## Fixups
//!
//! Three shift instructions depend on `log2(e_ring_size)`. Their 5-bit
//! `shamt` field is zero in the template and filled in by [`SHIFT_FIXUPS`]
//! when an image is built, so one template serves every power-of-two device
//! ring size.

/// Instruction words of the capture payload.
pub const CODE_WORDS: [u32; 98] = [
    // init
    0x0000_0297, 0x1882_8293, 0x0002_A503, 0x0042_A583,
    0x0082_A603, 0x00C2_A683, 0x0102_A703, 0x0142_A783,
    0x0182_A803, 0x01C2_A883, 0xFFB0_2137, 0xFEE1_2E23,
    0xFFC1_0B93, 0x0017_0C13, 0xFFF6_0C93, 0x0000_3D37,
    0x0280_006F,
    // spin
    0x1202_9263, 0x0F33_6263, 0x0A0E_0263, 0x0073_9393,
    0x4143_0333, 0x4073_0333, 0x0003_1293, 0x0250_4063,
    0x035A_1263,
    // poll
    0x90C8_A283, 0x0088_2303, 0x0508_2383, 0x000B_AE03,
    0x9148_A903, 0xFC9F_F06F,
    // new data
    0x006A_0A33, 0x00EA_7A33,
    // pending data
    0xFF6A_90E3, 0x4096_0333, 0x0123_0333, 0x415A_03B3,
    0x0A73_5333, 0xFC03_06E3, 0x415C_03B3, 0x0A73_5333,
    0x0194_F2B3, 0x0BA3_5333, 0x0064_84B3, 0x0096_A023,
    0x8158_A023, 0x8268_A023, 0x00A2_82B3, 0x8058_A623,
    0x00A2_B2B3, 0x00B2_82B3, 0x8058_A823, 0x84E8_A023,
    0x04E8_A023, 0x0408_A003, 0x006A_8AB3, 0x00EA_FAB3,
    0xA808_8B93, 0xF7DF_F06F,
    // tx complete
    0xFFC1_0B93, 0x015B_42B3, 0x000A_8B13, 0x0002_9293,
    0xF402_D8E3, 0x004C_5293, 0x0058_2823, 0x2002_E9B3,
    0x0159_F9B3, 0x0009_D293, 0x0058_2023, 0x0008_2003,
    0x04C8_2283, 0xF2F2_86E3, 0x0240_006F,
    // rx wrapped
    0x0008_2023, 0xFFFB_0293, 0x0042_D293, 0x0058_2823,
    0x0108_2003, 0x04C8_2283, 0x0000_0993, 0xF0F2_82E3,
    // overflow
    0x0010_0293, 0x0056_A423, 0xA808_A283, 0x0000_000F,
    0xFE02_9CE3, 0x04E8_A023, 0x0000_006F,
    // mailbox
    0x0056_A223, 0x9008_A623, 0xA808_A283, 0x0000_000F,
    0xFE02_9CE3, 0x04E8_A023, 0x0408_A003, 0xEC5F_F06F,
];

/// Byte length of the code, which is also the offset of the arguments block.
pub const CODE_LEN: usize = CODE_WORDS.len() * 4;

/// Byte length of the arguments block.
pub const ARGS_LEN: usize = PayloadArgs::WORDS * 4;

/// Total image length.
pub const IMAGE_LEN: usize = CODE_LEN + ARGS_LEN;

/// Smallest device ring the payload supports (`BUF_SIZE_WORDS` is in 16-byte units
/// and the wrap threshold needs a half-ring bit above that).
pub const MIN_RING_LOG2: u32 = 5;

/// Largest device ring the payload supports.
pub const MAX_RING_LOG2: u32 = 31;

/// Arguments block the payload loads at start-up (`la t0, fn_arguments`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayloadArgs {
    /// NoC address of the host ring.
    pub h_ring_noc_addr: u64,
    /// Host ring size in bytes (power of two).
    pub h_ring_size: u32,
    /// Tile-local address of the metadata block that NIU 1 + 0x800 mirrors to the host.
    pub h_meta_addr: u32,
    /// Device ring size minus one.
    pub e_ring_mask: u32,
    /// `PACKET_DROP_CNT` of the RX queue when the payload was built.
    pub initial_drop_count: u32,
    /// Base of the RX queue being drained.
    pub rxq_addr: u32,
    /// Second command buffer of the NIU used for host writes.
    pub niu_addr: u32,
}

impl PayloadArgs {
    /// Size of the block in 32-bit words.
    pub const WORDS: usize = 8;

    /// The block as the payload loads it, one little-endian word per field
    /// (the NoC address split low word first).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn to_words(&self) -> [u32; Self::WORDS] {
        [
            self.h_ring_noc_addr as u32,
            (self.h_ring_noc_addr >> 32) as u32,
            self.h_ring_size,
            self.h_meta_addr,
            self.e_ring_mask,
            self.initial_drop_count,
            self.rxq_addr,
            self.niu_addr,
        ]
    }

    /// Inverse of [`Self::to_words`].
    #[must_use]
    pub const fn from_words(w: &[u32; Self::WORDS]) -> Self {
        Self {
            h_ring_noc_addr: (w[0] as u64) | ((w[1] as u64) << 32),
            h_ring_size: w[2],
            h_meta_addr: w[3],
            e_ring_mask: w[4],
            initial_drop_count: w[5],
            rxq_addr: w[6],
            niu_addr: w[7],
        }
    }
}

/// A load-time patch of an immediate field.
#[derive(Debug, Clone, Copy)]
pub struct ShiftFixup {
    /// Byte offset of the instruction inside the code.
    pub offset: usize,
    /// Lowest bit of the field.
    pub lsb: u32,
    /// Field width in bits.
    pub width: u32,
    /// Field value as a function of `log2(e_ring_size)`.
    pub amount: fn(u32) -> u32,
}

impl ShiftFixup {
    /// Mask of the field within the instruction word.
    #[must_use]
    pub const fn mask(&self) -> u32 {
        ((1u32 << self.width) - 1) << self.lsb
    }

    /// Patch `word` for a ring of `1 << ring_log2` bytes.
    #[must_use]
    pub fn apply(&self, word: u32, ring_log2: u32) -> u32 {
        (word & !self.mask()) | (((self.amount)(ring_log2) << self.lsb) & self.mask())
    }
}

/// Moves the top bit of `e_ring_mask` into the sign bit.
fn to_sign_bit(ring_log2: u32) -> u32 {
    32 - ring_log2
}

/// Moves the half-ring bit down to bit 2 (`ETH_RXQ_CTRL` wrap enable).
fn to_wrap_enable(ring_log2: u32) -> u32 {
    ring_log2 - 3
}

/// Fixups applied to [`CODE_WORDS`].
pub const SHIFT_FIXUPS: [ShiftFixup; 3] = [
    ShiftFixup { offset: 0x5C, lsb: 20, width: 5, amount: to_sign_bit },
    ShiftFixup { offset: 0xFC, lsb: 20, width: 5, amount: to_sign_bit },
    ShiftFixup { offset: 0x114, lsb: 20, width: 5, amount: to_wrap_enable },
];

/// The immutable template: code words plus the fixup table.
#[derive(Debug, Clone, Copy)]
pub struct PayloadTemplate {
    code: &'static [u32],
    fixups: &'static [ShiftFixup],
}

/// The capture payload template.
pub const CAPTURE_PAYLOAD: PayloadTemplate = PayloadTemplate {
    code: &CODE_WORDS,
    fixups: &SHIFT_FIXUPS,
};

impl PayloadTemplate {
    /// Code length in bytes.
    #[must_use]
    pub const fn code_len(&self) -> usize {
        self.code.len() * 4
    }

    /// Build an image for a device ring of `e_ring_size` bytes.
    ///
    /// Returns `None` unless `e_ring_size` is a power of two between
    /// `1 << MIN_RING_LOG2` and `1 << MAX_RING_LOG2`.
    #[must_use]
    pub fn build(&self, e_ring_size: u32, args: PayloadArgs) -> Option<PayloadImage> {
        if !e_ring_size.is_power_of_two() {
            return None;
        }
        let ring_log2 = e_ring_size.trailing_zeros();
        if !(MIN_RING_LOG2..=MAX_RING_LOG2).contains(&ring_log2) {
            return None;
        }

        let mut words = Vec::with_capacity(self.code.len() + ARGS_LEN / 4);
        words.extend_from_slice(self.code);
        for fixup in self.fixups {
            let index = fixup.offset / 4;
            words[index] = fixup.apply(self.code[index], ring_log2);
        }
        words.extend_from_slice(&args.to_words());

        Some(PayloadImage {
            words,
            code_len: self.code_len(),
        })
    }
}

/// A patched payload ready to be written to tile memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadImage {
    words: Vec<u32>,
    code_len: usize,
}

impl PayloadImage {
    /// Code followed by the arguments block, little-endian.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    /// Image as instruction/argument words.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Length of the code part; the end-PC register points here.
    #[must_use]
    pub const fn code_len(&self) -> usize {
        self.code_len
    }

    /// Arguments block as built.
    #[must_use]
    pub fn args(&self) -> PayloadArgs {
        let mut w = [0u32; PayloadArgs::WORDS];
        w.copy_from_slice(&self.words[self.code_len / 4..]);
        PayloadArgs::from_words(&w)
    }
}
