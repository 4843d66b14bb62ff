//! Ethernet tile register map.
//!
//! All addresses are in the tile's local address space, as seen through a
//! TLB window pointed at the tile's NoC coordinates.

// ── Tile-level control ───────────────────────────────────────────────────────

/// Soft reset register for the two RISC-V cores.
pub const SOFT_RESET_ADDR: u64 = 0xFFB1_21B0;

/// E1 reset program counter.
pub const E1_RESET_PC_ADDR: u64 = 0xFFB1_4008;

/// E1 end program counter.
pub const E1_END_PC_ADDR: u64 = 0xFFB1_400C;

/// Soft reset register bit definitions.
pub mod soft_reset {
    /// Hold E0 (link firmware core) in reset.
    pub const E0: u32 = 0x0800;
    /// Hold E1 (capture payload core) in reset.
    pub const E1: u32 = 0x1000;
}

// ── NoC interface units ──────────────────────────────────────────────────────

/// Base of NIU `i`.
#[must_use]
pub const fn niu_addr(i: u64) -> u64 {
    0xFFB2_0000 + i * 0x1_0000
}

/// Offset from an NIU base to its second command buffer.
pub const NIU_CMD_BUF_STRIDE: u64 = 0x800;

/// Offsets from an NIU base.
pub mod niu {
    pub const NOC_TARG_ADDR_LO: u64 = 0x000;
    pub const NOC_TARG_ADDR_MID: u64 = 0x004;
    pub const NOC_TARG_ADDR_HI: u64 = 0x008;
    pub const NOC_RET_ADDR_LO: u64 = 0x00C;
    pub const NOC_RET_ADDR_MID: u64 = 0x010;
    pub const NOC_RET_ADDR_HI: u64 = 0x014;
    pub const NOC_PACKET_TAG: u64 = 0x018;
    pub const NOC_CTRL: u64 = 0x01C;
    pub const NOC_AT_LEN_BE: u64 = 0x020;
    pub const NOC_AT_LEN_BE_1: u64 = 0x024;
    pub const NOC_BRCST_EXCLUDE: u64 = 0x02C;
    pub const NOC_L1_ACC_AT_INSTRN: u64 = 0x030;
    pub const NOC_ENDPOINT_ID: u64 = 0x048;
    pub const NIU_CFG_0: u64 = 0x100;
    /// No hardware meaning; repurposed as the host-to-device echo mailbox.
    pub const ROUTER_CFG_2: u64 = 0x10C;
    /// No hardware meaning; repurposed as the host's ring read pointer.
    pub const ROUTER_CFG_4: u64 = 0x114;
    pub const NOC_ID_LOGICAL: u64 = 0x148;

    /// `NOC_CTRL` write command.
    pub const NOC_CMD_WR: u32 = 2;
    /// `NOC_CTRL` static virtual channel.
    pub const NOC_CMD_VC_STATIC: u32 = 1 << 7;
    /// `NIU_CFG_0` bit set on harvested tiles.
    pub const NIU_CFG_0_HARVESTED: u32 = 1 << 12;
}

// ── Ethernet TX ──────────────────────────────────────────────────────────────

/// Base of TX queue `i`.
#[must_use]
pub const fn txq_addr(i: u64) -> u64 {
    0xFFB9_0000 + i * 0x1000
}

/// Number of TX queues that send regular TT-link traffic.
pub const TXQ_COUNT: u64 = 3;

/// Offsets from a TX queue base.
pub mod txq {
    pub const CTRL: u64 = 0x00;
    pub const CMD: u64 = 0x04;
    pub const TRANSFER_START_ADDR: u64 = 0x14;
    pub const TRANSFER_SIZE_BYTES: u64 = 0x18;
    pub const REMOTE_SEQ_TIMEOUT: u64 = 0x48;
    pub const TXPKT_CFG_SEL_SW: u64 = 0x80;

    /// `CTRL`: no heartbeats, ignore received drop notifications.
    pub const CTRL_NO_HEARTBEAT: u32 = 8;
}

/// Base of TX header template `i`.
#[must_use]
pub const fn txpkt_cfg_addr(i: u64) -> u64 {
    0xFFB9_8200 + i * 0x80
}

/// Number of TX header templates.
pub const TXPKT_CFG_COUNT: u64 = 10;

/// Offsets from a TX header template base.
pub mod txpkt_cfg {
    pub const INSERT_CTL: u64 = 0x00;
    pub const MAC_SA: u64 = 0x10;
    pub const MAC_DA: u64 = 0x18;
    pub const USE_ETHERTYPE: u64 = 0x20;
    pub const L3_HEADER: u64 = 0x30;
    pub const L4_HEADER: u64 = 0x60;

    pub const INSERT_CTL_L3_HEADER: u32 = 1 << 8;
    pub const INSERT_CTL_L4_HEADER: u32 = 1 << 16;
    pub const INSERT_CTL_L4_CHECKSUM: u32 = 1 << 18;
}

// ── Ethernet RX ──────────────────────────────────────────────────────────────

/// Base of RX queue `i`.
#[must_use]
pub const fn rxq_addr(i: u64) -> u64 {
    0xFFB9_4000 + i * 0x1000
}

/// Offsets from an RX queue base.
pub mod rxq {
    pub const CTRL: u64 = 0x00;
    pub const BUF_PTR: u64 = 0x08;
    pub const BUF_START_WORD_ADDR: u64 = 0x0C;
    pub const BUF_SIZE_WORDS: u64 = 0x10;
    pub const HDR_CTRL: u64 = 0x18;
    pub const PACKET_DROP_CNT: u64 = 0x4C;

    /// `CTRL`: raw RX mode, buffer not wrapping.
    pub const CTRL_RAW_NO_WRAP: u32 = 0;
    /// `HDR_CTRL`: keep all headers.
    pub const HDR_CTRL_KEEP_ALL: u32 = 0;
}

// ── RX classification ────────────────────────────────────────────────────────

/// MAC RX routing selector.
pub const RXCLASS_MAC_RX_ROUTING_ADDR: u64 = 0xFFB9_8150;

/// User-defined ethertype rewrite `i`.
#[must_use]
pub const fn rxclass_user_defined_ethertype_addr(i: u64) -> u64 {
    0xFFB9_C000 + i * 4
}

/// Actions applied to frames that match no flow.
pub const RXCLASS_NO_MATCH_ACTIONS_ADDR: u64 = 0xFFB9_CD04;

/// TCAM flush trigger.
pub const RXCLASS_TCAM_FLUSH: u64 = 0xFFB9_CD60;

/// Classifier decision override.
pub const RXCLASS_OVERRIDE_DECISION_ADDR: u64 = 0xFFB9_D000;

/// RX classification values.
pub mod rxclass {
    pub const MAC_RX_ROUTING_FROM_MAC: u32 = 0;
    pub const MAC_RX_ROUTING_FROM_ACTIONS: u32 = 2;

    pub const NO_MATCH_DROP: u32 = 4;
    pub const NO_MATCH_PREPEND_HW_METADATA: u32 = 0x40;

    /// No-match action routing frames to RX queue `i`.
    #[must_use]
    pub const fn no_match_to_rxq(i: u32) -> u32 {
        i
    }

    pub const OVERRIDE_ACCEPT: u32 = 0;
    pub const OVERRIDE_DROP: u32 = 1;
    pub const OVERRIDE_REGULAR: u32 = 2;

    /// Ethertype rewrite entry: match `ethertype`, replace with 0xFFFF.
    #[must_use]
    pub const fn ethertype_rewrite(ethertype: u16) -> u32 {
        0xFFFF_0000 | ethertype as u32
    }
}
