//! Programming the Ethernet tile for capture.
//!
//! [`configure_ethernet`] brings the tile from whatever state it is in to a
//! running capture: E1 is stopped, queues and classifier are set up while
//! incoming frames are dropped, the payload is loaded, E1 is started, and
//! only then are frames accepted again. It is also the recovery path after
//! the device reports an overflow.
//!
//! Tile L1 layout used while capturing:
//!
//! ```text
//! 0                  device ring (RX queue 2 buffer)
//! e_ring_size        ring metadata, 64 bytes
//! + 64               payload code, then arguments block
//! + image length     synthetic packet text
//! ```

use crate::error::{CaptureError, Result};
use crate::metadata::{MetadataView, RingMetadata};
use ethdump_chip::payload::{PayloadArgs, PayloadImage, CAPTURE_PAYLOAD, MAX_RING_LOG2, MIN_RING_LOG2};
use ethdump_chip::pcie::PCIE_NOC_XY;
use ethdump_chip::regs::{
    niu, niu_addr, rxclass, rxclass_user_defined_ethertype_addr, rxq, rxq_addr, soft_reset, txpkt_cfg,
    txpkt_cfg_addr, txq, txq_addr, E1_END_PC_ADDR, E1_RESET_PC_ADDR, NIU_CMD_BUF_STRIDE,
    RXCLASS_MAC_RX_ROUTING_ADDR, RXCLASS_NO_MATCH_ACTIONS_ADDR, RXCLASS_OVERRIDE_DECISION_ADDR,
    RXCLASS_TCAM_FLUSH, SOFT_RESET_ADDR, TXQ_COUNT,
};
use ethdump_driver::{HostBuffer, TileAccess};

/// RX queue the payload drains.
pub const CAPTURE_RXQ: u64 = 2;

/// TX queue used for synthetic traffic.
pub const TRAFFIC_TXQ: u64 = 2;

/// TX header template used for synthetic traffic.
pub const TRAFFIC_TXPKT_CFG: u64 = 9;

/// NIU whose two command buffers write into host memory.
pub const CAPTURE_NIU: u64 = 1;

/// Host-to-device mailbox: the host writes an echo request here.
pub const MAILBOX_REQUEST_ADDR: u64 = niu_addr(CAPTURE_NIU) + niu::ROUTER_CFG_2;

/// Host-to-device mailbox: the host publishes its ring read pointer here.
pub const HOST_READ_PTR_ADDR: u64 = niu_addr(CAPTURE_NIU) + niu::ROUTER_CFG_4;

/// Body of the synthetic packet; bytes 12..16 hold a four digit counter.
pub const TRAFFIC_TEXT: &[u8] = concat!(
    "Hello World 0000 from the ethdump ",
    env!("CARGO_PKG_VERSION"),
    " dummy traffic generator\0"
)
.as_bytes();

/// Offset of the counter digits in [`TRAFFIC_TEXT`].
pub const TRAFFIC_COUNTER_OFFSET: u64 = 12;

/// The pinned host memory the device writes into. Allocated once per run
/// and reused by every reconfiguration.
#[derive(Debug)]
pub struct HostRings {
    /// Frame ring
    pub ring: HostBuffer,
    /// Metadata block (one host page)
    pub meta: HostBuffer,
}

/// Where things live in tile L1 for a given device ring size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLayout {
    /// Metadata block
    pub meta_addr: u64,
    /// Payload code
    pub code_addr: u64,
    /// Synthetic packet text
    pub tx_buf_addr: u64,
}

impl DeviceLayout {
    /// Layout for a device ring of `e_ring_size` bytes.
    pub const fn new(e_ring_size: u32) -> Self {
        let meta_addr = e_ring_size as u64;
        let code_addr = meta_addr + RingMetadata::SIZE as u64;
        let tx_buf_addr = code_addr + CAPTURE_PAYLOAD.code_len() as u64 + (PayloadArgs::WORDS * 4) as u64;
        Self {
            meta_addr,
            code_addr,
            tx_buf_addr,
        }
    }
}

/// Device-side facts established by one configuration.
///
/// Every reconfiguration produces a fresh context; the capture loop swaps it
/// in whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureContext {
    /// Device ring size in bytes
    pub e_ring_size: u32,
    /// L1 layout
    pub layout: DeviceLayout,
    /// Address of the four counter digits in the synthetic packet
    pub tx_counter_addr: u64,
    /// TX queue command register; writing 1 sends the synthetic packet
    pub tx_doorbell: u64,
    /// RX drop counter when the payload was started
    pub initial_drop_count: u32,
}

impl CaptureContext {
    /// Stamp `counter` into the synthetic packet and send it.
    pub fn send_traffic<D: TileAccess>(&self, dev: &mut D, counter: u32) {
        dev.write_u32(self.tx_counter_addr, ascii_counter(counter));
        dev.write_u32(self.tx_doorbell, 1);
    }
}

/// Four ASCII decimal digits of `n % 10000`, as the little-endian word
/// that stores them in order.
pub fn ascii_counter(n: u32) -> u32 {
    let n = n % 10_000;
    let digit = |d: u32| b'0' + u8::try_from(d % 10).unwrap_or(0);
    u32::from_le_bytes([digit(n / 1000), digit(n / 100), digit(n / 10), digit(n)])
}

fn check_device_ring(e_ring_size: u32) -> Result<()> {
    let min = 1u32 << MIN_RING_LOG2;
    let max = 1u32 << MAX_RING_LOG2;
    if e_ring_size.is_power_of_two() && (min..=max).contains(&e_ring_size) {
        Ok(())
    } else {
        Err(CaptureError::InvalidRingSize {
            which: "device",
            size: u64::from(e_ring_size),
            min: u64::from(min),
            max: u64::from(max),
        })
    }
}

/// Configure the tile for capture and start the payload.
///
/// The window must already point at the Ethernet tile. `rings.meta` is
/// reset to the initial metadata state.
///
/// # Errors
///
/// Returns an error if `e_ring_size` is not a usable power of two.
pub fn configure_ethernet<D: TileAccess>(
    dev: &mut D,
    rings: &HostRings,
    e_ring_size: u32,
) -> Result<CaptureContext> {
    check_device_ring(e_ring_size)?;
    let layout = DeviceLayout::new(e_ring_size);

    // E0 keeps running the link firmware; only E1 is stopped.
    dev.write_u32(SOFT_RESET_ADDR, soft_reset::E1);
    dev.write_u32(RXCLASS_OVERRIDE_DECISION_ADDR, rxclass::OVERRIDE_DROP);

    MetadataView::new(&rings.meta).reset();
    dev.write_bytes(layout.meta_addr, bytemuck::bytes_of(&RingMetadata::initial()));

    let (tx_counter_addr, tx_doorbell) = configure_traffic_generator(dev, &layout);
    configure_niu(dev, &layout, rings.meta.noc_addr());
    quiesce_tx_queues(dev);
    configure_rx_queue(dev, e_ring_size);
    configure_classifier(dev);

    let rxq_base = rxq_addr(CAPTURE_RXQ);
    let initial_drop_count = dev.read_u32(rxq_base + rxq::PACKET_DROP_CNT);
    #[allow(clippy::cast_possible_truncation)]
    let args = PayloadArgs {
        h_ring_noc_addr: rings.ring.noc_addr(),
        h_ring_size: rings.ring.size() as u32,
        h_meta_addr: layout.meta_addr as u32,
        e_ring_mask: e_ring_size - 1,
        initial_drop_count,
        rxq_addr: rxq_base as u32,
        niu_addr: (niu_addr(CAPTURE_NIU) + NIU_CMD_BUF_STRIDE) as u32,
    };
    deploy_payload(dev, layout.code_addr, e_ring_size, args)?;

    if let Err(e) = dev.arm_reset_on_exit(SOFT_RESET_ADDR, soft_reset::E1) {
        tracing::warn!("Kill-time reset of E1 unavailable ({e}); E1 keeps running if ethdump is killed");
    }

    dev.write_u32(SOFT_RESET_ADDR, 0);
    dev.write_u32(RXCLASS_OVERRIDE_DECISION_ADDR, rxclass::OVERRIDE_ACCEPT);

    tracing::info!(
        "Configured {} for capture: device ring {e_ring_size:#x} bytes, host ring {:#x} bytes, drop baseline {initial_drop_count}",
        dev.tile(),
        rings.ring.size()
    );

    Ok(CaptureContext {
        e_ring_size,
        layout,
        tx_counter_addr,
        tx_doorbell,
        initial_drop_count,
    })
}

/// Build the payload image and point E1 at it. E1 must be in reset.
///
/// # Errors
///
/// Returns an error if `e_ring_size` is not a usable power of two.
#[allow(clippy::cast_possible_truncation)]
pub fn deploy_payload<D: TileAccess>(
    dev: &mut D,
    code_addr: u64,
    e_ring_size: u32,
    args: PayloadArgs,
) -> Result<PayloadImage> {
    check_device_ring(e_ring_size)?;
    let image = CAPTURE_PAYLOAD
        .build(e_ring_size, args)
        .ok_or(CaptureError::InvalidRingSize {
            which: "device",
            size: u64::from(e_ring_size),
            min: 1 << MIN_RING_LOG2,
            max: 1 << MAX_RING_LOG2,
        })?;

    dev.write_bytes(code_addr, image.as_bytes());
    dev.write_u32(E1_RESET_PC_ADDR, code_addr as u32);
    dev.write_u32(E1_END_PC_ADDR, (code_addr + image.code_len() as u64) as u32);
    tracing::debug!("Deployed {} byte payload at {code_addr:#x}", image.as_bytes().len());
    Ok(image)
}

/// Load the synthetic packet and set up TX queue 2 to send it with
/// header template 9 (UDP 127.0.0.1 -> 127.0.0.2). Returns the counter
/// and doorbell addresses.
#[allow(clippy::cast_possible_truncation)]
fn configure_traffic_generator<D: TileAccess>(dev: &mut D, layout: &DeviceLayout) -> (u64, u64) {
    dev.write_bytes(layout.tx_buf_addr, TRAFFIC_TEXT);

    let hdr = txpkt_cfg_addr(TRAFFIC_TXPKT_CFG);
    dev.write_u32(
        hdr + txpkt_cfg::INSERT_CTL,
        txpkt_cfg::INSERT_CTL_L3_HEADER | txpkt_cfg::INSERT_CTL_L4_HEADER | txpkt_cfg::INSERT_CTL_L4_CHECKSUM,
    );
    let template0 = txpkt_cfg_addr(0);
    for offset in (txpkt_cfg::MAC_SA..txpkt_cfg::MAC_SA + 0x10).step_by(4) {
        let value = dev.read_u32(template0 + offset);
        dev.write_u32(hdr + offset, value);
    }
    // Ethertype 0x0800, enabled
    dev.write_u32(hdr + txpkt_cfg::USE_ETHERTYPE, 0x0800_0001);
    let l3 = [0x4500_0000, 0, 0x0A11_0000, 0x7F00_0001, 0x7F00_0002];
    for (i, word) in l3.into_iter().enumerate() {
        dev.write_u32(hdr + txpkt_cfg::L3_HEADER + i as u64 * 4, word);
    }
    dev.write_u32(hdr + txpkt_cfg::L4_HEADER, 0);

    let q = txq_addr(TRAFFIC_TXQ);
    dev.write_u32(q + txq::TRANSFER_START_ADDR, layout.tx_buf_addr as u32);
    dev.write_u32(q + txq::TRANSFER_SIZE_BYTES, TRAFFIC_TEXT.len() as u32);
    dev.write_u32(q + txq::TXPKT_CFG_SEL_SW, TRAFFIC_TXPKT_CFG as u32);

    (layout.tx_buf_addr + TRAFFIC_COUNTER_OFFSET, q + txq::CMD)
}

/// NIU 1 command buffer 0 carries ring data to the host; command buffer 1
/// mirrors the metadata block. Both return to the PCIe tile.
#[allow(clippy::cast_possible_truncation)]
fn configure_niu<D: TileAccess>(dev: &mut D, layout: &DeviceLayout, meta_noc_addr: u64) {
    let base = niu_addr(CAPTURE_NIU);
    dev.write_u32(base + niu::NOC_TARG_ADDR_MID, 0);
    dev.write_u32(base + niu::NOC_TARG_ADDR_HI, 0);
    dev.write_u32(base + niu::NOC_RET_ADDR_HI, PCIE_NOC_XY);
    dev.write_u32(base + niu::NOC_PACKET_TAG, 0);
    dev.write_u32(base + niu::NOC_CTRL, niu::NOC_CMD_WR | niu::NOC_CMD_VC_STATIC);
    dev.write_u32(base + niu::NOC_AT_LEN_BE_1, 0);
    dev.write_u32(base + niu::NOC_BRCST_EXCLUDE, 0);
    dev.write_u32(base + niu::NOC_L1_ACC_AT_INSTRN, 0);
    dev.write_u32(MAILBOX_REQUEST_ADDR, 0);
    dev.write_u32(HOST_READ_PTR_ADDR, 0);

    let meta = base + NIU_CMD_BUF_STRIDE;
    dev.write_u32(meta + niu::NOC_TARG_ADDR_LO, layout.meta_addr as u32);
    dev.write_u32(meta + niu::NOC_TARG_ADDR_MID, 0);
    dev.write_u32(meta + niu::NOC_TARG_ADDR_HI, 0);
    dev.write_u32(meta + niu::NOC_RET_ADDR_LO, meta_noc_addr as u32);
    dev.write_u32(meta + niu::NOC_RET_ADDR_MID, (meta_noc_addr >> 32) as u32);
    dev.write_u32(meta + niu::NOC_RET_ADDR_HI, PCIE_NOC_XY);
    dev.write_u32(meta + niu::NOC_PACKET_TAG, 0);
    dev.write_u32(meta + niu::NOC_CTRL, niu::NOC_CMD_WR | niu::NOC_CMD_VC_STATIC);
    dev.write_u32(meta + niu::NOC_AT_LEN_BE, RingMetadata::SIZE as u32);
    dev.write_u32(meta + niu::NOC_AT_LEN_BE_1, 0);
    dev.write_u32(meta + niu::NOC_BRCST_EXCLUDE, 0);
    dev.write_u32(meta + niu::NOC_L1_ACC_AT_INSTRN, 0);
}

/// Stop the TX queues from sending regular TT-link traffic.
fn quiesce_tx_queues<D: TileAccess>(dev: &mut D) {
    for q in 0..TXQ_COUNT {
        let base = txq_addr(q);
        dev.write_u32(base + txq::CTRL, txq::CTRL_NO_HEARTBEAT);
        dev.write_u32(base + txq::REMOTE_SEQ_TIMEOUT, u32::MAX);
    }
}

/// RX queue 2: raw, non-wrapping, buffer at L1 address 0.
fn configure_rx_queue<D: TileAccess>(dev: &mut D, e_ring_size: u32) {
    let base = rxq_addr(CAPTURE_RXQ);
    dev.write_u32(base + rxq::CTRL, rxq::CTRL_RAW_NO_WRAP);
    dev.write_u32(base + rxq::BUF_START_WORD_ADDR, 0);
    dev.write_u32(base + rxq::BUF_SIZE_WORDS, e_ring_size >> 4);
    dev.write_u32(base + rxq::HDR_CTRL, rxq::HDR_CTRL_KEEP_ALL);
    dev.write_u32(base + rxq::BUF_PTR, 0);
}

/// Route every frame to RX queue 2 with hardware metadata prepended.
#[allow(clippy::cast_possible_truncation)]
fn configure_classifier<D: TileAccess>(dev: &mut D) {
    dev.write_u32(RXCLASS_TCAM_FLUSH, 1);
    // IP ethertypes are rewritten so that unsupported IP headers are not dropped
    dev.write_u32(rxclass_user_defined_ethertype_addr(0), rxclass::ethertype_rewrite(0x0800));
    dev.write_u32(rxclass_user_defined_ethertype_addr(1), rxclass::ethertype_rewrite(0x86DD));
    dev.write_u32(RXCLASS_MAC_RX_ROUTING_ADDR, rxclass::MAC_RX_ROUTING_FROM_ACTIONS);
    dev.write_u32(
        RXCLASS_NO_MATCH_ACTIONS_ADDR,
        rxclass::NO_MATCH_PREPEND_HW_METADATA | rxclass::no_match_to_rxq(CAPTURE_RXQ as u32),
    );
}

/// Undo [`configure_classifier`] so that link training frames reach the
/// firmware again.
pub fn configure_rx_for_training<D: TileAccess>(dev: &mut D) {
    dev.write_u32(RXCLASS_MAC_RX_ROUTING_ADDR, rxclass::MAC_RX_ROUTING_FROM_MAC);
    dev.write_u32(RXCLASS_NO_MATCH_ACTIONS_ADDR, 0);
    dev.write_u32(rxclass_user_defined_ethertype_addr(0), 0);
    dev.write_u32(rxclass_user_defined_ethertype_addr(1), 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethdump_chip::payload::CODE_LEN;
    use ethdump_chip::tile::TileCoord;
    use ethdump_driver::SimDevice;

    const ETH: TileCoord = TileCoord::new(25, 25);

    fn rings() -> HostRings {
        HostRings {
            ring: HostBuffer::owned(1 << 21, 0x4_0000_0000),
            meta: HostBuffer::owned(4096, 0x4_0020_0000),
        }
    }

    fn sim() -> SimDevice {
        let mut sim = SimDevice::new();
        sim.set_tile(ETH);
        sim
    }

    #[test]
    fn layout_follows_ring() {
        let layout = DeviceLayout::new(256 << 10);
        assert_eq!(layout.meta_addr, 0x4_0000);
        assert_eq!(layout.code_addr, 0x4_0040);
        assert_eq!(layout.tx_buf_addr, 0x4_0040 + 0x188 + 32);
    }

    #[test]
    fn counter_digits() {
        assert_eq!(ascii_counter(42), u32::from_le_bytes(*b"0042"));
        assert_eq!(ascii_counter(9999), u32::from_le_bytes(*b"9999"));
        assert_eq!(ascii_counter(0), u32::from_le_bytes(*b"0000"));
        assert_eq!(&TRAFFIC_TEXT[12..16], b"0000");
    }

    #[test]
    fn classifier_drops_until_payload_runs() {
        let mut sim = sim();
        let rings = rings();
        configure_ethernet(&mut sim, &rings, 256 << 10).unwrap();

        let overrides = sim.writes_to(ETH, RXCLASS_OVERRIDE_DECISION_ADDR);
        assert_eq!(overrides, vec![rxclass::OVERRIDE_DROP, rxclass::OVERRIDE_ACCEPT]);
        assert_eq!(sim.writes_to(ETH, SOFT_RESET_ADDR), vec![soft_reset::E1, 0]);

        let drop = sim.position_of(ETH, RXCLASS_OVERRIDE_DECISION_ADDR, rxclass::OVERRIDE_DROP).unwrap();
        let accept = sim.position_of(ETH, RXCLASS_OVERRIDE_DECISION_ADDR, rxclass::OVERRIDE_ACCEPT).unwrap();
        let hold = sim.position_of(ETH, SOFT_RESET_ADDR, soft_reset::E1).unwrap();
        let release = sim.position_of(ETH, SOFT_RESET_ADDR, 0).unwrap();
        let pc = sim.position_of(ETH, E1_RESET_PC_ADDR, 0x4_0040).unwrap();
        let rxq_size = sim.position_of(ETH, rxq_addr(2) + rxq::BUF_SIZE_WORDS, (256 << 10) >> 4).unwrap();

        assert!(hold < drop);
        assert!(drop < rxq_size && rxq_size < pc && pc < release);
        assert_eq!(accept, sim.writes().len() - 1);
        assert!(release < accept);
    }

    #[test]
    fn payload_lands_in_l1() {
        let mut sim = sim();
        let rings = rings();
        sim.poke(ETH, rxq_addr(2) + rxq::PACKET_DROP_CNT, 17);
        let ctx = configure_ethernet(&mut sim, &rings, 64 << 10).unwrap();

        let code = ctx.layout.code_addr;
        assert_eq!(sim.peek(ETH, E1_RESET_PC_ADDR), code as u32);
        assert_eq!(sim.peek(ETH, E1_END_PC_ADDR), (code + CODE_LEN as u64) as u32);
        assert_eq!(ctx.initial_drop_count, 17);

        let args: Vec<u32> = (0..8).map(|i| sim.peek(ETH, code + CODE_LEN as u64 + i * 4)).collect();
        let args = PayloadArgs::from_words(&args.try_into().unwrap());
        assert_eq!(args.h_ring_noc_addr, 0x4_0000_0000);
        assert_eq!(args.h_ring_size, 1 << 21);
        assert_eq!(args.h_meta_addr, 64 << 10);
        assert_eq!(args.e_ring_mask, (64 << 10) - 1);
        assert_eq!(args.initial_drop_count, 17);
        assert_eq!(args.rxq_addr, 0xFFB9_6000);
        assert_eq!(args.niu_addr, 0xFFB3_0800);
    }

    #[test]
    fn metadata_mirrors_to_host() {
        let mut sim = sim();
        let rings = rings();
        rings.meta.write_u32(0, 99);
        let ctx = configure_ethernet(&mut sim, &rings, 256 << 10).unwrap();

        assert_eq!(MetadataView::new(&rings.meta).load(), RingMetadata::initial());
        assert_eq!(sim.peek(ETH, ctx.layout.meta_addr + 4), 1);

        let cmd_buf = niu_addr(1) + NIU_CMD_BUF_STRIDE;
        assert_eq!(sim.peek(ETH, cmd_buf + niu::NOC_RET_ADDR_LO), 0x0020_0000);
        assert_eq!(sim.peek(ETH, cmd_buf + niu::NOC_RET_ADDR_MID), 0x4);
        assert_eq!(sim.peek(ETH, cmd_buf + niu::NOC_RET_ADDR_HI), PCIE_NOC_XY);
        assert_eq!(sim.peek(ETH, cmd_buf + niu::NOC_AT_LEN_BE), 64);
        assert_eq!(sim.writes_to(ETH, MAILBOX_REQUEST_ADDR), vec![0]);
        assert_eq!(sim.writes_to(ETH, HOST_READ_PTR_ADDR), vec![0]);
    }

    #[test]
    fn traffic_header_copies_macs_from_template_zero() {
        let mut sim = sim();
        sim.poke(ETH, txpkt_cfg_addr(0) + txpkt_cfg::MAC_SA, 0x1122_3344);
        sim.poke(ETH, txpkt_cfg_addr(0) + txpkt_cfg::MAC_DA + 4, 0x5566);
        let ctx = configure_ethernet(&mut sim, &rings(), 256 << 10).unwrap();

        let hdr = txpkt_cfg_addr(9);
        assert_eq!(sim.peek(ETH, hdr + txpkt_cfg::MAC_SA), 0x1122_3344);
        assert_eq!(sim.peek(ETH, hdr + txpkt_cfg::MAC_DA + 4), 0x5566);
        assert_eq!(sim.peek(ETH, hdr + txpkt_cfg::USE_ETHERTYPE), 0x0800_0001);
        assert_eq!(sim.peek(ETH, hdr + txpkt_cfg::L3_HEADER + 16), 0x7F00_0002);
        assert_eq!(ctx.tx_doorbell, txq_addr(2) + txq::CMD);
        assert_eq!(sim.peek(ETH, ctx.tx_counter_addr), u32::from_le_bytes(*b"0000"));

        ctx.send_traffic(&mut sim, 7);
        assert_eq!(sim.peek(ETH, ctx.tx_counter_addr), u32::from_le_bytes(*b"0007"));
        assert_eq!(sim.writes_to(ETH, ctx.tx_doorbell), vec![1]);
    }

    #[test]
    fn old_driver_without_cleanup_is_tolerated() {
        let mut sim = sim();
        sim.reject_cleanup(true);
        configure_ethernet(&mut sim, &rings(), 256 << 10).unwrap();
        assert_eq!(sim.cleanup(), None);
        assert_eq!(sim.peek(ETH, SOFT_RESET_ADDR), 0);

        let mut sim = self::sim();
        configure_ethernet(&mut sim, &rings(), 256 << 10).unwrap();
        let cleanup = sim.cleanup().unwrap();
        assert_eq!((cleanup.tile, cleanup.addr, cleanup.value), (ETH, SOFT_RESET_ADDR, soft_reset::E1));
    }

    #[test]
    fn bad_ring_size_rejected_before_touching_device() {
        let mut sim = sim();
        assert!(configure_ethernet(&mut sim, &rings(), 3 << 12).is_err());
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn device_ring_bounds_are_inclusive() {
        assert!(check_device_ring(1 << MIN_RING_LOG2).is_ok());
        assert!(check_device_ring(1 << MAX_RING_LOG2).is_ok());
        match check_device_ring(16) {
            Err(CaptureError::InvalidRingSize { which, size, min, max }) => {
                assert_eq!(which, "device");
                assert_eq!(size, 16);
                assert_eq!(min, 32);
                assert_eq!(max, 1 << 31);
            }
            other => panic!("expected InvalidRingSize, got {other:?}"),
        }
    }
}
