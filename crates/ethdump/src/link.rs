//! Ethernet tile selection and link state.

use crate::clock::{Clock, NANOS_PER_SEC};
use crate::configure::configure_rx_for_training;
use crate::error::{CaptureError, Result};
use ethdump_chip::boot::{params, results, word_addr, PortStatus, BOOT_PARAMS_ADDR, BOOT_RESULTS_ADDR};
use ethdump_chip::regs::{niu, niu_addr, soft_reset, SOFT_RESET_ADDR};
use ethdump_chip::tile::{is_ethernet_endpoint, TileCoord};
use ethdump_driver::TileAccess;

/// How long link training may take after a loopback change.
pub const TRAINING_TIMEOUT_NANOS: u64 = NANOS_PER_SEC;

const PORT_STATUS_ADDR: u64 = word_addr(BOOT_RESULTS_ADDR, results::PORT_STATUS);

/// Point `dev` at the Ethernet tile in column `x` and check that it is
/// usable.
///
/// # Errors
///
/// Fails if `x` is not an Ethernet column, the tile is not an Ethernet
/// endpoint, or the tile is harvested.
pub fn select_ethernet_tile<D: TileAccess>(dev: &mut D, x: u8) -> Result<TileCoord> {
    let tile = TileCoord::ethernet(x).ok_or(CaptureError::NotEthernetColumn(x))?;
    dev.set_tile(tile);

    let endpoint_id = dev.read_u32(niu_addr(0) + niu::NOC_ENDPOINT_ID);
    if !is_ethernet_endpoint(endpoint_id) {
        return Err(CaptureError::NotEthernetTile { tile, endpoint_id });
    }
    if dev.read_u32(niu_addr(0) + niu::NIU_CFG_0) & niu::NIU_CFG_0_HARVESTED != 0 {
        return Err(CaptureError::Harvested(tile));
    }
    tracing::debug!("Selected Ethernet tile {tile} (endpoint {endpoint_id:#x})");
    Ok(tile)
}

/// Wait for the selected tile's port to come up, retraining it in
/// `loopback` mode first if given.
///
/// # Errors
///
/// Fails if the tile has no port, training times out, or the link is down.
pub fn wait_for_link<D: TileAccess, C: Clock + ?Sized>(dev: &mut D, loopback: Option<u8>, clock: &C) -> Result<()> {
    let mut status = dev.read_u32(PORT_STATUS_ADDR);
    if status >= PortStatus::NoPort.raw() {
        return Err(CaptureError::NoPort(status));
    }

    if let Some(mode) = loopback {
        tracing::info!("Retraining {} with loopback mode {mode}", dev.tile());
        dev.write_u32(SOFT_RESET_ADDR, soft_reset::E0 | soft_reset::E1);
        configure_rx_for_training(dev);
        dev.write_u32(word_addr(BOOT_PARAMS_ADDR, params::LOOPBACK_MODE), u32::from(mode));
        dev.write_u32(PORT_STATUS_ADDR, PortStatus::Unknown.raw());
        status = PortStatus::Unknown.raw();
        dev.write_u32(SOFT_RESET_ADDR, soft_reset::E1);
    }

    if status == PortStatus::Unknown.raw() {
        let start = clock.now_nanos();
        loop {
            status = dev.read_u32(PORT_STATUS_ADDR);
            if status != PortStatus::Unknown.raw() {
                break;
            }
            if clock.now_nanos().saturating_sub(start) >= TRAINING_TIMEOUT_NANOS {
                return Err(CaptureError::TrainingTimeout);
            }
        }
        if status >= PortStatus::NoPort.raw() {
            return Err(CaptureError::UnknownPortStatus(status));
        }
    }

    match PortStatus::from_raw(status) {
        PortStatus::Up => {
            tracing::info!("Link on {} is up", dev.tile());
            Ok(())
        }
        _ => Err(CaptureError::LinkDown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use ethdump_chip::regs::RXCLASS_MAC_RX_ROUTING_ADDR;
    use ethdump_driver::SimDevice;

    const ETH: TileCoord = TileCoord::new(3, 1);
    const ENDPOINT: u64 = niu_addr(0) + niu::NOC_ENDPOINT_ID;

    #[test]
    fn selects_ethernet_endpoint() {
        let mut sim = SimDevice::new();
        sim.poke(ETH, ENDPOINT, 0x0002_0005);
        assert_eq!(select_ethernet_tile(&mut sim, 3).unwrap(), ETH);
        assert_eq!(sim.tile(), ETH);
    }

    #[test]
    fn rejects_other_tiles() {
        let mut sim = SimDevice::new();
        assert!(matches!(select_ethernet_tile(&mut sim, 8), Err(CaptureError::NotEthernetColumn(8))));
        assert!(matches!(
            select_ethernet_tile(&mut sim, 3),
            Err(CaptureError::NotEthernetTile { endpoint_id: 0, .. })
        ));

        sim.poke(ETH, ENDPOINT, 0x0002_0005);
        sim.poke(ETH, niu_addr(0) + niu::NIU_CFG_0, niu::NIU_CFG_0_HARVESTED);
        assert!(matches!(select_ethernet_tile(&mut sim, 3), Err(CaptureError::Harvested(ETH))));
    }

    #[test]
    fn link_states() {
        let clock = ManualClock::new(0);
        let mut sim = SimDevice::new();
        sim.set_tile(ETH);

        sim.poke(ETH, PORT_STATUS_ADDR, 1);
        wait_for_link(&mut sim, None, &clock).unwrap();
        assert!(sim.writes().is_empty());

        sim.poke(ETH, PORT_STATUS_ADDR, 2);
        assert!(matches!(wait_for_link(&mut sim, None, &clock), Err(CaptureError::LinkDown)));

        sim.poke(ETH, PORT_STATUS_ADDR, 3);
        assert!(matches!(wait_for_link(&mut sim, Some(1), &clock), Err(CaptureError::NoPort(3))));
        assert!(sim.writes().is_empty());
    }

    /// Clock that jumps forward by a fixed step on every read.
    struct Ticking {
        now: std::cell::Cell<u64>,
        step: u64,
    }

    impl Clock for Ticking {
        fn now_nanos(&self) -> u64 {
            let now = self.now.get();
            self.now.set(now + self.step);
            now
        }
    }

    #[test]
    fn training_times_out() {
        let clock = Ticking {
            now: std::cell::Cell::new(0),
            step: NANOS_PER_SEC / 4,
        };
        let mut sim = SimDevice::new();
        sim.set_tile(ETH);
        sim.poke(ETH, PORT_STATUS_ADDR, 1);

        let err = wait_for_link(&mut sim, Some(2), &clock).unwrap_err();
        assert!(matches!(err, CaptureError::TrainingTimeout));
        assert_eq!(sim.writes_to(ETH, SOFT_RESET_ADDR), vec![soft_reset::E0 | soft_reset::E1, soft_reset::E1]);
        assert_eq!(sim.peek(ETH, word_addr(BOOT_PARAMS_ADDR, params::LOOPBACK_MODE)), 2);
        assert_eq!(sim.writes_to(ETH, PORT_STATUS_ADDR), vec![0]);
        assert_eq!(sim.writes_to(ETH, RXCLASS_MAC_RX_ROUTING_ADDR), vec![0]);
    }
}
