//! Markdown status tables for `--hwinfo` and `--txheaders`.

use ethdump_chip::boot::{
    derived_mac_minor, mac_bytes, params, results, word_addr, PortStatus, BOOT_PARAMS_ADDR, BOOT_RESULTS_ADDR,
    SERDES_POSTCODE_VALID, TRAIN_STATUS_LABELS,
};
use ethdump_chip::regs::{niu, niu_addr, txpkt_cfg, txpkt_cfg_addr, TXPKT_CFG_COUNT};
use ethdump_chip::tile::{ethernet_instance, is_ethernet_endpoint, TileCoord};
use ethdump_driver::TileAccess;
use std::io::{self, Write};

fn result<D: TileAccess>(dev: &mut D, index: u64) -> u32 {
    dev.read_u32(word_addr(BOOT_RESULTS_ADDR, index))
}

fn param<D: TileAccess>(dev: &mut D, index: u64) -> u32 {
    dev.read_u32(word_addr(BOOT_PARAMS_ADDR, index))
}

fn write_mac(out: &mut impl Write, mac: [u8; 6]) -> io::Result<()> {
    for (i, b) in mac.iter().enumerate() {
        write!(out, "{}{b:02x}", if i == 0 { "" } else { ":" })?;
    }
    Ok(())
}

/// Print one row per lower-row Ethernet tile.
///
/// Leaves `dev` pointed at the last tile visited.
///
/// # Errors
///
/// Returns any error writing to `out`.
pub fn write_hwinfo<D: TileAccess>(dev: &mut D, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "|Tile|NoC #0  |Logical  |Port   |Training    |Serdes          |MAC Address      |")?;
    writeln!(out, "|----|--------|---------|-------|------------|----------------|-----------------|")?;
    for tile in TileCoord::lower_row() {
        dev.set_tile(tile);
        let endpoint = dev.read_u32(niu_addr(0) + niu::NOC_ENDPOINT_ID);
        if !is_ethernet_endpoint(endpoint) {
            continue;
        }
        write_hwinfo_row(dev, out, tile, endpoint)?;
    }
    Ok(())
}

fn write_hwinfo_row<D: TileAccess>(dev: &mut D, out: &mut impl Write, tile: TileCoord, endpoint: u32) -> io::Result<()> {
    let instance = ethernet_instance(endpoint);
    write!(out, "|E{instance:<3}|X={:<2},Y={}|", tile.x, tile.y)?;

    if dev.read_u32(niu_addr(0) + niu::NIU_CFG_0) & niu::NIU_CFG_0_HARVESTED != 0 {
        return writeln!(out, "Harvested|N/A    |N/A         |N/A             |N/A              |");
    }

    let logical = dev.read_u32(niu_addr(0) + niu::NOC_ID_LOGICAL) & 0xFFF;
    write!(out, "X={:<2},Y={:<2}|", logical & 0x3F, logical >> 6)?;

    let port_raw = result(dev, results::PORT_STATUS);
    let port = PortStatus::from_raw(port_raw);
    match port.label() {
        Some(label) => write!(out, "{label:<7}|")?,
        None => write!(out, "Status {port_raw}|")?,
    }

    let train = if port == PortStatus::Unknown {
        0
    } else {
        result(dev, results::TRAIN_STATUS)
    };
    match TRAIN_STATUS_LABELS.get(train as usize) {
        Some(label) => write!(out, "{label:<12}|")?,
        None => write!(out, "Status {train:<5}|")?,
    }

    if SERDES_POSTCODE_VALID.contains(&result(dev, results::SERDES_POSTCODE)) {
        let serdes = result(dev, results::SERDES_INSTANCE);
        let lanes = result(dev, results::SERDES_LANES);
        let lanes: Vec<String> = (0..8u32).filter(|&l| lanes & (1 << l) != 0).map(|l| l.to_string()).collect();
        write!(out, "{:<16}|", format!("#{serdes} lanes {}", lanes.join(",")))?;
    } else {
        write!(out, "N/A             |")?;
    }

    if port == PortStatus::NoPort {
        return writeln!(out, "N/A              |");
    }
    let mac = if result(dev, results::CHIP_INFO_EXCHANGED) == 1 {
        mac_bytes(result(dev, results::PEER_MAC_MAJOR), result(dev, results::PEER_MAC_MINOR))
    } else {
        let minor = derived_mac_minor(param(dev, params::ENABLED_MASK), param(dev, params::MAC_MINOR), endpoint & 0x1F);
        mac_bytes(param(dev, params::MAC_MAJOR), minor)
    };
    write_mac(out, mac)?;
    writeln!(out, "|")
}

/// Print the TX header templates of the selected tile.
///
/// # Errors
///
/// Returns any error writing to `out`.
#[allow(clippy::cast_possible_truncation)]
pub fn write_txheaders<D: TileAccess>(dev: &mut D, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "|#|Destination MAC  |Source MAC       |Ethertype|")?;
    writeln!(out, "|-|-----------------|-----------------|---------|")?;
    for i in 0..TXPKT_CFG_COUNT {
        let base = txpkt_cfg_addr(i);
        write!(out, "|{i}")?;
        for field in [txpkt_cfg::MAC_DA, txpkt_cfg::MAC_SA] {
            let w0 = dev.read_u32(base + field);
            let w1 = dev.read_u32(base + field + 4);
            write!(out, "|")?;
            write_mac(out, [(w1 >> 8) as u8, w1 as u8, (w0 >> 24) as u8, (w0 >> 16) as u8, (w0 >> 8) as u8, w0 as u8])?;
        }
        let ethertype = dev.read_u32(base + txpkt_cfg::USE_ETHERTYPE);
        if ethertype & 1 != 0 {
            write!(out, "|0x{:04x}   ", ethertype >> 16)?;
        } else {
            write!(out, "|Length   ")?;
        }
        writeln!(out, "|")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethdump_driver::SimDevice;

    fn table(sim: &mut SimDevice, f: fn(&mut SimDevice, &mut Vec<u8>) -> io::Result<()>) -> Vec<String> {
        let mut out = Vec::new();
        f(sim, &mut out).unwrap();
        String::from_utf8(out).unwrap().lines().map(str::to_owned).collect()
    }

    fn ethernet(sim: &mut SimDevice, tile: TileCoord, instance: u32) {
        sim.poke(tile, niu_addr(0) + niu::NOC_ENDPOINT_ID, 0x0002_0000 | instance);
    }

    #[test]
    fn hwinfo_rows() {
        let mut sim = SimDevice::new();
        let up = TileCoord::new(1, 1);
        ethernet(&mut sim, up, 0);
        sim.poke(up, niu_addr(0) + niu::NOC_ID_LOGICAL, 0x041);
        sim.poke(up, word_addr(BOOT_RESULTS_ADDR, results::PORT_STATUS), 1);
        sim.poke(up, word_addr(BOOT_RESULTS_ADDR, results::TRAIN_STATUS), 2);
        sim.poke(up, word_addr(BOOT_RESULTS_ADDR, results::SERDES_POSTCODE), 0xC0DE_1234);
        sim.poke(up, word_addr(BOOT_RESULTS_ADDR, results::SERDES_INSTANCE), 2);
        sim.poke(up, word_addr(BOOT_RESULTS_ADDR, results::SERDES_LANES), 0xF);
        sim.poke(up, word_addr(BOOT_PARAMS_ADDR, params::ENABLED_MASK), 1);
        sim.poke(up, word_addr(BOOT_PARAMS_ADDR, params::MAC_MAJOR), 0x0020_8C47);
        sim.poke(up, word_addr(BOOT_PARAMS_ADDR, params::MAC_MINOR), 0x12);

        let harvested = TileCoord::new(2, 1);
        ethernet(&mut sim, harvested, 1);
        sim.poke(harvested, niu_addr(0) + niu::NIU_CFG_0, niu::NIU_CFG_0_HARVESTED);

        let absent = TileCoord::new(10, 1);
        ethernet(&mut sim, absent, 9);
        sim.poke(absent, niu_addr(0) + niu::NOC_ID_LOGICAL, 0x0C9);
        sim.poke(absent, word_addr(BOOT_RESULTS_ADDR, results::PORT_STATUS), 3);
        sim.poke(absent, word_addr(BOOT_RESULTS_ADDR, results::TRAIN_STATUS), 42);

        let lines = table(&mut sim, |d, o| write_hwinfo(d, o));
        assert_eq!(
            lines,
            [
                "|Tile|NoC #0  |Logical  |Port   |Training    |Serdes          |MAC Address      |",
                "|----|--------|---------|-------|------------|----------------|-----------------|",
                "|E0  |X=1 ,Y=1|X=1 ,Y=1 |Up     |Complete    |#2 lanes 0,1,2,3|20:8c:47:00:00:12|",
                "|E1  |X=2 ,Y=1|Harvested|N/A    |N/A         |N/A             |N/A              |",
                "|E9  |X=10,Y=1|X=9 ,Y=3 |No     |Status 42   |N/A             |N/A              |",
            ]
        );
    }

    #[test]
    fn hwinfo_prefers_exchanged_mac() {
        let mut sim = SimDevice::new();
        let tile = TileCoord::new(4, 1);
        ethernet(&mut sim, tile, 3);
        sim.poke(tile, word_addr(BOOT_RESULTS_ADDR, results::PORT_STATUS), 1);
        sim.poke(tile, word_addr(BOOT_RESULTS_ADDR, results::CHIP_INFO_EXCHANGED), 1);
        sim.poke(tile, word_addr(BOOT_RESULTS_ADDR, results::PEER_MAC_MAJOR), 0x00AA_BBCC);
        sim.poke(tile, word_addr(BOOT_RESULTS_ADDR, results::PEER_MAC_MINOR), 0x00DD_EEFF);

        let lines = table(&mut sim, |d, o| write_hwinfo(d, o));
        assert_eq!(lines.len(), 3);
        assert!(lines[2].ends_with("|aa:bb:cc:dd:ee:ff|"), "{}", lines[2]);
    }

    #[test]
    fn txheader_rows() {
        let mut sim = SimDevice::new();
        let tile = TileCoord::new(25, 25);
        sim.set_tile(tile);
        let t0 = txpkt_cfg_addr(0);
        sim.poke(tile, t0 + txpkt_cfg::MAC_DA, 0x4455_6677);
        sim.poke(tile, t0 + txpkt_cfg::MAC_DA + 4, 0x0000_2233);
        sim.poke(tile, t0 + txpkt_cfg::MAC_SA, 0xCCDD_EEFF);
        sim.poke(tile, t0 + txpkt_cfg::MAC_SA + 4, 0x0000_AABB);
        sim.poke(tile, t0 + txpkt_cfg::USE_ETHERTYPE, 0x0800_0001);

        let lines = table(&mut sim, |d, o| write_txheaders(d, o));
        assert_eq!(lines.len(), 12);
        assert_eq!(lines[2], "|0|22:33:44:55:66:77|aa:bb:cc:dd:ee:ff|0x0800   |");
        assert_eq!(lines[11], "|9|00:00:00:00:00:00|00:00:00:00:00:00|Length   |");
    }
}
