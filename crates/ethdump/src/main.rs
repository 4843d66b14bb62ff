//! `ethdump`: capture Ethernet traffic from a Blackhole Ethernet tile.
//!
//! ```text
//! USAGE:
//!   ethdump [--device N] [--eth-x X] [--out FILE]   Capture until Ctrl-C
//!   ethdump --hwinfo                                 Ethernet tile status table
//!   ethdump --txheaders [--eth-x X]                  TX header templates
//!   ethdump --loopback MODE [--eth-x X] ...          Retrain in loopback first
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use ethdump::config::{DEVICE_RING_DEFAULT, HOST_RING_DEFAULT};
use ethdump::report::{write_hwinfo, write_txheaders};
use ethdump::{
    parse_byte_size, select_ethernet_tile, wait_for_link, CancelToken, CaptureConfig, CaptureLoop, HostRings,
    PcapWriter, SystemClock,
};
use ethdump_chip::tile::DEFAULT_ETHERNET_X;
use ethdump_driver::hostbuf::host_page_size;
use ethdump_driver::{HostBuffer, PcieDevice};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ethdump", about = "Capture Ethernet traffic from a Blackhole Ethernet tile", version)]
struct Cli {
    /// Device path, or N for /dev/tenstorrent/N.
    #[arg(long, default_value = "")]
    device: String,

    /// X coordinate of the Ethernet tile (1-7, 10-16, 20-31).
    #[arg(long, visible_alias = "eth-x", default_value_t = DEFAULT_ETHERNET_X)]
    ethernet_x: u8,

    /// Tile L1 bytes used as the RX ring (4K to 256K, power of two).
    #[arg(long, value_parser = parse_byte_size, default_value_t = DEVICE_RING_DEFAULT)]
    device_ring_size: u32,

    /// Pinned host bytes used as the capture ring (4K to 2G, power of two).
    #[arg(long, value_parser = parse_byte_size, default_value_t = HOST_RING_DEFAULT)]
    host_ring_size: u32,

    /// Output pcap file [default: tt_<X>.pcap].
    #[arg(long, visible_alias = "out")]
    output: Option<PathBuf>,

    /// Retrain the link in this loopback mode before capturing.
    #[arg(long, visible_alias = "loopback-mode")]
    loopback: Option<u8>,

    /// Print the status of every lower-row Ethernet tile.
    #[arg(long)]
    hwinfo: bool,

    /// Print the TX header templates of the selected tile.
    #[arg(long)]
    txheaders: bool,

    /// Send a counter-stamped UDP packet whenever the link is idle.
    #[arg(long)]
    generate_traffic: bool,

    /// Give up after this many losses in a row with nothing captured.
    #[arg(long)]
    max_recoveries: Option<u32>,
}

impl From<Cli> for CaptureConfig {
    fn from(cli: Cli) -> Self {
        Self {
            device: cli.device,
            ethernet_x: cli.ethernet_x,
            device_ring_size: cli.device_ring_size,
            host_ring_size: cli.host_ring_size,
            output: cli.output,
            loopback_mode: cli.loopback,
            hwinfo: cli.hwinfo,
            txheaders: cli.txheaders,
            generate_traffic: cli.generate_traffic,
            max_recoveries: cli.max_recoveries,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let config = CaptureConfig::from(Cli::parse());
    config.validate()?;

    let mut dev = PcieDevice::open(&config.device)?;

    if config.hwinfo {
        write_hwinfo(&mut dev, &mut std::io::stdout().lock()).context("writing hardware table")?;
    }

    let capturing = config.capturing();
    if capturing || config.loopback_mode.is_some() {
        select_ethernet_tile(&mut dev, config.ethernet_x)?;
        wait_for_link(&mut dev, config.loopback_mode, &SystemClock)?;
    }

    if config.txheaders {
        select_ethernet_tile(&mut dev, config.ethernet_x)?;
        write_txheaders(&mut dev, &mut std::io::stdout().lock()).context("writing TX header table")?;
    }

    if capturing {
        cmd_capture(dev, &config)?;
    }

    Ok(())
}

fn cmd_capture(dev: PcieDevice, config: &CaptureConfig) -> Result<()> {
    let cancel = CancelToken::on_sigint().context("installing SIGINT handler")?;

    let rings = HostRings {
        ring: HostBuffer::allocate(dev.kmd(), config.host_ring_size as usize)?,
        meta: HostBuffer::allocate(dev.kmd(), host_page_size())?,
    };
    let path = config.output_path();
    let writer = PcapWriter::create(&path)?;

    let mut capture = CaptureLoop::start(dev, rings, writer, SystemClock, config)?;
    let summary = capture.run_to_completion(&cancel)?;

    println!(
        "Captured {} packets, wrote {} bytes to {}",
        summary.packets,
        summary.bytes,
        path.display()
    );
    Ok(())
}
