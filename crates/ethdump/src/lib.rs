//! Packet capture from a Blackhole Ethernet tile.
//!
//! The capture path has two halves. On the device, a small RISC-V payload
//! on the tile's E1 core moves frames from the RX queue into a ring in
//! pinned host memory. On the host, [`CaptureLoop`] drains that ring into a
//! nanosecond pcap file and keeps the payload alive.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | Validated run configuration |
//! | [`size`] | Byte-size argument parser |
//! | [`link`] | Ethernet tile selection, link training wait |
//! | [`configure`] | Tile programming and payload deployment |
//! | [`capture`] | Host side of the ring protocol |
//! | [`frame`] | Ring entry headers |
//! | [`metadata`] | Metadata block shared with the payload |
//! | [`pcap`] | Capture file writer |
//! | [`report`] | `--hwinfo` and `--txheaders` tables |
//!
//! Everything that touches the device is generic over
//! [`TileAccess`](ethdump_driver::TileAccess), so it runs against
//! [`SimDevice`](ethdump_driver::SimDevice) as well as real hardware.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod cancel;
pub mod capture;
pub mod clock;
pub mod config;
pub mod configure;
pub mod error;
pub mod frame;
pub mod link;
pub mod metadata;
pub mod pcap;
pub mod report;
pub mod size;

pub use cancel::CancelToken;
pub use capture::{CaptureLoop, CaptureSummary, Step};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CaptureConfig;
pub use configure::{configure_ethernet, deploy_payload, CaptureContext, HostRings};
pub use error::{CaptureError, Result};
pub use link::{select_ethernet_tile, wait_for_link};
pub use pcap::PcapWriter;
pub use size::parse_byte_size;
