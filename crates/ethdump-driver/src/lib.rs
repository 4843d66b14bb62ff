//! Thin user-mode driver for Tenstorrent Blackhole.
//!
//! Just enough to poke at device memory from user space: the kernel driver
//! (tt-kmd) is asked for a 2 MiB TLB and for pinned host memory, and
//! everything else happens through our own mappings.
//!
//! # Layers
//!
//! ```text
//! TileAccess        word load/store at (tile, address); PcieDevice or SimDevice
//!   TlbWindow       cached TLB configuration, rewindowing on demand
//!     MappedRegion  volatile access to a shared mapping
//!       Kmd         tt-kmd ioctls
//! HostBuffer        pinned host memory with a NoC address
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use ethdump_chip::tile::TileCoord;
//! use ethdump_driver::{PcieDevice, TileAccess};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut dev = PcieDevice::open("0")?;
//! dev.set_tile(TileCoord::new(25, 25));
//! let endpoint = dev.read_u32(0xFFB2_0048);
//! println!("endpoint id {endpoint:#010x}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod access;
mod device;
mod error;
pub mod hostbuf;
pub mod kmd;
pub mod mmio;
pub mod sim;
pub mod tlb;

pub use access::TileAccess;
pub use device::{resolve_device_path, PcieDevice};
pub use error::{DriverError, Result};
pub use hostbuf::{AllocStrategy, Backing, HostBuffer, PinningDriver, ALLOC_CASCADE};
pub use kmd::Kmd;
pub use sim::{SimCleanup, SimDevice, SimWrite};
pub use tlb::{TlbConfigRegs, TlbWindow};
