//! Software stand-in for a Blackhole.
//!
//! `SimDevice` implements [`TileAccess`] over a sparse word memory keyed by
//! tile and address. It has no behaviour of its own: registers read back
//! whatever was last written or poked, and every write is logged so that
//! register programs can be checked step by step. Tests drive the "device
//! side" of a protocol by poking values in between host operations.
//!
//! ```
//! use ethdump_chip::tile::TileCoord;
//! use ethdump_driver::{SimDevice, TileAccess};
//!
//! let mut sim = SimDevice::new();
//! let eth = TileCoord::new(25, 25);
//! sim.poke(eth, 0xFFB2_0048, 0x0002_0005);
//! sim.set_tile(eth);
//! assert_eq!(sim.read_u32(0xFFB2_0048), 0x0002_0005);
//! ```

use crate::access::TileAccess;
use crate::error::{DriverError, Result};
use ethdump_chip::tile::TileCoord;
use std::collections::HashMap;

/// One logged register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimWrite {
    /// Tile written
    pub tile: TileCoord,
    /// Address within the tile
    pub addr: u64,
    /// Value written
    pub value: u32,
}

/// A kill-time cleanup registered with [`TileAccess::arm_reset_on_exit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimCleanup {
    /// Tile the cleanup targets
    pub tile: TileCoord,
    /// Address to write
    pub addr: u64,
    /// Value to write
    pub value: u32,
}

/// Simulated device.
#[derive(Debug, Default)]
pub struct SimDevice {
    tile: Option<TileCoord>,
    memory: HashMap<(TileCoord, u64), u32>,
    writes: Vec<SimWrite>,
    cleanup: Option<SimCleanup>,
    reject_cleanup: bool,
}

impl SimDevice {
    /// Empty device; all memory reads as zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `arm_reset_on_exit` fail, as an old kernel driver would.
    pub fn reject_cleanup(&mut self, reject: bool) {
        self.reject_cleanup = reject;
    }

    /// Set a word without logging a write.
    pub fn poke(&mut self, tile: TileCoord, addr: u64, value: u32) {
        self.memory.insert((tile, addr), value);
    }

    /// Current value of a word.
    pub fn peek(&self, tile: TileCoord, addr: u64) -> u32 {
        self.memory.get(&(tile, addr)).copied().unwrap_or(0)
    }

    /// All writes so far, oldest first.
    pub fn writes(&self) -> &[SimWrite] {
        &self.writes
    }

    /// Values written to one register, oldest first.
    pub fn writes_to(&self, tile: TileCoord, addr: u64) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|w| w.tile == tile && w.addr == addr)
            .map(|w| w.value)
            .collect()
    }

    /// Position in the write log of the first write of `value` to `addr`.
    pub fn position_of(&self, tile: TileCoord, addr: u64, value: u32) -> Option<usize> {
        self.writes
            .iter()
            .position(|w| w.tile == tile && w.addr == addr && w.value == value)
    }

    /// Forget logged writes (memory is kept).
    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    /// Registered kill-time cleanup, if any.
    pub const fn cleanup(&self) -> Option<SimCleanup> {
        self.cleanup
    }

    fn current(&self) -> TileCoord {
        self.tile.unwrap_or(TileCoord::new(0, 0))
    }
}

impl TileAccess for SimDevice {
    fn set_tile(&mut self, tile: TileCoord) {
        self.tile = Some(tile);
    }

    fn tile(&self) -> TileCoord {
        self.current()
    }

    fn read_u32(&mut self, addr: u64) -> u32 {
        self.peek(self.current(), addr)
    }

    fn write_u32(&mut self, addr: u64, value: u32) {
        let tile = self.current();
        self.memory.insert((tile, addr), value);
        self.writes.push(SimWrite { tile, addr, value });
    }

    fn arm_reset_on_exit(&mut self, addr: u64, value: u32) -> Result<()> {
        if self.reject_cleanup {
            return Err(DriverError::Ioctl {
                request: "SET_NOC_CLEANUP",
                source: std::io::Error::from_raw_os_error(libc::EINVAL),
            });
        }
        self.cleanup = Some(SimCleanup {
            tile: self.current(),
            addr,
            value,
        });
        Ok(())
    }
}
