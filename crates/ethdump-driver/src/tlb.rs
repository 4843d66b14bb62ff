//! TLB window with cached configuration.
//!
//! Reprogramming a TLB costs one uncached BAR0 write per changed word, so
//! the two address/coordinate words are cached and only rewritten when they
//! differ. Consecutive accesses to one 2 MiB region of one tile touch the
//! configuration registers at most once.

use crate::mmio::MappedRegion;
use ethdump_chip::pcie::{
    tlb_cfg1_coords, tlb_cfg1_xy, TlbAddress, TLB_CFG1_ADDR_MASK, TLB_CFG_STRICT_AXI,
    TLB_CONFIG_ADDR, TLB_CONFIG_ADDR_STRIDES, TLB_CONFIG_WORDS, TLB_STRIDE_COUNT,
};
use ethdump_chip::tile::TileCoord;

/// Access to the configuration words of one TLB.
pub trait TlbConfigRegs {
    /// Read configuration word `index` (0..3).
    fn read_cfg(&self, index: usize) -> u32;

    /// Write configuration word `index` (0..3).
    ///
    /// The write must be visible to the device before any later window access.
    fn write_cfg(&mut self, index: usize, value: u32);
}

/// Configuration words of a TLB living in the mapped BAR0 block.
#[derive(Debug)]
pub struct Bar0TlbRegs {
    region: MappedRegion,
    cfg_offset: usize,
}

impl Bar0TlbRegs {
    /// Take over TLB `id`: clear its stride register and request strict AXI
    /// ordering.
    ///
    /// `region` must map BAR0 from `TLB_CONFIG_ADDR` through `TLB_CONFIG_ADDR_END`.
    pub fn init(region: MappedRegion, id: u32) -> Self {
        if id < TLB_STRIDE_COUNT {
            let stride = (TLB_CONFIG_ADDR_STRIDES - TLB_CONFIG_ADDR) as usize + id as usize * 4;
            region.write32_fenced(stride, 0);
        }
        let mut regs = Self {
            region,
            cfg_offset: id as usize * TLB_CONFIG_WORDS * 4,
        };
        regs.write_cfg(2, TLB_CFG_STRICT_AXI);
        regs
    }
}

impl TlbConfigRegs for Bar0TlbRegs {
    fn read_cfg(&self, index: usize) -> u32 {
        self.region.read32(self.cfg_offset + index * 4)
    }

    fn write_cfg(&mut self, index: usize, value: u32) {
        self.region.write32_fenced(self.cfg_offset + index * 4, value);
    }
}

/// A TLB whose target is changed lazily.
#[derive(Debug)]
pub struct TlbWindow<R> {
    regs: R,
    /// Last values written to (or read from) `cfg[0]` and `cfg[1]`.
    cfg: [u32; 2],
}

impl<R: TlbConfigRegs> TlbWindow<R> {
    /// Wrap `regs`, seeding the cache from hardware.
    pub fn new(regs: R) -> Self {
        let cfg = [regs.read_cfg(0), regs.read_cfg(1)];
        Self { regs, cfg }
    }

    fn update(&mut self, index: usize, value: u32) {
        if self.cfg[index] != value {
            self.regs.write_cfg(index, value);
            self.cfg[index] = value;
        }
    }

    /// Point the window at `tile`, keeping the address bits.
    pub fn set_tile(&mut self, tile: TileCoord) {
        let xy = (self.cfg[1] & TLB_CFG1_ADDR_MASK) + tlb_cfg1_xy(tile.x, tile.y);
        self.update(1, xy);
    }

    /// Tile the window currently targets.
    pub fn tile(&self) -> TileCoord {
        let (x, y) = tlb_cfg1_coords(self.cfg[1]);
        TileCoord::new(x, y)
    }

    /// Make `addr` on the current tile reachable and return its offset in
    /// the window.
    pub fn translate(&mut self, addr: u64) -> usize {
        let split = TlbAddress::split(addr);
        self.update(0, split.mid);
        let hi = split.hi + (self.cfg[1] & !TLB_CFG1_ADDR_MASK);
        self.update(1, hi);
        split.offset
    }

    /// Cached `cfg[0]` and `cfg[1]`.
    pub const fn config(&self) -> [u32; 2] {
        self.cfg
    }

    /// The underlying registers.
    pub const fn regs(&self) -> &R {
        &self.regs
    }
}
