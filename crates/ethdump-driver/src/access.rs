//! Word access to tile memory.

use crate::error::Result;
use ethdump_chip::tile::TileCoord;

/// Load/store of 32-bit words at `(tile, address)`.
///
/// Every operation is an explicit, ordered device access: nothing is cached
/// apart from the window configuration, and a write is issued before any
/// later read returns.
pub trait TileAccess {
    /// Select the tile subsequent accesses go to.
    fn set_tile(&mut self, tile: TileCoord);

    /// Currently selected tile.
    fn tile(&self) -> TileCoord;

    /// Read the word at `addr` on the current tile.
    fn read_u32(&mut self, addr: u64) -> u32;

    /// Write the word at `addr` on the current tile.
    fn write_u32(&mut self, addr: u64, value: u32);

    /// Ask the kernel driver to write `value` to `addr` on the current tile
    /// if this process dies without cleaning up.
    ///
    /// # Errors
    ///
    /// Fails if the driver does not support kill-time cleanup.
    fn arm_reset_on_exit(&mut self, addr: u64, value: u32) -> Result<()>;

    /// Copy `bytes` to consecutive words starting at `addr`.
    ///
    /// A trailing partial word is zero padded.
    fn write_bytes(&mut self, addr: u64, bytes: &[u8]) {
        let mut addr = addr;
        for chunk in bytes.chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.write_u32(addr, u32::from_le_bytes(word));
            addr += 4;
        }
    }

    /// Read `out.len()` consecutive words starting at `addr`.
    fn read_words(&mut self, addr: u64, out: &mut [u32]) {
        for (i, word) in out.iter_mut().enumerate() {
            *word = self.read_u32(addr + i as u64 * 4);
        }
    }
}
