//! Ring metadata shared with the E1 payload.
//!
//! The payload keeps its copy of this block in tile L1 and pushes all 64
//! bytes to host memory whenever a field changes. Each field has exactly one
//! writer, which is always the device once capture has started.

use bytemuck::{Pod, Zeroable};
use ethdump_driver::HostBuffer;
use std::mem::offset_of;

/// Initial `mailbox_echo`. Must be odd.
pub const INITIAL_ECHO: u32 = 1;

/// Metadata block layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RingMetadata {
    /// Bytes written to the host ring so far, modulo 2^32
    pub write_ptr: u32,
    /// Last mailbox value the device acknowledged
    pub mailbox_echo: u32,
    /// Non-zero once the device ring has overflowed
    pub error: u32,
    /// Pads the block to 64 bytes
    pub padding: [u32; 13],
}

impl RingMetadata {
    /// Size of the block in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// State before the payload starts.
    pub const fn initial() -> Self {
        Self {
            write_ptr: 0,
            mailbox_echo: INITIAL_ECHO,
            error: 0,
            padding: [0; 13],
        }
    }
}

/// Volatile view of the metadata block at the start of a host buffer.
#[derive(Debug, Clone, Copy)]
pub struct MetadataView<'a> {
    buf: &'a HostBuffer,
}

impl<'a> MetadataView<'a> {
    /// View `buf`, which must hold at least [`RingMetadata::SIZE`] bytes.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is too small.
    pub fn new(buf: &'a HostBuffer) -> Self {
        assert!(buf.size() >= RingMetadata::SIZE, "metadata buffer too small");
        Self { buf }
    }

    /// Device's ring write pointer.
    pub fn write_ptr(&self) -> u32 {
        self.buf.read_u32(offset_of!(RingMetadata, write_ptr))
    }

    /// Device's mailbox echo.
    pub fn mailbox_echo(&self) -> u32 {
        self.buf.read_u32(offset_of!(RingMetadata, mailbox_echo))
    }

    /// Device's overflow flag.
    pub fn error(&self) -> u32 {
        self.buf.read_u32(offset_of!(RingMetadata, error))
    }

    /// Reset the host copy to [`RingMetadata::initial`]. Only valid while E1
    /// is held in reset.
    pub fn reset(&self) {
        self.buf.write_bytes(0, bytemuck::bytes_of(&RingMetadata::initial()));
    }

    /// Snapshot of the whole block.
    pub fn load(&self) -> RingMetadata {
        let mut words = [0u32; RingMetadata::SIZE / 4];
        for (i, w) in words.iter_mut().enumerate() {
            *w = self.buf.read_u32(i * 4);
        }
        bytemuck::cast(words)
    }
}
