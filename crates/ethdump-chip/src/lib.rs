//! Silicon model for the Tenstorrent Blackhole Ethernet tile.
//!
//! This crate has **no hardware access**: it is a pure model of the
//! pieces of the chip that `ethdump` touches: PCIe identity and the 2 MiB TLB
//! configuration layout, the Ethernet tile register map, tile coordinates,
//! and the RISC-V capture payload that runs on the tile's E1 core.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`pcie`] | Vendor/device IDs, BAR0 TLB configuration block, TLB address split |
//! | [`regs`] | Ethernet tile register map (NIU, TX/RX queues, classifier, reset) |
//! | [`tile`] | Ethernet tile coordinates and endpoint identification |
//! | [`boot`] | Boot parameter / boot result words written by the E0 firmware |
//! | [`payload`] | RV32 capture payload template, shift fixups, arguments block |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod boot;
pub mod payload;
pub mod pcie;
pub mod regs;
pub mod tile;
