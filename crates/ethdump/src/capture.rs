//! Host side of the ring protocol.
//!
//! The device publishes how far it has written into the host ring
//! (`write_ptr`), and the host tells it how far it has read by writing NIU 1
//! `ROUTER_CFG_4`. Liveness is checked through the mailbox: after 10 ms of
//! silence the host writes an odd request to `ROUTER_CFG_2`, and the payload
//! copies it into `mailbox_echo`. A request still unanswered at the next
//! timeout means E1 has stopped.
//!
//! When the device ring overflows, the payload sets `error` and stops. The
//! loop notices at the next timeout and reconfigures from scratch.

use crate::cancel::CancelToken;
use crate::clock::{Clock, NANOS_PER_MILLI};
use crate::config::CaptureConfig;
use crate::configure::{configure_ethernet, CaptureContext, HostRings, HOST_READ_PTR_ADDR, MAILBOX_REQUEST_ADDR};
use crate::error::{CaptureError, Result};
use crate::metadata::{MetadataView, INITIAL_ECHO};
use crate::pcap::PcapWriter;
use ethdump_chip::regs::{soft_reset, SOFT_RESET_ADDR};
use ethdump_driver::TileAccess;
use std::io::Write;

/// Silence after which the loop checks on the device.
pub const LIVENESS_TIMEOUT_NANOS: u64 = 10 * NANOS_PER_MILLI;

/// Wrapping counter for the synthetic packet.
const TRAFFIC_COUNTER_MAX: u32 = 9999;

/// What one iteration of the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Frames were written out and the read pointer published
    Drained,
    /// The device answered a mailbox request
    Echoed,
    /// Nothing happened and the timeout has not expired
    Idle,
    /// A mailbox request was sent
    EchoRequested,
    /// The device reported loss and was reconfigured
    Recovered,
}

/// Totals at the end of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Frames written
    pub packets: u64,
    /// Bytes written, including the pcap header
    pub bytes: u64,
    /// Reconfigurations after loss
    pub recoveries: u32,
}

/// Drains the host ring into a pcap writer and keeps E1 alive.
pub struct CaptureLoop<D: TileAccess, W: Write, C: Clock> {
    dev: D,
    rings: HostRings,
    writer: PcapWriter<W>,
    clock: C,
    ctx: CaptureContext,
    read_ptr: u32,
    write_ptr: u32,
    last_echo: u32,
    last_activity: u64,
    generate_traffic: bool,
    traffic_counter: u32,
    recoveries: u32,
    consecutive_recoveries: u32,
    max_recoveries: Option<u32>,
}

impl<D: TileAccess, W: Write, C: Clock> CaptureLoop<D, W, C> {
    /// Configure the tile selected on `dev` and start capturing into `writer`.
    ///
    /// Uses the device ring size, traffic generation and recovery limit from
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails.
    pub fn start(mut dev: D, rings: HostRings, writer: PcapWriter<W>, clock: C, config: &CaptureConfig) -> Result<Self> {
        let ctx = configure_ethernet(&mut dev, &rings, config.device_ring_size)?;
        let last_activity = clock.now_nanos();
        Ok(Self {
            dev,
            rings,
            writer,
            clock,
            ctx,
            read_ptr: 0,
            write_ptr: 0,
            last_echo: INITIAL_ECHO,
            last_activity,
            generate_traffic: config.generate_traffic,
            traffic_counter: 0,
            recoveries: 0,
            consecutive_recoveries: 0,
            max_recoveries: config.max_recoveries,
        })
    }

    /// Run one iteration of the loop.
    ///
    /// # Errors
    ///
    /// Returns an error on ring corruption, an output failure, a liveness
    /// timeout, or when recoveries exceed the configured limit.
    pub fn step(&mut self) -> Result<Step> {
        let meta = MetadataView::new(&self.rings.meta);
        let now = self.clock.now_nanos();

        let write_ptr = meta.write_ptr();
        if write_ptr != self.write_ptr {
            self.write_ptr = write_ptr;
            self.last_activity = now;
        }

        self.read_ptr = self
            .writer
            .append(&self.rings.ring, self.read_ptr, self.write_ptr, &self.clock)?;
        if self.writer.pending() > 0 {
            self.writer.flush(&self.rings.ring)?;
            self.dev.write_u32(HOST_READ_PTR_ADDR, self.read_ptr);
            self.consecutive_recoveries = 0;
            return Ok(Step::Drained);
        }

        let echo = meta.mailbox_echo();
        if self.last_echo.wrapping_sub(echo) & 0x8000_0000 != 0 {
            self.last_echo = echo;
            self.last_activity = now;
            return Ok(Step::Echoed);
        }

        if now.saturating_sub(self.last_activity) < LIVENESS_TIMEOUT_NANOS {
            return Ok(Step::Idle);
        }

        if meta.error() != 0 {
            return self.recover();
        }

        if self.generate_traffic {
            self.traffic_counter = if self.traffic_counter == TRAFFIC_COUNTER_MAX {
                0
            } else {
                self.traffic_counter + 1
            };
            self.ctx.send_traffic(&mut self.dev, self.traffic_counter);
        }

        if self.last_echo & 1 == 0 {
            return Err(CaptureError::LivenessTimeout);
        }
        self.last_echo = self.last_echo.wrapping_add(1);
        self.last_activity = now;
        self.dev.write_u32(MAILBOX_REQUEST_ADDR, self.last_echo.wrapping_add(1));
        Ok(Step::EchoRequested)
    }

    fn recover(&mut self) -> Result<Step> {
        let attempt = self.consecutive_recoveries + 1;
        if self.max_recoveries.is_some_and(|max| attempt > max) {
            return Err(CaptureError::TooManyRecoveries(attempt));
        }
        tracing::warn!(
            "Device ring overflowed after {} packets; packets were lost. Reconfiguring {}",
            self.writer.packets(),
            self.dev.tile()
        );

        self.ctx = configure_ethernet(&mut self.dev, &self.rings, self.ctx.e_ring_size)?;
        self.read_ptr = 0;
        self.write_ptr = 0;
        self.last_echo = INITIAL_ECHO;
        self.last_activity = self.clock.now_nanos();
        self.traffic_counter = 0;
        self.recoveries += 1;
        self.consecutive_recoveries = attempt;
        Ok(Step::Recovered)
    }

    /// Step until `cancel` fires.
    ///
    /// The tile is left running; callers put E1 back in reset.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error from [`step`](Self::step).
    pub fn run(&mut self, cancel: &CancelToken) -> Result<CaptureSummary> {
        while !cancel.is_cancelled() {
            self.step()?;
        }
        let summary = self.summary();
        tracing::info!(
            "Capture stopped: {} packets, {} bytes, {} recoveries",
            summary.packets,
            summary.bytes,
            summary.recoveries
        );
        Ok(summary)
    }

    /// [`run`](Self::run), then hold E1 in reset whether or not the run
    /// ended in an error.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the run.
    pub fn run_to_completion(&mut self, cancel: &CancelToken) -> Result<CaptureSummary> {
        let outcome = self.run(cancel);
        self.dev.write_u32(SOFT_RESET_ADDR, soft_reset::E1);
        if let Err(e) = &outcome {
            tracing::warn!("Capture on {} failed: {e}; E1 held in reset", self.dev.tile());
        }
        outcome
    }

    /// Totals so far.
    pub fn summary(&self) -> CaptureSummary {
        CaptureSummary {
            packets: self.writer.packets(),
            bytes: self.writer.bytes(),
            recoveries: self.recoveries,
        }
    }

    /// Host read pointer.
    pub const fn read_ptr(&self) -> u32 {
        self.read_ptr
    }

    /// Last observed device write pointer.
    pub const fn write_ptr(&self) -> u32 {
        self.write_ptr
    }

    /// Current device configuration.
    pub const fn context(&self) -> &CaptureContext {
        &self.ctx
    }

    /// Host ring and metadata buffers.
    pub const fn rings(&self) -> &HostRings {
        &self.rings
    }

    /// Output writer.
    pub const fn writer(&self) -> &PcapWriter<W> {
        &self.writer
    }

    /// Device handle.
    pub const fn device(&self) -> &D {
        &self.dev
    }

    /// Device handle, for out-of-band poking.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.dev
    }

    /// Give back the device, for the final reset.
    pub fn into_device(self) -> D {
        self.dev
    }
}
