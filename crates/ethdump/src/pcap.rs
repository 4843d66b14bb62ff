//! Nanosecond pcap output.
//!
//! Frames are never copied: each record is queued as a 16-byte record header
//! plus one or two slices of the host ring, and a batch is handed to the
//! kernel with a single vectored write.

use crate::clock::{pcap_timestamp, Clock};
use crate::error::{CaptureError, Result};
use crate::frame::{load_header, FrameHeader, HEADER_LEN};
use ethdump_driver::HostBuffer;
use std::fs::File;
use std::io::{ErrorKind, IoSlice, Write};
use std::path::Path;

/// Magic number of pcap files with nanosecond timestamps.
pub const PCAP_MAGIC_NANOS: u32 = 0xA1B2_3C4D;

/// pcap format version.
pub const PCAP_VERSION: (u16, u16) = (2, 2);

/// Snapshot length written to the global header.
pub const PCAP_SNAPLEN: u32 = (1 << 14) - 1;

/// Link type for Ethernet.
pub const LINKTYPE_ETHERNET: u32 = 1;

/// Segments queued before a flush is required.
pub const MAX_SEGMENTS: usize = 20;

/// Most segments one frame can need: header, body, wrapped body.
const SEGMENTS_PER_FRAME: usize = 3;

/// Bytes in the global header.
pub const GLOBAL_HEADER_LEN: usize = 24;

/// Bytes in a record header.
pub const RECORD_HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy)]
enum Segment {
    /// Record header in `PcapWriter::records`
    Record(usize),
    /// Bytes of the host ring
    Ring { offset: usize, len: usize },
}

/// Writes captured frames to a pcap stream.
#[derive(Debug)]
pub struct PcapWriter<W> {
    sink: W,
    records: [[u32; 4]; MAX_SEGMENTS],
    segments: Vec<Segment>,
    /// Records queued but not yet flushed
    queued_packets: u64,
    packets: u64,
    bytes: u64,
}

impl PcapWriter<File> {
    /// Create or truncate `path` and write the global header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| CaptureError::OutputOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(file)
    }
}

impl<W: Write> PcapWriter<W> {
    /// Start a pcap stream on `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the global header cannot be written.
    pub fn new(mut sink: W) -> Result<Self> {
        let header: [u32; 6] = [
            PCAP_MAGIC_NANOS,
            u32::from(PCAP_VERSION.0) | (u32::from(PCAP_VERSION.1) << 16),
            0,
            0,
            PCAP_SNAPLEN,
            LINKTYPE_ETHERNET,
        ];
        sink.write_all(bytemuck::bytes_of(&header))
            .map_err(CaptureError::Output)?;
        Ok(Self {
            sink,
            records: [[0; 4]; MAX_SEGMENTS],
            segments: Vec::with_capacity(MAX_SEGMENTS),
            queued_packets: 0,
            packets: 0,
            bytes: GLOBAL_HEADER_LEN as u64,
        })
    }

    /// Queue every complete frame between `read_ptr` and `write_ptr`, as far
    /// as the segment queue allows, and return the new read pointer.
    ///
    /// A frame whose body has not fully arrived is left for later.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::RingCorrupt`] on an invalid header.
    pub fn append<C: Clock + ?Sized>(
        &mut self,
        ring: &HostBuffer,
        mut read_ptr: u32,
        write_ptr: u32,
        clock: &C,
    ) -> Result<u32> {
        let size = ring.size();
        let mask = (size - 1) as u32;
        while self.segments.len() + SEGMENTS_PER_FRAME <= MAX_SEGMENTS
            && write_ptr.wrapping_sub(read_ptr) >= HEADER_LEN
        {
            let word = load_header(ring, read_ptr);
            let header = FrameHeader::parse(word).ok_or(CaptureError::RingCorrupt {
                read_ptr,
                write_ptr,
                header: word,
            })?;
            if write_ptr.wrapping_sub(read_ptr) < header.entry_len() {
                break;
            }

            read_ptr = read_ptr.wrapping_add(HEADER_LEN);
            let offset = (read_ptr & mask) as usize;
            let len = header.len() as usize;

            let slot = self.segments.len();
            let (sec, nsec) = pcap_timestamp(clock.now_nanos());
            self.records[slot] = [sec, nsec, header.len(), header.len()];
            self.segments.push(Segment::Record(slot));

            let before_wrap = size - offset;
            if len <= before_wrap {
                self.push_ring(offset, len);
            } else {
                self.push_ring(offset, before_wrap);
                self.push_ring(0, len - before_wrap);
            }
            self.queued_packets += 1;
            read_ptr = read_ptr.wrapping_add(header.len());
        }
        Ok(read_ptr)
    }

    fn push_ring(&mut self, offset: usize, len: usize) {
        if len > 0 {
            self.segments.push(Segment::Ring { offset, len });
        }
    }

    /// Number of queued segments.
    pub fn pending(&self) -> usize {
        self.segments.len()
    }

    /// Write all queued segments.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Output`] on any write error other than
    /// `Interrupted`, or if the sink stops accepting data.
    pub fn flush(&mut self, ring: &HostBuffer) -> Result<()> {
        if self.segments.is_empty() {
            return Ok(());
        }
        let mut slices: Vec<IoSlice<'_>> = self
            .segments
            .iter()
            .map(|segment| match *segment {
                Segment::Record(slot) => IoSlice::new(bytemuck::bytes_of(&self.records[slot])),
                Segment::Ring { offset, len } => IoSlice::new(ring.bytes(offset, len)),
            })
            .collect();

        let mut remaining = slices.as_mut_slice();
        while !remaining.is_empty() {
            match self.sink.write_vectored(remaining) {
                Ok(0) => return Err(CaptureError::Output(ErrorKind::WriteZero.into())),
                Ok(n) => {
                    self.bytes += n as u64;
                    IoSlice::advance_slices(&mut remaining, n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(CaptureError::Output(e)),
            }
        }

        self.segments.clear();
        self.packets += self.queued_packets;
        self.queued_packets = 0;
        Ok(())
    }

    /// Packets written so far.
    pub const fn packets(&self) -> u64 {
        self.packets
    }

    /// Bytes written so far, including the global header.
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// The sink.
    pub const fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Give back the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, NANOS_PER_SEC};

    /// Accepts at most `chunk` bytes per call and fails every other call
    /// with `Interrupted`.
    #[derive(Debug)]
    struct Dribble {
        out: Vec<u8>,
        chunk: usize,
        interrupt: bool,
    }

    impl Write for Dribble {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(ErrorKind::Interrupted.into());
            }
            let n = buf.len().min(self.chunk);
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Full;

    impl Write for Full {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn put_frame(ring: &HostBuffer, at: usize, body: &[u8]) -> usize {
        let size = ring.size();
        let mut entry = (body.len() as u32).to_be_bytes().to_vec();
        entry.extend_from_slice(body);
        for (i, b) in entry.iter().enumerate() {
            ring.write_bytes((at + i) % size, &[*b]);
        }
        at + entry.len()
    }

    fn records(file: &[u8]) -> Vec<(u32, u32, Vec<u8>)> {
        let mut out = Vec::new();
        let mut pos = GLOBAL_HEADER_LEN;
        while pos < file.len() {
            let word = |i: usize| u32::from_ne_bytes(file[pos + i * 4..pos + i * 4 + 4].try_into().unwrap());
            let (sec, nsec, len) = (word(0), word(1), word(2) as usize);
            assert_eq!(word(3) as usize, len);
            pos += RECORD_HEADER_LEN;
            out.push((sec, nsec, file[pos..pos + len].to_vec()));
            pos += len;
        }
        out
    }

    #[test]
    fn global_header() {
        let writer = PcapWriter::new(Vec::new()).unwrap();
        let bytes = writer.get_ref();
        assert_eq!(bytes.len(), 24);
        assert_eq!(bytes[..4], PCAP_MAGIC_NANOS.to_ne_bytes());
        assert_eq!(bytes[4..8], 0x0002_0002u32.to_ne_bytes());
        assert_eq!(bytes[16..20], 16383u32.to_ne_bytes());
        assert_eq!(bytes[20..24], 1u32.to_ne_bytes());
        assert_eq!(writer.bytes(), 24);
    }

    #[test]
    fn single_frame() {
        let ring = HostBuffer::owned(4096, 0);
        let body: Vec<u8> = (0..14).collect();
        let end = put_frame(&ring, 0, &body);
        let clock = ManualClock::new(7 * NANOS_PER_SEC + 500);

        let mut writer = PcapWriter::new(Vec::new()).unwrap();
        let read_ptr = writer.append(&ring, 0, end as u32, &clock).unwrap();
        assert_eq!(read_ptr, 18);
        assert_eq!(writer.packets(), 0);
        writer.flush(&ring).unwrap();

        assert_eq!(writer.packets(), 1);
        assert_eq!(writer.bytes(), 24 + 16 + 14);
        assert_eq!(records(writer.get_ref()), vec![(7, 500, body)]);
    }

    #[test]
    fn incomplete_frame_waits() {
        let ring = HostBuffer::owned(4096, 0);
        put_frame(&ring, 0, &[0xAB; 60]);
        let mut writer = PcapWriter::new(Vec::new()).unwrap();
        let clock = ManualClock::new(0);

        assert_eq!(writer.append(&ring, 0, 3, &clock).unwrap(), 0);
        assert_eq!(writer.append(&ring, 0, 63, &clock).unwrap(), 0);
        assert_eq!(writer.pending(), 0);
        assert_eq!(writer.append(&ring, 0, 64, &clock).unwrap(), 64);
    }

    #[test]
    fn body_straddling_wrap_uses_two_slices() {
        let ring = HostBuffer::owned(64, 0);
        let first: Vec<u8> = (100..120).collect();
        let second: Vec<u8> = (0..20).collect();
        let start = 30;
        let mid = put_frame(&ring, start, &first);
        let end = put_frame(&ring, mid, &second);
        assert!(mid < 64 && end > 64);

        let mut writer = PcapWriter::new(Vec::new()).unwrap();
        let read_ptr = writer.append(&ring, start as u32, end as u32, &ManualClock::new(0)).unwrap();
        assert_eq!(read_ptr, end as u32);
        assert_eq!(writer.pending(), 5);
        writer.flush(&ring).unwrap();

        let got: Vec<_> = records(writer.get_ref()).into_iter().map(|r| r.2).collect();
        assert_eq!(got, vec![first, second]);
    }

    #[test]
    fn header_straddling_wrap() {
        let ring = HostBuffer::owned(64, 0);
        let body: Vec<u8> = (0..16).collect();
        // Header starts two bytes before the end of the ring.
        let start = 62usize;
        let end = put_frame(&ring, start, &body);

        let mut writer = PcapWriter::new(Vec::new()).unwrap();
        let read_ptr = writer.append(&ring, start as u32, end as u32, &ManualClock::new(0)).unwrap();
        assert_eq!(read_ptr, end as u32);
        writer.flush(&ring).unwrap();
        assert_eq!(records(writer.get_ref())[0].2, body);
    }

    #[test]
    fn pointers_wrap_modulo_2_pow_32() {
        let ring = HostBuffer::owned(4096, 0);
        let start = u32::MAX - 7;
        let at = start as usize % 4096;
        put_frame(&ring, at, &[1; 20]);
        let write_ptr = start.wrapping_add(24);

        let mut writer = PcapWriter::new(Vec::new()).unwrap();
        assert_eq!(writer.append(&ring, start, write_ptr, &ManualClock::new(0)).unwrap(), write_ptr);
    }

    #[test]
    fn batch_is_bounded() {
        let ring = HostBuffer::owned(4096, 0);
        let mut at = 0;
        for _ in 0..12 {
            at = put_frame(&ring, at, &[0x55; 14]);
        }
        let mut writer = PcapWriter::new(Vec::new()).unwrap();
        let clock = ManualClock::new(0);
        let read_ptr = writer.append(&ring, 0, at as u32, &clock).unwrap();
        // Two segments per frame; stops once fewer than three slots remain.
        assert_eq!(writer.pending(), 18);
        assert_eq!(read_ptr, 9 * 18);
        writer.flush(&ring).unwrap();
        assert_eq!(writer.append(&ring, read_ptr, at as u32, &clock).unwrap(), at as u32);
        writer.flush(&ring).unwrap();
        assert_eq!(writer.packets(), 12);
    }

    #[test]
    fn corrupt_header_is_fatal() {
        let ring = HostBuffer::owned(4096, 0);
        ring.write_u32(0, 0xFFFF_FFFF);
        let mut writer = PcapWriter::new(Vec::new()).unwrap();
        let err = writer.append(&ring, 0, 4, &ManualClock::new(0)).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::RingCorrupt { read_ptr: 0, write_ptr: 4, header: 0xFFFF_FFFF }
        ));
    }

    #[test]
    fn partial_and_interrupted_writes() {
        let ring = HostBuffer::owned(4096, 0);
        let a: Vec<u8> = (0..50).collect();
        let b: Vec<u8> = (50..90).collect();
        let end = put_frame(&ring, put_frame(&ring, 0, &a), &b);

        let sink = Dribble {
            out: Vec::new(),
            chunk: 7,
            interrupt: false,
        };
        let mut writer = PcapWriter::new(sink).unwrap();
        writer.append(&ring, 0, end as u32, &ManualClock::new(0)).unwrap();
        writer.flush(&ring).unwrap();

        let got: Vec<_> = records(&writer.get_ref().out).into_iter().map(|r| r.2).collect();
        assert_eq!(got, vec![a, b]);
        assert_eq!(writer.bytes(), writer.get_ref().out.len() as u64);
    }

    #[test]
    fn write_zero_is_fatal() {
        let ring = HostBuffer::owned(4096, 0);
        let end = put_frame(&ring, 0, &[0; 14]);
        let err = PcapWriter::new(Full).unwrap_err();
        assert!(matches!(err, CaptureError::Output(_)));

        let mut writer = PcapWriter {
            sink: Full,
            records: [[0; 4]; MAX_SEGMENTS],
            segments: Vec::new(),
            queued_packets: 0,
            packets: 0,
            bytes: 0,
        };
        writer.append(&ring, 0, end as u32, &ManualClock::new(0)).unwrap();
        assert!(matches!(writer.flush(&ring), Err(CaptureError::Output(_))));
        assert_eq!(writer.packets(), 0);
    }
}
