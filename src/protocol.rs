// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Wire codec for the timing-server protocol.
//!
//! Provides `ReadBytes` and `WriteBytes` implementations which extend the
//! byteorder crate for the four datagram shapes exchanged with the timing
//! server. All multi-byte integers are little-endian and every layout is
//! fixed-size with no length prefix: the datagram length alone disambiguates
//! the message type (see [`classify`]).
//!
//! The codec is stateless; every function here is a pure transform.

use byteorder::{LE, ReadBytesExt, WriteBytesExt};
use std::io;

/// A trait for writing any of the probe protocol types to little-endian bytes.
///
/// A blanket implementation is provided for all types that implement
/// `byteorder::WriteBytesExt`.
pub trait WriteBytes {
    /// Writes a probe protocol type to this writer in little-endian byte order.
    fn write_bytes<P: WriteToBytes>(&mut self, message: P) -> io::Result<()>;
}

/// A trait for reading any of the probe protocol types from little-endian bytes.
///
/// A blanket implementation is provided for all types that implement
/// `byteorder::ReadBytesExt`.
pub trait ReadBytes {
    /// Reads a probe protocol type from this reader in little-endian byte order.
    fn read_bytes<P: ReadFromBytes>(&mut self) -> io::Result<P>;
}

/// Probe protocol types that may be written to little-endian bytes.
pub trait WriteToBytes {
    /// Write the message to bytes.
    fn write_to_bytes<W: WriteBytesExt>(&self, writer: W) -> io::Result<()>;
}

/// Probe protocol types that may be read from little-endian bytes.
pub trait ReadFromBytes: Sized {
    /// Read the message from bytes.
    fn read_from_bytes<R: ReadBytesExt>(reader: R) -> io::Result<Self>;
}

/// Types that have a constant size when written to or read from bytes.
pub trait ConstPackedSizeBytes {
    /// The constant size in bytes when this type is packed for transmission.
    const PACKED_SIZE_BYTES: usize;
}

impl<W> WriteBytes for W
where
    W: WriteBytesExt,
{
    fn write_bytes<P: WriteToBytes>(&mut self, message: P) -> io::Result<()> {
        message.write_to_bytes(self)
    }
}

impl<R> ReadBytes for R
where
    R: ReadBytesExt,
{
    fn read_bytes<P: ReadFromBytes>(&mut self) -> io::Result<P> {
        P::read_from_bytes(self)
    }
}

impl<P> WriteToBytes for &P
where
    P: WriteToBytes,
{
    fn write_to_bytes<W: WriteBytesExt>(&self, writer: W) -> io::Result<()> {
        (*self).write_to_bytes(writer)
    }
}

/// The measurement request sent once at the start of the streaming phase.
///
/// This is the extended 24-byte form carrying the requested tick interval.
/// A legacy 20-byte short form without `tick_interval_ms` exists in older
/// servers; this client always emits the extended form.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ProbeRequest {
    /// Number of data packets the server should stream back.
    pub count: u32,
    /// Local send time in nanoseconds (probe clock).
    pub send_time_ns: i64,
    /// Opaque client identifier, echoed in server logs only.
    pub client_id: u32,
    /// Requested payload bytes appended to every data packet header.
    pub payload_size: u32,
    /// Requested spacing between consecutive data packets, in milliseconds.
    pub tick_interval_ms: u32,
}

/// A synchronization probe: a bare local timestamp.
///
/// Sent during the initial sync burst and for every periodic resync. The
/// server answers each one with a [`SyncReply`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SyncProbe {
    /// Local send time in nanoseconds (probe clock).
    pub send_time_ns: i64,
}

/// The server's reply to a [`SyncProbe`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SyncReply {
    /// Server clock at receive/send time, in nanoseconds.
    pub server_time_ns: i64,
    /// Identifier of the replying server instance.
    pub server_id: u32,
    /// The tick interval the server is configured with, or reserved.
    pub tick_ms: u32,
}

/// The fixed header of one measurement data packet.
///
/// Any payload bytes following the header are opaque padding and are ignored
/// by the client.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DataHeader {
    /// Sequence number, assigned monotonically by the server starting at 0.
    pub sequence: u32,
    /// Server send time in nanoseconds (server clock).
    pub timestamp_ns: i64,
    /// Identifier of the sending server instance. Diagnostic only.
    pub server_id: u32,
    /// Actual tick interval in use, in milliseconds. Diagnostic only.
    pub tick_ms: u32,
}

impl ConstPackedSizeBytes for ProbeRequest {
    const PACKED_SIZE_BYTES: usize = 24;
}

impl ConstPackedSizeBytes for SyncProbe {
    const PACKED_SIZE_BYTES: usize = 8;
}

impl ConstPackedSizeBytes for SyncReply {
    const PACKED_SIZE_BYTES: usize = 16;
}

impl ConstPackedSizeBytes for DataHeader {
    const PACKED_SIZE_BYTES: usize = 20;
}

impl WriteToBytes for ProbeRequest {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LE>(self.count)?;
        writer.write_i64::<LE>(self.send_time_ns)?;
        writer.write_u32::<LE>(self.client_id)?;
        writer.write_u32::<LE>(self.payload_size)?;
        writer.write_u32::<LE>(self.tick_interval_ms)?;
        Ok(())
    }
}

impl ReadFromBytes for ProbeRequest {
    fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
        Ok(ProbeRequest {
            count: reader.read_u32::<LE>()?,
            send_time_ns: reader.read_i64::<LE>()?,
            client_id: reader.read_u32::<LE>()?,
            payload_size: reader.read_u32::<LE>()?,
            tick_interval_ms: reader.read_u32::<LE>()?,
        })
    }
}

impl WriteToBytes for SyncProbe {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_i64::<LE>(self.send_time_ns)?;
        Ok(())
    }
}

impl ReadFromBytes for SyncProbe {
    fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
        Ok(SyncProbe {
            send_time_ns: reader.read_i64::<LE>()?,
        })
    }
}

impl WriteToBytes for SyncReply {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_i64::<LE>(self.server_time_ns)?;
        writer.write_u32::<LE>(self.server_id)?;
        writer.write_u32::<LE>(self.tick_ms)?;
        Ok(())
    }
}

impl ReadFromBytes for SyncReply {
    fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
        Ok(SyncReply {
            server_time_ns: reader.read_i64::<LE>()?,
            server_id: reader.read_u32::<LE>()?,
            tick_ms: reader.read_u32::<LE>()?,
        })
    }
}

impl WriteToBytes for DataHeader {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LE>(self.sequence)?;
        writer.write_i64::<LE>(self.timestamp_ns)?;
        writer.write_u32::<LE>(self.server_id)?;
        writer.write_u32::<LE>(self.tick_ms)?;
        Ok(())
    }
}

impl ReadFromBytes for DataHeader {
    fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
        Ok(DataHeader {
            sequence: reader.read_u32::<LE>()?,
            timestamp_ns: reader.read_i64::<LE>()?,
            server_id: reader.read_u32::<LE>()?,
            tick_ms: reader.read_u32::<LE>()?,
        })
    }
}

/// One incoming datagram from the server, classified by length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Datagram {
    /// A 16-byte synchronization reply.
    Sync(SyncReply),
    /// A data packet header (datagram length ≥ 20; payload ignored).
    Data(DataHeader),
}

/// Classify an incoming datagram by its length and decode it.
///
/// A datagram of exactly 16 bytes is always a sync reply; 20 bytes or more is
/// a data packet header followed by opaque payload. Any other length returns
/// `None`: UDP offers no sender authentication, so unrelated traffic on the
/// same port is expected debris, not a protocol fault.
pub fn classify(buf: &[u8]) -> Option<Datagram> {
    match buf.len() {
        SyncReply::PACKED_SIZE_BYTES => {
            let mut reader = buf;
            reader.read_bytes().ok().map(Datagram::Sync)
        }
        n if n >= DataHeader::PACKED_SIZE_BYTES => {
            let mut reader = &buf[..DataHeader::PACKED_SIZE_BYTES];
            reader.read_bytes().ok().map(Datagram::Data)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        let req = ProbeRequest {
            count: 100,
            send_time_ns: 0x0102_0304_0506_0708,
            client_id: 7,
            payload_size: 64,
            tick_interval_ms: 20,
        };
        let mut buf = [0u8; ProbeRequest::PACKED_SIZE_BYTES];
        (&mut buf[..]).write_bytes(req).unwrap();

        // count, little-endian.
        assert_eq!(&buf[0..4], &[100, 0, 0, 0]);
        // send_time_ns, little-endian: low byte first.
        assert_eq!(&buf[4..12], &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&buf[12..16], &[7, 0, 0, 0]);
        assert_eq!(&buf[16..20], &[64, 0, 0, 0]);
        assert_eq!(&buf[20..24], &[20, 0, 0, 0]);

        let back: ProbeRequest = (&buf[..]).read_bytes().unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn test_sync_probe_is_8_bytes() {
        let probe = SyncProbe { send_time_ns: -1 };
        let mut buf = [0u8; SyncProbe::PACKED_SIZE_BYTES];
        (&mut buf[..]).write_bytes(probe).unwrap();
        assert_eq!(buf, [0xFF; 8]);
    }

    #[test]
    fn test_classify_sync_reply() {
        let reply = SyncReply {
            server_time_ns: 123_456_789,
            server_id: 1,
            tick_ms: 20,
        };
        let mut buf = [0u8; SyncReply::PACKED_SIZE_BYTES];
        (&mut buf[..]).write_bytes(reply).unwrap();
        assert_eq!(classify(&buf), Some(Datagram::Sync(reply)));
    }

    #[test]
    fn test_classify_data_header_exact() {
        let hdr = DataHeader {
            sequence: 42,
            timestamp_ns: 9_999_999,
            server_id: 1,
            tick_ms: 20,
        };
        let mut buf = [0u8; DataHeader::PACKED_SIZE_BYTES];
        (&mut buf[..]).write_bytes(hdr).unwrap();
        assert_eq!(classify(&buf), Some(Datagram::Data(hdr)));
    }

    #[test]
    fn test_classify_data_with_payload() {
        let hdr = DataHeader {
            sequence: 3,
            timestamp_ns: 1,
            server_id: 1,
            tick_ms: 0,
        };
        let mut buf = vec![0u8; DataHeader::PACKED_SIZE_BYTES + 480];
        (&mut buf[..]).write_bytes(hdr).unwrap();
        // Payload bytes are opaque and must not affect decoding.
        buf[DataHeader::PACKED_SIZE_BYTES..].fill(0xAB);
        assert_eq!(classify(&buf), Some(Datagram::Data(hdr)));
    }

    #[test]
    fn test_classify_rejects_other_lengths() {
        // Debris lengths: empty, short, between sync and data sizes.
        for len in [0usize, 1, 8, 15, 17, 19] {
            let buf = vec![0u8; len];
            assert_eq!(classify(&buf), None, "len {len} should be debris");
        }
    }

    #[test]
    fn test_classify_never_errors_on_garbage() {
        let garbage: Vec<u8> = (0..=255u8).collect();
        for len in 0..garbage.len() {
            // Must not panic for any prefix length; result is Some or None.
            let _ = classify(&garbage[..len]);
        }
    }

    #[test]
    fn test_sync_reply_roundtrip_negative_time() {
        let reply = SyncReply {
            server_time_ns: i64::MIN,
            server_id: u32::MAX,
            tick_ms: 0,
        };
        let mut buf = [0u8; SyncReply::PACKED_SIZE_BYTES];
        (&mut buf[..]).write_bytes(reply).unwrap();
        let back: SyncReply = (&buf[..]).read_bytes().unwrap();
        assert_eq!(back, reply);
    }
}
