//! Hexabus Binary Codec
//!
//! Frame format (all integers big-endian):
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Byte 0-3:   Magic 0x48583042 ("HX0B")                    │
//! │ Byte 4:     Packet kind code                             │
//! │ Byte 5:     Flags (written as 0, ignored on read)        │
//! ├──────────────────────────────────────────────────────────┤
//! │ Payload                                                  │
//! │   EndpointQuery / Query:   eid                           │
//! │   Error:                   error code                    │
//! │   Info / Write:            eid, value kind, value bytes  │
//! │   EndpointInfo:            eid, declared kind, 128 text  │
//! ├──────────────────────────────────────────────────────────┤
//! │ Checksum over all preceding bytes (uint16)               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Anything that does not parse is logged at trace level and dropped, never
//! surfaced as an error.

use crate::checksum::crc16;
use crate::data::{check_text, Data, DataKind, DateTime, Value, TEXT_LEN};
use crate::packet::{ErrorCode, Packet, PacketKind, Payload};
use crate::registry::{Coded, TypeRegistry};
use crate::{Result, MAGIC, MAX_PACKET_SIZE};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::net::SocketAddr;
use tracing::trace;

/// Magic, kind and flags
pub const HEADER_LEN: usize = 6;

/// Trailing checksum
pub const CRC_LEN: usize = 2;

/// Lower-case hex rendering of a byte slice, for trace logs
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Frame encoder/decoder.
///
/// Holds the wire-code registries for packet and value kinds. Build one and
/// share it; it is immutable after construction.
#[derive(Debug, Clone)]
pub struct Codec {
    packets: TypeRegistry<PacketKind>,
    values: TypeRegistry<DataKind>,
}

impl Codec {
    /// Codec over the standard packet and value kinds
    pub fn new() -> Self {
        Self {
            packets: TypeRegistry::from_known(&PacketKind::ALL),
            values: TypeRegistry::from_known(&DataKind::ALL),
        }
    }

    /// Codec over explicitly supplied registries
    pub fn with_registries(
        packets: TypeRegistry<PacketKind>,
        values: TypeRegistry<DataKind>,
    ) -> Self {
        Self { packets, values }
    }

    // ========================================================================
    // ENCODING
    // ========================================================================

    /// Encode a packet into a complete frame
    pub fn encode(&self, packet: &Packet) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(estimate_frame_size(&packet.payload));

        buf.put_u32(MAGIC);
        buf.put_u8(packet.kind().code());
        buf.put_u8(0);

        match &packet.payload {
            Payload::EndpointQuery { eid } | Payload::Query { eid } => buf.put_u8(*eid),
            Payload::Error(code) => buf.put_u8(*code as u8),
            Payload::Info(data) | Payload::Write(data) => encode_data(&mut buf, data)?,
            Payload::EndpointInfo {
                eid,
                kind,
                description,
            } => {
                buf.put_u8(*eid);
                buf.put_u8(kind.code());
                encode_text(&mut buf, description)?;
            }
        }

        let crc = crc16(&buf);
        buf.put_u16(crc);

        trace!("Encoded {}: {}", packet, HexDump(&buf));
        Ok(buf.freeze())
    }

    // ========================================================================
    // DECODING
    // ========================================================================

    /// Decode a frame received from `remote`.
    ///
    /// Returns `None` for anything that is not a well-formed frame: short or
    /// oversized buffers, wrong magic, unregistered kind codes, unknown error
    /// codes and checksum mismatches.
    pub fn decode(&self, remote: SocketAddr, frame: &[u8]) -> Option<Packet> {
        trace!("Decoding packet from {}: {}", remote, HexDump(frame));

        if frame.len() < HEADER_LEN + 1 + CRC_LEN || frame.len() > MAX_PACKET_SIZE {
            trace!("Illegal frame length {}", frame.len());
            return None;
        }

        let mut buf = frame;

        let magic = buf.get_u32();
        if magic != MAGIC {
            trace!("Illegal header: 0x{:08x} != 0x{:08x}", magic, MAGIC);
            return None;
        }

        let code = buf.get_u8();
        let Some(kind) = self.packets.get(code) else {
            trace!("Unknown packet kind 0x{:02x}", code);
            return None;
        };

        let _flags = buf.get_u8();

        let payload = self.decode_payload(kind, &mut buf)?;

        if buf.remaining() != CRC_LEN {
            trace!(
                "Frame length mismatch: {} bytes left where the checksum should be",
                buf.remaining()
            );
            return None;
        }

        let received = buf.get_u16();
        let calculated = crc16(&frame[..frame.len() - CRC_LEN]);
        if received != calculated {
            trace!(
                "Crc error, calculated 0x{:04x}, received 0x{:04x}",
                calculated,
                received
            );
            return None;
        }

        let packet = Packet::new(remote, payload);
        trace!("Parsed result {}", packet);
        Some(packet)
    }

    fn decode_payload(&self, kind: PacketKind, buf: &mut &[u8]) -> Option<Payload> {
        match kind {
            PacketKind::EndpointQuery => {
                let eid = take_u8(buf)?;
                Some(Payload::EndpointQuery { eid })
            }
            PacketKind::Query => {
                let eid = take_u8(buf)?;
                Some(Payload::Query { eid })
            }
            PacketKind::Error => {
                let code = take_u8(buf)?;
                match ErrorCode::from_u8(code) {
                    Some(code) => Some(Payload::Error(code)),
                    None => {
                        trace!("Unknown error code {}", code);
                        None
                    }
                }
            }
            PacketKind::Info => self.decode_data(buf).map(Payload::Info),
            PacketKind::Write => self.decode_data(buf).map(Payload::Write),
            PacketKind::EndpointInfo => {
                let eid = take_u8(buf)?;
                let kind = self.value_kind(take_u8(buf)?)?;
                let description = decode_text(buf)?;
                Some(Payload::EndpointInfo {
                    eid,
                    kind,
                    description,
                })
            }
        }
    }

    fn decode_data(&self, buf: &mut &[u8]) -> Option<Data> {
        let eid = take_u8(buf)?;
        let kind = self.value_kind(take_u8(buf)?)?;

        if buf.remaining() < kind.width() {
            trace!(
                "Truncated {} value: need {} bytes, have {}",
                kind,
                kind.width(),
                buf.remaining()
            );
            return None;
        }

        let value = match kind {
            DataKind::Unknown => Value::Unknown,
            DataKind::Bool => Value::Bool(buf.get_u8() != 0),
            DataKind::UInt8 => Value::UInt8(buf.get_u8()),
            DataKind::UInt32 => Value::UInt32(buf.get_u32()),
            DataKind::DateTime => Value::DateTime(DateTime {
                hour: buf.get_u8(),
                minute: buf.get_u8(),
                second: buf.get_u8(),
                day: buf.get_u8(),
                month: buf.get_u8(),
                year: buf.get_u16(),
                weekday: buf.get_u8(),
            }),
            DataKind::Float => Value::Float(buf.get_f32()),
            DataKind::Text => Value::Text(decode_text(buf)?),
            DataKind::Timestamp => Value::Timestamp(buf.get_i64()),
        };

        Some(Data::new(eid, value))
    }

    fn value_kind(&self, code: u8) -> Option<DataKind> {
        let kind = self.values.get(code);
        if kind.is_none() {
            trace!("Unknown data type 0x{:02x}", code);
        }
        kind
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

fn estimate_frame_size(payload: &Payload) -> usize {
    let body = match payload {
        Payload::EndpointQuery { .. } | Payload::Query { .. } | Payload::Error(_) => 1,
        Payload::Info(data) | Payload::Write(data) => 2 + data.kind().width(),
        Payload::EndpointInfo { .. } => 2 + TEXT_LEN,
    };
    HEADER_LEN + body + CRC_LEN
}

fn encode_data(buf: &mut BytesMut, data: &Data) -> Result<()> {
    buf.put_u8(data.eid);
    buf.put_u8(data.kind().code());

    match &data.value {
        Value::Unknown => {}
        Value::Bool(v) => buf.put_u8(u8::from(*v)),
        Value::UInt8(v) => buf.put_u8(*v),
        Value::UInt32(v) => buf.put_u32(*v),
        Value::DateTime(dt) => {
            buf.put_u8(dt.hour);
            buf.put_u8(dt.minute);
            buf.put_u8(dt.second);
            buf.put_u8(dt.day);
            buf.put_u8(dt.month);
            buf.put_u16(dt.year);
            buf.put_u8(dt.weekday);
        }
        Value::Float(v) => buf.put_f32(*v),
        Value::Text(s) => encode_text(buf, s)?,
        Value::Timestamp(v) => buf.put_i64(*v),
    }

    Ok(())
}

/// Fixed-width ASCII field, zero padded
fn encode_text(buf: &mut BytesMut, text: &str) -> Result<()> {
    check_text(text)?;
    buf.put_slice(text.as_bytes());
    buf.put_bytes(0, TEXT_LEN - text.len());
    Ok(())
}

fn decode_text(buf: &mut &[u8]) -> Option<String> {
    if buf.remaining() < TEXT_LEN {
        trace!("Truncated text field: {} bytes", buf.remaining());
        return None;
    }

    let rest: &[u8] = *buf;
    let (raw, tail) = rest.split_at(TEXT_LEN);
    *buf = tail;

    if !raw.is_ascii() {
        trace!("Text field is not ASCII, dropping its contents");
        return Some(String::new());
    }

    let text: String = raw.iter().map(|&b| b as char).collect();
    Some(
        text.trim_end_matches(|c: char| c == '\0' || c.is_ascii_whitespace())
            .to_string(),
    )
}

#[inline]
fn take_u8(buf: &mut &[u8]) -> Option<u8> {
    if buf.has_remaining() {
        Some(buf.get_u8())
    } else {
        trace!("Frame ended inside the payload");
        None
    }
}
