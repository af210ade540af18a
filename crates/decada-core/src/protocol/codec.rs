// ============================================
// File: crates/decada-core/src/protocol/codec.rs
// ============================================
//! # Session Packet Codec
//!
//! ## Creation Reason
//! Provides binary serialization and deserialization for the session
//! control packets, so the session manager can speak to the broker over
//! any byte-stream transport.
//!
//! ## Main Functionality
//! - `Codec` trait: Generic encode/decode interface
//! - `PacketCodec`: MQTT 3.1.1 encoding for [`Packet`]
//! - `PacketCodec::check_complete`: framing over a receive buffer
//!
//! ## Parsing Strategy
//! 1. Read the header byte and remaining-length varint
//! 2. Wait until the whole packet is buffered
//! 3. Dispatch on packet type and validate every field
//!
//! ## ⚠️ Important Note for Next Developer
//! - Multi-byte integers are big-endian (network order)
//! - Always validate buffer lengths before reading
//! - Topic lists longer than `u16::MAX` are rejected before encoding
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CoreError, Result};
use crate::protocol::messages::{
    Connect, ConnectReturnCode, Packet, PacketType, Publish, MAX_REMAINING_LENGTH,
    MAX_TOPICS_PER_SUBSCRIBE, PROTOCOL_LEVEL, PROTOCOL_NAME,
};

// ============================================
// Codec Trait
// ============================================

/// Trait for encoding and decoding protocol messages.
pub trait Codec<T> {
    /// Encodes a message into a byte buffer.
    ///
    /// # Errors
    /// Returns an error if the message cannot be represented on the wire.
    fn encode(&self, msg: &T, buf: &mut BytesMut) -> Result<()>;

    /// Decodes exactly one message from `buf`.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid message.
    fn decode(&self, buf: &mut Bytes) -> Result<T>;
}

// ============================================
// PacketCodec
// ============================================

/// Codec implementation for session control packets.
///
/// # Example
/// ```
/// use bytes::BytesMut;
/// use decada_core::protocol::{Codec, Packet, PacketCodec};
///
/// let codec = PacketCodec::new();
/// let mut buf = BytesMut::new();
/// codec.encode(&Packet::PingReq, &mut buf).unwrap();
/// assert_eq!(&buf[..], &[0xC0, 0x00]);
///
/// let mut bytes = buf.freeze();
/// assert_eq!(codec.decode(&mut bytes).unwrap(), Packet::PingReq);
/// ```
#[derive(Debug, Default, Clone)]
pub struct PacketCodec;

impl PacketCodec {
    /// Creates a new packet codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Checks if the buffer starts with a complete packet.
    ///
    /// # Returns
    /// - `Ok(Some(len))` - Complete packet of `len` bytes
    /// - `Ok(None)` - Incomplete packet, need more data
    /// - `Err(_)` - Unknown packet type or invalid length encoding
    pub fn check_complete(buf: &[u8]) -> Result<Option<usize>> {
        let Some(&header) = buf.first() else {
            return Ok(None);
        };
        if PacketType::from_header(header).is_none() {
            return Err(CoreError::UnknownPacketType(header >> 4));
        }
        match decode_remaining_length(&buf[1..])? {
            Some((remaining, len_bytes)) => {
                let total = 1 + len_bytes + remaining;
                Ok((buf.len() >= total).then_some(total))
            }
            None => Ok(None),
        }
    }
}

impl Codec<Packet> for PacketCodec {
    fn encode(&self, msg: &Packet, buf: &mut BytesMut) -> Result<()> {
        let mut body = BytesMut::new();
        let flags = match msg {
            Packet::Connect(connect) => {
                encode_connect(connect, &mut body)?;
                0
            }
            Packet::ConnAck {
                session_present,
                return_code,
            } => {
                body.put_u8(u8::from(*session_present));
                body.put_u8(return_code.as_byte());
                0
            }
            Packet::Publish(publish) => encode_publish(publish, &mut body)?,
            Packet::PubAck { packet_id } => {
                body.put_u16(*packet_id);
                0
            }
            Packet::Subscribe { packet_id, topics } => {
                encode_subscribe(*packet_id, topics, &mut body)?;
                // SUBSCRIBE fixed-header flags are reserved as 0b0010
                0x02
            }
            Packet::SubAck {
                packet_id,
                return_codes,
            } => {
                body.put_u16(*packet_id);
                body.put_slice(return_codes);
                0
            }
            Packet::PingReq | Packet::PingResp | Packet::Disconnect => 0,
        };

        if body.len() > MAX_REMAINING_LENGTH {
            return Err(CoreError::PacketTooLarge {
                max: MAX_REMAINING_LENGTH,
                actual: body.len(),
            });
        }

        buf.reserve(5 + body.len());
        buf.put_u8((msg.packet_type().as_nibble() << 4) | flags);
        encode_remaining_length(body.len(), buf);
        buf.put_slice(&body);
        Ok(())
    }

    fn decode(&self, buf: &mut Bytes) -> Result<Packet> {
        if buf.is_empty() {
            return Err(CoreError::too_short(2, 0));
        }
        let header = buf.get_u8();
        let packet_type =
            PacketType::from_header(header).ok_or(CoreError::UnknownPacketType(header >> 4))?;
        let flags = header & 0x0F;

        let (remaining, len_bytes) = decode_remaining_length(&buf[..])?
            .ok_or_else(|| CoreError::malformed("truncated remaining length"))?;
        buf.advance(len_bytes);
        if buf.len() < remaining {
            return Err(CoreError::too_short(remaining, buf.len()));
        }
        let mut body = buf.split_to(remaining);

        let packet = match packet_type {
            PacketType::Connect => Packet::Connect(decode_connect(&mut body)?),
            PacketType::ConnAck => {
                require(&body, 2)?;
                let session_present = body.get_u8() & 0x01 == 1;
                let return_code = ConnectReturnCode::from_byte(body.get_u8());
                Packet::ConnAck {
                    session_present,
                    return_code,
                }
            }
            PacketType::Publish => Packet::Publish(decode_publish(flags, &mut body)?),
            PacketType::PubAck => {
                require(&body, 2)?;
                Packet::PubAck {
                    packet_id: body.get_u16(),
                }
            }
            PacketType::Subscribe => {
                require(&body, 2)?;
                let packet_id = body.get_u16();
                let mut topics = Vec::new();
                while body.has_remaining() {
                    topics.push(read_string(&mut body)?);
                    require(&body, 1)?;
                    body.advance(1);
                }
                Packet::Subscribe { packet_id, topics }
            }
            PacketType::SubAck => {
                require(&body, 2)?;
                let packet_id = body.get_u16();
                Packet::SubAck {
                    packet_id,
                    return_codes: body.to_vec(),
                }
            }
            PacketType::PingReq => Packet::PingReq,
            PacketType::PingResp => Packet::PingResp,
            PacketType::Disconnect => Packet::Disconnect,
        };
        Ok(packet)
    }
}

// ============================================
// Packet Bodies
// ============================================

fn encode_connect(connect: &Connect, body: &mut BytesMut) -> Result<()> {
    write_string(PROTOCOL_NAME, body)?;
    body.put_u8(PROTOCOL_LEVEL);

    let mut connect_flags = 0u8;
    if connect.username.is_some() {
        connect_flags |= 0x80;
    }
    if connect.password.is_some() {
        connect_flags |= 0x40;
    }
    if connect.clean_session {
        connect_flags |= 0x02;
    }
    body.put_u8(connect_flags);
    body.put_u16(connect.keep_alive_secs);

    write_string(&connect.client_id, body)?;
    if let Some(username) = &connect.username {
        write_string(username, body)?;
    }
    if let Some(password) = &connect.password {
        write_string(password, body)?;
    }
    Ok(())
}

fn decode_connect(body: &mut Bytes) -> Result<Connect> {
    let name = read_string(body)?;
    if name != PROTOCOL_NAME {
        return Err(CoreError::malformed(format!("unexpected protocol name {name}")));
    }
    require(body, 4)?;
    let level = body.get_u8();
    if level != PROTOCOL_LEVEL {
        return Err(CoreError::malformed(format!("unsupported protocol level {level}")));
    }
    let connect_flags = body.get_u8();
    let keep_alive_secs = body.get_u16();
    let client_id = read_string(body)?;
    let username = if connect_flags & 0x80 != 0 {
        Some(read_string(body)?)
    } else {
        None
    };
    let password = if connect_flags & 0x40 != 0 {
        Some(read_string(body)?)
    } else {
        None
    };
    Ok(Connect {
        client_id,
        username,
        password,
        keep_alive_secs,
        clean_session: connect_flags & 0x02 != 0,
    })
}

fn encode_publish(publish: &Publish, body: &mut BytesMut) -> Result<u8> {
    if publish.qos > 1 {
        return Err(CoreError::malformed(format!("unsupported qos {}", publish.qos)));
    }
    write_string(&publish.topic, body)?;
    if publish.qos > 0 {
        let packet_id = publish
            .packet_id
            .ok_or_else(|| CoreError::malformed("qos 1 publish without packet id"))?;
        body.put_u16(packet_id);
    }
    body.put_slice(&publish.payload);

    Ok((u8::from(publish.dup) << 3) | (publish.qos << 1) | u8::from(publish.retain))
}

fn decode_publish(flags: u8, body: &mut Bytes) -> Result<Publish> {
    let qos = (flags >> 1) & 0x03;
    if qos > 1 {
        return Err(CoreError::malformed(format!("unsupported qos {qos}")));
    }
    let topic = read_string(body)?;
    let packet_id = if qos > 0 {
        require(body, 2)?;
        Some(body.get_u16())
    } else {
        None
    };
    Ok(Publish {
        topic,
        payload: std::mem::take(body),
        qos,
        packet_id,
        retain: flags & 0x01 != 0,
        dup: flags & 0x08 != 0,
    })
}

fn encode_subscribe(packet_id: u16, topics: &[String], body: &mut BytesMut) -> Result<()> {
    if topics.is_empty() {
        return Err(CoreError::malformed("subscribe requires at least one topic"));
    }
    if topics.len() > MAX_TOPICS_PER_SUBSCRIBE {
        return Err(CoreError::TopicListTooLong {
            count: topics.len(),
            max: MAX_TOPICS_PER_SUBSCRIBE,
        });
    }
    body.put_u16(packet_id);
    for topic in topics {
        write_string(topic, body)?;
        body.put_u8(0);
    }
    Ok(())
}

// ============================================
// Primitive Helpers
// ============================================

fn require(buf: &Bytes, needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(CoreError::too_short(needed, buf.len()));
    }
    Ok(())
}

fn write_string(value: &str, buf: &mut BytesMut) -> Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| CoreError::PacketTooLarge {
        max: usize::from(u16::MAX),
        actual: value.len(),
    })?;
    buf.put_u16(len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

fn read_string(buf: &mut Bytes) -> Result<String> {
    require(buf, 2)?;
    let len = usize::from(buf.get_u16());
    require(buf, len)?;
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| CoreError::malformed("string is not UTF-8"))
}

fn encode_remaining_length(mut len: usize, buf: &mut BytesMut) {
    loop {
        // Truncation intended: low seven bits only
        #[allow(clippy::cast_possible_truncation)]
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if len == 0 {
            break;
        }
    }
}

/// Returns `(value, bytes_used)`, or `None` if more bytes are needed.
fn decode_remaining_length(buf: &[u8]) -> Result<Option<(usize, usize)>> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for (index, byte) in buf.iter().enumerate() {
        if index == 4 {
            return Err(CoreError::malformed("remaining length exceeds four bytes"));
        }
        value += usize::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((value, index + 1)));
        }
        multiplier *= 128;
    }
    if buf.len() >= 4 {
        return Err(CoreError::malformed("remaining length exceeds four bytes"));
    }
    Ok(None)
}

// ============================================
// Tests
// ============================================
