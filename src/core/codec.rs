//! # Frame Codec
//!
//! Converts packets to and from self-delimiting frames:
//!
//! ```text
//! [Length(4, big-endian u32)] [UTF-8 JSON payload(Length)]
//! ```
//!
//! A whole frame may not exceed [`MAX_FRAME_SIZE`] bytes. The limit is checked
//! before anything is written into the output buffer, so an oversized packet
//! never reaches the stream.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::{LENGTH_PREFIX_LEN, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};
use crate::core::packet::Packet;
use crate::error::{constants, ProtocolError, Result};

/// Serialize a packet into a complete frame.
pub fn encode(packet: &Packet) -> Result<BytesMut> {
    let payload =
        serde_json::to_vec(packet).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    frame_payload(&payload)
}

/// Prefix an already serialized payload with its length.
pub fn frame_payload(payload: &[u8]) -> Result<BytesMut> {
    let frame_len = LENGTH_PREFIX_LEN + payload.len();
    if frame_len > MAX_FRAME_SIZE {
        return Err(ProtocolError::OversizedPacket(frame_len));
    }

    let mut buf = BytesMut::with_capacity(frame_len);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    Ok(buf)
}

/// Parse a frame payload (without its length prefix) into a packet.
pub fn decode(payload: &[u8]) -> Result<Packet> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    Packet::try_from(value)
}

/// Tokio codec for reading and writing packet frames on a byte stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX_LEN]);
        let len = u32::from_be_bytes(prefix) as usize;

        if len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::Framing(format!(
                "{} ({len} bytes)",
                constants::ERR_OVERSIZED_PREFIX
            )));
        }

        if src.len() < LENGTH_PREFIX_LEN + len {
            src.reserve(LENGTH_PREFIX_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        let payload = src.split_to(len);
        decode(&payload).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::Framing(format!(
                "{} ({} bytes buffered)",
                constants::ERR_TRUNCATED_FRAME,
                src.len()
            ))),
        }
    }
}

impl Encoder<&Packet> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: &Packet, dst: &mut BytesMut) -> Result<()> {
        let frame = encode(packet)?;
        dst.extend_from_slice(&frame);
        Ok(())
    }
}
