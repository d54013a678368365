use bytes::{BufMut, Bytes, BytesMut};

use crate::consts::MAX_SRV_BODY_LEN;
use crate::error::{FrameError, Result};

/// Envelope header: length (2) + messageId (1) + param1 (1) +
/// param2 (1) + returnCode (1) = 6 bytes.
pub const ENVELOPE_HEADER_LEN: usize = 6;

/// Message class exchanged with the chip proxy process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    /// A business transaction; the body is a complete chip frame.
    Business = 0,
    /// Chip reset negotiation.
    Reset = 1,
    /// Transaction-lock negotiation.
    TransLock = 2,
    /// Connection keep-alive, independent of business traffic.
    Heartbeat = 3,
}

impl TryFrom<u8> for MessageId {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MessageId::Business),
            1 => Ok(MessageId::Reset),
            2 => Ok(MessageId::TransLock),
            3 => Ok(MessageId::Heartbeat),
            other => Err(FrameError::UnknownMessageId(other)),
        }
    }
}

/// A decoded proxy envelope.
///
/// No CRC field: the proxy link is TCP, which already guarantees
/// integrity; the chip frame inside a Business body carries its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEnvelope {
    pub id: MessageId,
    pub param1: u8,
    pub param2: u8,
    pub return_code: u8,
    pub body: Bytes,
}

impl ServerEnvelope {
    pub fn wire_size(&self) -> usize {
        ENVELOPE_HEADER_LEN + self.body.len()
    }
}

/// Encode a proxy envelope. Length field counts header + body.
pub fn encode_envelope(id: MessageId, param1: u8, param2: u8, body: &[u8]) -> Result<BytesMut> {
    if body.len() > MAX_SRV_BODY_LEN {
        return Err(FrameError::BodyTooLarge {
            size: body.len(),
            max: MAX_SRV_BODY_LEN,
        });
    }

    let total = ENVELOPE_HEADER_LEN + body.len();
    let mut dst = BytesMut::with_capacity(total);
    dst.put_u16(total as u16);
    dst.put_u8(id as u8);
    dst.put_u8(param1);
    dst.put_u8(param2);
    dst.put_u8(0);
    dst.put_slice(body);
    Ok(dst)
}

/// Decode a complete proxy envelope from `src`.
pub fn decode_envelope(src: &[u8]) -> Result<ServerEnvelope> {
    if src.len() < ENVELOPE_HEADER_LEN {
        return Err(FrameError::Truncated {
            declared: ENVELOPE_HEADER_LEN,
            actual: src.len(),
        });
    }

    let declared = u16::from_be_bytes([src[0], src[1]]) as usize;
    if declared < ENVELOPE_HEADER_LEN || declared > ENVELOPE_HEADER_LEN + MAX_SRV_BODY_LEN {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: src.len(),
        });
    }
    if src.len() < declared {
        return Err(FrameError::Truncated {
            declared,
            actual: src.len(),
        });
    }
    if src.len() > declared {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: src.len(),
        });
    }

    Ok(ServerEnvelope {
        id: MessageId::try_from(src[2])?,
        param1: src[3],
        param2: src[4],
        return_code: src[5],
        body: Bytes::copy_from_slice(&src[ENVELOPE_HEADER_LEN..]),
    })
}
