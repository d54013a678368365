use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: length (2) + crc (2) + instruction (1) + param1 (1) +
/// param2 (1) + returnCode (1) = 8 bytes.
pub const FRAME_HEADER_LEN: usize = 8;

const LEN_OFFSET: usize = 0;
const CRC_OFFSET: usize = 2;
const INS_OFFSET: usize = 4;

/// A decoded chip frame.
///
/// `length` always equals the number of header + body bytes on the
/// wire; `return_code` is zero in requests and carries the chip's
/// result in responses (0 = success). Interpreting it is the caller's
/// concern, not the codec's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub instruction: u8,
    pub param1: u8,
    pub param2: u8,
    pub return_code: u8,
    pub body: Bytes,
}

impl Frame {
    /// The total wire size of this frame (header + body).
    pub fn wire_size(&self) -> usize {
        FRAME_HEADER_LEN + self.body.len()
    }
}

/// Encode a command frame into the wire format.
///
/// Wire format (all multi-byte fields big-endian):
/// ```text
/// ┌──────────┬─────────┬──────┬────┬────┬─────┬──────────────┐
/// │ Length   │ CRC-16  │ Ins  │ P1 │ P2 │ Ret │ Body          │
/// │ (2B BE)  │ (2B BE) │ (1B) │ 1B │ 1B │ 1B  │ 0..max bytes  │
/// └──────────┴─────────┴──────┴────┴────┴─────┴──────────────┘
/// ```
/// The CRC covers every byte of the frame except the CRC field itself.
pub fn encode_frame(
    instruction: u8,
    param1: u8,
    param2: u8,
    body: &[u8],
    max_body: usize,
) -> Result<BytesMut> {
    if body.len() > max_body {
        return Err(FrameError::BodyTooLarge {
            size: body.len(),
            max: max_body,
        });
    }

    let total = FRAME_HEADER_LEN + body.len();
    let mut dst = BytesMut::with_capacity(total);
    dst.put_u16(total as u16);
    dst.put_u16(0); // CRC placeholder, patched below
    dst.put_u8(instruction);
    dst.put_u8(param1);
    dst.put_u8(param2);
    dst.put_u8(0); // returnCode, unused in requests
    dst.put_slice(body);

    let crc = frame_crc(&dst);
    dst[CRC_OFFSET..CRC_OFFSET + 2].copy_from_slice(&crc.to_be_bytes());
    Ok(dst)
}

/// Decode a complete frame from `src`.
///
/// `src` must contain exactly the bytes of one frame: fewer bytes than
/// the declared length fail with `Truncated`, surplus bytes or an
/// impossible declared length fail with `LengthMismatch`, and a bad
/// checksum fails with `CrcMismatch`. Decoding never mutates shared
/// state.
pub fn decode_frame(src: &[u8], max_body: usize) -> Result<Frame> {
    if src.len() < FRAME_HEADER_LEN {
        return Err(FrameError::Truncated {
            declared: FRAME_HEADER_LEN,
            actual: src.len(),
        });
    }

    let declared = u16::from_be_bytes([src[LEN_OFFSET], src[LEN_OFFSET + 1]]) as usize;
    if declared < FRAME_HEADER_LEN || declared > FRAME_HEADER_LEN + max_body {
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

    let declared_crc = u16::from_be_bytes([src[CRC_OFFSET], src[CRC_OFFSET + 1]]);
    let computed_crc = frame_crc(src);
    if declared_crc != computed_crc {
        return Err(FrameError::CrcMismatch {
            declared: declared_crc,
            computed: computed_crc,
        });
    }

    Ok(Frame {
        instruction: src[INS_OFFSET],
        param1: src[INS_OFFSET + 1],
        param2: src[INS_OFFSET + 2],
        return_code: src[INS_OFFSET + 3],
        body: Bytes::copy_from_slice(&src[FRAME_HEADER_LEN..]),
    })
}

/// Checksum over the whole frame, skipping the CRC field.
fn frame_crc(frame: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for (i, &b) in frame.iter().enumerate() {
        if (CRC_OFFSET..CRC_OFFSET + 2).contains(&i) {
            continue;
        }
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{MAX_BODY_LEN, MAX_SDIO_BODY_LEN};
    use crate::crc::crc16_ccitt_false;

    // frame_crc must agree with the standalone routine when the skipped
    // field is spliced out.
    fn frame_crc_reference(frame: &[u8]) -> u16 {
        let mut stripped = Vec::with_capacity(frame.len() - 2);
        stripped.extend_from_slice(&frame[..CRC_OFFSET]);
        stripped.extend_from_slice(&frame[CRC_OFFSET + 2..]);
        crc16_ccitt_false(&stripped)
    }

    #[test]
    fn roundtrip_preserves_all_fields() {
        let body = [0x11u8, 0x22, 0x33, 0x44, 0x55];
        let wire = encode_frame(0x7A, 0x01, 0x02, &body, MAX_BODY_LEN).unwrap();
        let frame = decode_frame(&wire, MAX_BODY_LEN).unwrap();

        assert_eq!(frame.instruction, 0x7A);
        assert_eq!(frame.param1, 0x01);
        assert_eq!(frame.param2, 0x02);
        assert_eq!(frame.return_code, 0);
        assert_eq!(frame.body.as_ref(), body);
        assert_eq!(frame.wire_size(), wire.len());
    }

    #[test]
    fn spi_frame_with_32_byte_body_declares_length_40() {
        let wire = encode_frame(0x01, 0, 0, &[0u8; 32], MAX_BODY_LEN).unwrap();
        assert_eq!(wire.len(), 40);
        assert_eq!(u16::from_be_bytes([wire[0], wire[1]]), 40);

        let frame = decode_frame(&wire, MAX_BODY_LEN).unwrap();
        assert_eq!(frame.instruction, 0x01);
        assert_eq!(frame.body.as_ref(), &[0u8; 32]);
    }

    #[test]
    fn empty_body_roundtrip() {
        let wire = encode_frame(0x10, 0xFF, 0x00, &[], MAX_BODY_LEN).unwrap();
        assert_eq!(wire.len(), FRAME_HEADER_LEN);
        let frame = decode_frame(&wire, MAX_BODY_LEN).unwrap();
        assert!(frame.body.is_empty());
    }

    #[test]
    fn body_too_large_rejected_at_encode() {
        let body = vec![0u8; MAX_BODY_LEN + 1];
        let err = encode_frame(0x01, 0, 0, &body, MAX_BODY_LEN).unwrap_err();
        assert!(matches!(err, FrameError::BodyTooLarge { size, max }
            if size == MAX_BODY_LEN + 1 && max == MAX_BODY_LEN));
    }

    #[test]
    fn sdio_accepts_large_body() {
        let body = vec![0xA5u8; MAX_SDIO_BODY_LEN];
        let wire = encode_frame(0x30, 0, 0, &body, MAX_SDIO_BODY_LEN).unwrap();
        let frame = decode_frame(&wire, MAX_SDIO_BODY_LEN).unwrap();
        assert_eq!(frame.body.len(), MAX_SDIO_BODY_LEN);
    }

    #[test]
    fn every_truncation_is_reported() {
        let wire = encode_frame(0x02, 1, 2, b"truncate-me", MAX_BODY_LEN).unwrap();
        for cut in 0..wire.len() {
            let err = decode_frame(&wire[..cut], MAX_BODY_LEN).unwrap_err();
            assert!(
                matches!(err, FrameError::Truncated { .. }),
                "prefix of {cut} bytes must be Truncated, got {err:?}"
            );
        }
    }

    #[test]
    fn surplus_bytes_are_a_length_mismatch() {
        let mut wire = encode_frame(0x02, 0, 0, b"x", MAX_BODY_LEN).unwrap();
        wire.put_u8(0xEE);
        let err = decode_frame(&wire, MAX_BODY_LEN).unwrap_err();
        assert!(matches!(err, FrameError::LengthMismatch { .. }));
    }

    #[test]
    fn declared_length_below_header_is_a_length_mismatch() {
        let mut wire = encode_frame(0x02, 0, 0, &[], MAX_BODY_LEN).unwrap();
        wire[0..2].copy_from_slice(&3u16.to_be_bytes());
        let err = decode_frame(&wire, MAX_BODY_LEN).unwrap_err();
        assert!(matches!(err, FrameError::LengthMismatch { .. }));
    }

    #[test]
    fn declared_length_above_transport_max_is_a_length_mismatch() {
        let mut wire = encode_frame(0x02, 0, 0, &[], MAX_BODY_LEN).unwrap();
        wire[0..2].copy_from_slice(&(MAX_BODY_LEN as u16 + 9).to_be_bytes());
        let err = decode_frame(&wire, MAX_BODY_LEN).unwrap_err();
        assert!(matches!(err, FrameError::LengthMismatch { .. }));
    }

    #[test]
    fn flipping_any_non_crc_bit_is_detected() {
        let wire = encode_frame(0x01, 0x02, 0x03, b"integrity", MAX_BODY_LEN).unwrap();
        for byte in 0..wire.len() {
            if (CRC_OFFSET..CRC_OFFSET + 2).contains(&byte) {
                continue;
            }
            for bit in 0..8 {
                let mut corrupted = wire.to_vec();
                corrupted[byte] ^= 1 << bit;
                let result = decode_frame(&corrupted, MAX_BODY_LEN);
                assert!(
                    matches!(
                        result,
                        Err(FrameError::CrcMismatch { .. })
                            | Err(FrameError::LengthMismatch { .. })
                            | Err(FrameError::Truncated { .. })
                    ),
                    "flip at byte {byte} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn flipping_a_crc_bit_is_detected_too() {
        let wire = encode_frame(0x01, 0, 0, b"abc", MAX_BODY_LEN).unwrap();
        let mut corrupted = wire.to_vec();
        corrupted[CRC_OFFSET] ^= 0x80;
        let err = decode_frame(&corrupted, MAX_BODY_LEN).unwrap_err();
        assert!(matches!(err, FrameError::CrcMismatch { .. }));
    }

    #[test]
    fn skip_field_crc_agrees_with_spliced_reference() {
        let wire = encode_frame(0x55, 0xAA, 0x5A, b"crc-agreement", MAX_BODY_LEN).unwrap();
        assert_eq!(frame_crc(&wire), frame_crc_reference(&wire));
    }
}
