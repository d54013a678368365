//! Wire codecs for the security-chip link.
//!
//! Two message units live here:
//! - [`Frame`] — the fixed-header, CRC-16 checksummed unit exchanged
//!   directly with the chip over SPI/I²C/SDIO (and carried opaquely
//!   inside proxy envelopes on socket channels).
//! - [`ServerEnvelope`] — the unit exchanged with the chip proxy
//!   process over TCP, which multiplexes business traffic with reset,
//!   lock and heartbeat control messages.
//!
//! Encoding and decoding are pure functions over byte buffers — no
//! transport state, so the codecs can be fuzzed and property-tested in
//! isolation.

pub mod codec;
pub mod consts;
pub mod crc;
pub mod envelope;
pub mod error;

pub use codec::{decode_frame, encode_frame, Frame, FRAME_HEADER_LEN};
pub use consts::{
    MAX_BODY_LEN, MAX_MSG_LEN, MAX_SDIO_BODY_LEN, MAX_SDIO_MSG_LEN, MAX_SRV_BODY_LEN,
    PROXY_RESET_WAIT,
};
pub use crc::crc16_ccitt_false;
pub use envelope::{
    decode_envelope, encode_envelope, MessageId, ServerEnvelope, ENVELOPE_HEADER_LEN,
};
pub use error::{FrameError, Result};
