use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use seclink_frame::{MAX_BODY_LEN, MAX_MSG_LEN, MAX_SDIO_BODY_LEN, MAX_SDIO_MSG_LEN};

/// The kind of physical path to the chip. Selected once per channel at
/// construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Spi,
    I2c,
    Sdio,
    Socket,
}

impl DeviceKind {
    /// The configuration selector used by the vendor tooling.
    pub fn selector(self) -> u8 {
        match self {
            DeviceKind::Spi => 0,
            DeviceKind::I2c => 1,
            DeviceKind::Sdio => 2,
            DeviceKind::Socket => 3,
        }
    }

    pub fn from_selector(value: u8) -> Option<Self> {
        match value {
            0 => Some(DeviceKind::Spi),
            1 => Some(DeviceKind::I2c),
            2 => Some(DeviceKind::Sdio),
            3 => Some(DeviceKind::Socket),
            _ => None,
        }
    }

    /// Largest frame body this link kind can carry.
    pub fn max_body(self) -> usize {
        match self {
            DeviceKind::Sdio => MAX_SDIO_BODY_LEN,
            _ => MAX_BODY_LEN,
        }
    }

    /// Largest complete frame this link kind can carry.
    pub fn max_message(self) -> usize {
        match self {
            DeviceKind::Sdio => MAX_SDIO_MSG_LEN,
            _ => MAX_MSG_LEN,
        }
    }

    /// Direct-hardware kinds require a GPIO ready check before each
    /// command; the proxy performs its own on the far side.
    pub fn needs_ready_check(self) -> bool {
        !matches!(self, DeviceKind::Socket)
    }
}

/// A reset request forwarded to a transport that can reset the chip
/// remotely (the proxy socket).
#[derive(Debug, Clone)]
pub struct ResetRequest<'a> {
    /// Vendor reset mode selector: 0 = update global PIN, 1 = plain.
    pub mode: u8,
    /// Whether a PIN accompanies the request.
    pub need_pin: bool,
    /// PIN value, only meaningful when `need_pin` is set.
    pub pin: Option<&'a str>,
}

/// A raw byte link to the chip.
///
/// Each `send` must be followed by exactly one `recv`; the pair forms
/// one logical exchange. Implementations do not lock — callers hold
/// the channel lock around the whole exchange.
pub trait ChipLink: Send {
    fn kind(&self) -> DeviceKind;

    /// Write one complete request onto the link.
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Block up to `timeout` for one complete response.
    ///
    /// Both wire formats open with a 16-bit big-endian total length, so
    /// implementations accumulate bytes until that length is satisfied
    /// (bounded by `max_len`) and return the complete message.
    fn recv(&mut self, max_len: usize, timeout: Duration) -> Result<Bytes>;

    /// Ask the transport to reset the chip on our behalf.
    ///
    /// Returns `Ok(false)` when the transport has no such facility and
    /// the caller must drive the reset GPIO itself. The proxy socket
    /// overrides this and returns `Ok(true)` once the proxy confirms.
    fn try_remote_reset(&mut self, _request: &ResetRequest<'_>) -> Result<bool> {
        Ok(false)
    }
}

impl std::fmt::Debug for dyn ChipLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChipLink").field("kind", &self.kind()).finish()
    }
}
