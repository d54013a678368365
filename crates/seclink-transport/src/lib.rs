//! Physical link abstraction for the security chip.
//!
//! One [`ChipLink`] per channel, selected once at construction and
//! fixed for the channel's lifetime:
//! - [`BusDevice`] — SPI, I²C or SDIO kernel character device
//! - [`ProxySocket`] — TCP connection to a proxy process that owns the
//!   real hardware and multiplexes several clients
//!
//! Links carry exactly one request/response exchange per
//! `send`/`recv` pair and are never multiplexed internally; the
//! cross-process exclusivity guarantee lives in `seclink-lock`.

pub mod bus;
pub mod error;
pub mod socket;
pub mod traits;

pub use bus::BusDevice;
pub use error::{Result, TransportError};
pub use socket::ProxySocket;
pub use traits::{ChipLink, DeviceKind, ResetRequest};
