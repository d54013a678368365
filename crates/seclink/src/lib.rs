//! Session, dispatch and reset control for the security-chip link.
//!
//! seclink talks to a vendor security chip over SPI, I²C, SDIO or a
//! TCP proxy, with cross-process channel locking and GPIO-based chip
//! control.
//!
//! # Crate Structure
//!
//! - [`frame`] — CRC-checked chip frames and proxy envelopes
//! - [`transport`] — Bus device and proxy socket links
//! - [`gpio`] — Ready, reset and wake-up lines
//! - [`lock`] — Cross-process channel locks
//! - [`session`] / [`dispatch`] / [`reset`] — The high-level API:
//!   open a [`Session`], exchange [`Command`]s, drive resets

pub mod config;
pub mod dispatch;
pub mod error;
pub mod reset;
pub mod session;

/// Re-export frame types.
pub mod frame {
    pub use seclink_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use seclink_transport::*;
}

/// Re-export GPIO types.
pub mod gpio {
    pub use seclink_gpio::*;
}

/// Re-export lock types.
pub mod lock {
    pub use seclink_lock::*;
}

pub use config::{PinVerify, SessionConfig};
pub use dispatch::{send_recv, Command};
pub use error::{Result, SeclinkError};
pub use reset::{ResetController, ResetMode};
pub use session::{Channel, LinkRegistry, ReadyCheck, Session};
