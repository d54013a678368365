use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur on a physical chip link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a bus device node.
    #[error("failed to open device {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the proxy process.
    #[error("failed to connect to proxy {addr}: {source}")]
    Connect { addr: String, source: std::io::Error },

    /// No response arrived within the allotted time.
    #[error("link timed out after {0:?}")]
    Timeout(Duration),

    /// The chip or proxy reported it cannot take the request right now.
    #[error("device busy (return code 0x{0:02X})")]
    DeviceBusy(u8),

    /// The proxy rejected or failed the request.
    #[error("communication failure (return code 0x{0:02X})")]
    CommFailure(u8),

    /// The peer closed the link mid-exchange.
    #[error("link closed by peer")]
    Closed,

    /// Malformed bytes on the wire.
    #[error("wire format error: {0}")]
    Frame(#[from] seclink_frame::FrameError),

    /// The operation is not available on this link kind.
    #[error("operation not supported on {0:?} links")]
    NotSupported(crate::traits::DeviceKind),

    /// An I/O error occurred on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
