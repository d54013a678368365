use std::path::PathBuf;
use std::time::Duration;

use seclink_frame::FrameError;
use seclink_gpio::GpioError;
use seclink_lock::LockError;
use seclink_transport::TransportError;

/// Top-level error for session, dispatch and reset operations.
#[derive(Debug, thiserror::Error)]
pub enum SeclinkError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Gpio(#[from] GpioError),

    /// The ready line never reached its expected level; the chip is
    /// either mid-operation or wedged.
    #[error("chip busy: ready line not asserted within {waited:?}")]
    ChipBusy { waited: Duration },

    /// A caller-supplied value is outside the protocol's limits.
    #[error("invalid parameter: {0}")]
    ParameterInvalid(String),

    /// The configuration file could not be read or parsed.
    #[error("config {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl SeclinkError {
    /// True for conditions that clear on their own: a busy chip, a
    /// held channel lock, a slow response. Callers may retry these;
    /// everything else is a hard failure.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SeclinkError::ChipBusy { .. }
                | SeclinkError::Transport(TransportError::DeviceBusy(_))
                | SeclinkError::Lock(LockError::LockTimeout { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, SeclinkError>;
