use std::path::PathBuf;

/// Errors raised by GPIO export, configuration or I/O.
///
/// A clean readiness timeout is *not* an error — see
/// [`crate::gate::ReadyOutcome`]; this type corresponds to the
/// "Failed" leg of the ready check.
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    /// A sysfs attribute could not be read or written.
    #[error("gpio {pin}: {op} via {path} failed: {source}")]
    Sysfs {
        pin: u32,
        op: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    /// The value file produced something other than '0' or '1'.
    #[error("gpio {pin}: unexpected value byte 0x{value:02X}")]
    BadValue { pin: u32, value: u8 },

    /// The line is configured as an input and cannot be driven.
    #[error("gpio {pin}: line is not an output")]
    NotOutput { pin: u32 },

    /// poll(2) on the value file failed.
    #[error("gpio {pin}: edge wait failed: {source}")]
    Poll { pin: u32, source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, GpioError>;
