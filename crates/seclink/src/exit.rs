use std::fmt;
use std::io;

use seclink::gpio::GpioError;
use seclink::transport::TransportError;
use seclink::SeclinkError;

// Exit code conventions follow sysexits where one fits.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const BUSY: i32 = 75;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn seclink_error(context: &str, err: SeclinkError) -> CliError {
    if err.is_busy() {
        return CliError::new(BUSY, format!("{context}: {err}"));
    }
    match err {
        SeclinkError::Transport(TransportError::Timeout(_)) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        SeclinkError::Transport(TransportError::Open { source, .. })
        | SeclinkError::Transport(TransportError::Connect { source, .. })
        | SeclinkError::Transport(TransportError::Io(source)) => io_error(context, source),
        SeclinkError::Transport(_) => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        SeclinkError::Frame(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        SeclinkError::Gpio(GpioError::Sysfs { ref source, .. })
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        SeclinkError::Gpio(_) => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        SeclinkError::Lock(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
        SeclinkError::ParameterInvalid(_) => CliError::new(USAGE, format!("{context}: {err}")),
        SeclinkError::Config { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        SeclinkError::ChipBusy { .. } => CliError::new(BUSY, format!("{context}: {err}")),
    }
}
