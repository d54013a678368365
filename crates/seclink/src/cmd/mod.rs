use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};

use crate::exit::{seclink_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;
use seclink::{ResetMode, SessionConfig};

pub mod info;
pub mod reset;
pub mod send;
pub mod version;
pub mod wakeup;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one command frame and print the response.
    Send(SendArgs),
    /// Reset the chip.
    Reset(ResetArgs),
    /// Wake the chip from low-power state.
    Wakeup(WakeupArgs),
    /// Show the resolved session configuration.
    Info(InfoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, config: Option<&Path>, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, config, format),
        Command::Reset(args) => reset::run(args, config),
        Command::Wakeup(args) => wakeup::run(args, config),
        Command::Info(args) => info::run(args, config, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Instruction byte (e.g. 0x2A or 42).
    #[arg(long, value_name = "BYTE")]
    pub ins: String,
    /// First parameter byte.
    #[arg(long, value_name = "BYTE", default_value = "0")]
    pub p1: String,
    /// Second parameter byte.
    #[arg(long, value_name = "BYTE", default_value = "0")]
    pub p2: String,
    /// Channel index (SPI bus number; 0 elsewhere).
    #[arg(long, default_value = "0")]
    pub bus: usize,
    /// Body as a hex string.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Body as a raw string.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Read the body from a file.
    #[arg(long, conflicts_with_all = ["hex", "data"])]
    pub file: Option<PathBuf>,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ResetModeArg {
    /// Plain reset.
    Plain,
    /// Reset and install the PIN as the global PIN.
    UpdatePin,
}

impl ResetModeArg {
    pub fn to_mode(self) -> ResetMode {
        match self {
            ResetModeArg::Plain => ResetMode::Plain,
            ResetModeArg::UpdatePin => ResetMode::UpdateGlobalPin,
        }
    }
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    #[arg(long, value_enum, default_value = "plain")]
    pub mode: ResetModeArg,
    /// PIN to carry with the reset (4..=16 characters).
    #[arg(long)]
    pub pin: Option<String>,
    /// Channel index (SPI bus number; 0 elsewhere).
    #[arg(long, default_value = "0")]
    pub bus: usize,
}

#[derive(Args, Debug, Default)]
pub struct WakeupArgs {}

#[derive(Args, Debug, Default)]
pub struct InfoArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Load the session configuration: an explicit `--config` path must
/// exist; without one, `seclink.json` is used when present and the
/// defaults otherwise.
pub fn load_config(path: Option<&Path>) -> CliResult<SessionConfig> {
    match path {
        Some(path) => {
            SessionConfig::load(path).map_err(|err| seclink_error("config load failed", err))
        }
        None => {
            let fallback = Path::new("seclink.json");
            if fallback.exists() {
                SessionConfig::load(fallback)
                    .map_err(|err| seclink_error("config load failed", err))
            } else {
                Ok(SessionConfig::default())
            }
        }
    }
}

/// Parse a byte argument given as decimal or 0x-prefixed hex.
pub fn parse_byte(name: &str, text: &str) -> CliResult<u8> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| CliError::new(USAGE, format!("--{name} is not a byte: {text}")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
