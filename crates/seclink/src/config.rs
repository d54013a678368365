use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SeclinkError};
use seclink_gpio::{gate, Level, ReadyGate};
use seclink_transport::DeviceKind;

/// PIN length limits enforced before anything touches the wire.
pub const MIN_PIN_LEN: usize = 4;
pub const MAX_PIN_LEN: usize = 16;

/// How the session observes the ready line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyModeConfig {
    Poll,
    Edge,
}

/// Automatic PIN verification after a hardware reset.
///
/// The instruction byte is board-profile specific, so it lives in the
/// configuration rather than as a constant here.
#[derive(Debug, Clone, Deserialize)]
pub struct PinVerify {
    pub instruction: u8,
    pub pin: String,
}

/// Everything a [`Session`](crate::session::Session) needs to reach
/// the chip: which link kind, where its device nodes live, which GPIO
/// pins carry the control signals, and the timing budgets.
///
/// Loaded from a JSON file; every field has a default so a minimal
/// file only names what differs from the reference board.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Link kind for every channel of this session.
    pub device: DeviceKind,
    /// SPI device nodes, one channel each (at most two buses).
    pub spi_devices: Vec<PathBuf>,
    pub i2c_device: PathBuf,
    pub sdio_device: PathBuf,
    /// `host:port` of the chip proxy for socket sessions.
    pub proxy_addr: String,
    /// Sysfs GPIO root. Overridden in tests.
    pub gpio_base: PathBuf,
    pub ready_pin: u32,
    pub reset_pin: u32,
    pub wakeup_pin: u32,
    pub ready_mode: ReadyModeConfig,
    /// Level of the ready line when the chip can take a command.
    pub ready_active_high: bool,
    pub lock_timeout_ms: u64,
    pub response_timeout_ms: u64,
    pub ready_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Width of the reset (and wake-up) pulse.
    pub reset_pulse_ms: u64,
    /// Verify a PIN against the chip after each hardware reset.
    pub auto_verify: Option<PinVerify>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: DeviceKind::Spi,
            spi_devices: vec![PathBuf::from("/dev/spidev0.0")],
            i2c_device: PathBuf::from("/dev/i2c-1"),
            sdio_device: PathBuf::from("/dev/sdio0"),
            proxy_addr: "127.0.0.1:9060".to_string(),
            gpio_base: PathBuf::from("/sys/class/gpio"),
            ready_pin: 7,
            reset_pin: 11,
            wakeup_pin: 13,
            ready_mode: ReadyModeConfig::Poll,
            ready_active_high: true,
            lock_timeout_ms: 5_000,
            response_timeout_ms: 5_000,
            ready_timeout_ms: gate::DEFAULT_READY_TIMEOUT.as_millis() as u64,
            connect_timeout_ms: 3_000,
            reset_pulse_ms: 10,
            auto_verify: None,
        }
    }
}

impl SessionConfig {
    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| SeclinkError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|err| SeclinkError::Config {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.spi_devices.is_empty() && self.device == DeviceKind::Spi {
            return Err(SeclinkError::ParameterInvalid(
                "spi session configured with no spi_devices".to_string(),
            ));
        }
        if self.spi_devices.len() > 2 {
            return Err(SeclinkError::ParameterInvalid(format!(
                "at most 2 spi buses are supported, got {}",
                self.spi_devices.len()
            )));
        }
        if let Some(verify) = &self.auto_verify {
            validate_pin(&verify.pin)?;
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reset_pulse(&self) -> Duration {
        Duration::from_millis(self.reset_pulse_ms)
    }

    /// Level the ready line holds when the chip can take a command.
    pub fn ready_level(&self) -> Level {
        if self.ready_active_high {
            Level::High
        } else {
            Level::Low
        }
    }

    pub fn ready_gate(&self) -> ReadyGate {
        match self.ready_mode {
            ReadyModeConfig::Poll => ReadyGate::polling(),
            ReadyModeConfig::Edge => ReadyGate::edge_triggered(),
        }
    }
}

/// The chip rejects PINs outside 4..=16 characters; fail before the
/// value ever reaches the wire.
pub fn validate_pin(pin: &str) -> Result<()> {
    let len = pin.chars().count();
    if !(MIN_PIN_LEN..=MAX_PIN_LEN).contains(&len) {
        return Err(SeclinkError::ParameterInvalid(format!(
            "pin must be {MIN_PIN_LEN}..={MAX_PIN_LEN} characters, got {len}"
        )));
    }
    Ok(())
}
