use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::dispatch::{self, Command};
use crate::error::{Result, SeclinkError};
use crate::reset::ResetController;
use seclink_frame::Frame;
use seclink_gpio::{DigitalLine, Direction, Edge, GpioLine, Level, ReadyGate};
use seclink_lock::{ChannelLock, LocalLock, LockKey};
#[cfg(unix)]
use seclink_lock::SysvSemaphore;
use seclink_transport::{BusDevice, ChipLink, DeviceKind, ProxySocket};

/// Ready-line check performed before every command on direct-hardware
/// channels.
pub struct ReadyCheck {
    pub line: Box<dyn DigitalLine>,
    pub gate: ReadyGate,
    pub expected: Level,
    pub timeout: Duration,
}

/// One logical path to the chip: a link, the lock that serializes it
/// across processes, and (on hardware kinds) its ready check.
///
/// The link kind is fixed at construction and never changes for the
/// channel's lifetime.
pub struct Channel {
    pub(crate) kind: DeviceKind,
    pub(crate) link: Box<dyn ChipLink>,
    pub(crate) lock: Arc<dyn ChannelLock>,
    pub(crate) lock_timeout: Duration,
    pub(crate) ready: Option<ReadyCheck>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("kind", &self.kind)
            .field("lock", &self.lock.name())
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

impl Channel {
    pub fn new(kind: DeviceKind, link: Box<dyn ChipLink>, lock: Arc<dyn ChannelLock>) -> Self {
        Self {
            kind,
            link,
            lock,
            lock_timeout: Duration::from_secs(5),
            ready: None,
        }
    }

    pub fn with_ready(mut self, ready: ReadyCheck) -> Self {
        self.ready = Some(ready);
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn lock_name(&self) -> String {
        self.lock.name()
    }

    /// Direct access to the underlying link, for operations outside
    /// the frame exchange (heartbeats, remote reset).
    pub fn link_mut(&mut self) -> &mut dyn ChipLink {
        self.link.as_mut()
    }
}

/// Builds a [`ChipLink`] for one channel. `bus` is the channel index
/// within the kind (only SPI has more than one).
pub type LinkFactory = fn(&SessionConfig, usize) -> Result<Box<dyn ChipLink>>;

/// Maps each [`DeviceKind`] to the factory that opens its link.
///
/// The defaults open real device nodes and sockets; tests and unusual
/// deployments register their own factories.
pub struct LinkRegistry {
    factories: HashMap<DeviceKind, LinkFactory>,
}

impl LinkRegistry {
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register(DeviceKind::Spi, open_spi);
        registry.register(DeviceKind::I2c, open_i2c);
        registry.register(DeviceKind::Sdio, open_sdio);
        registry.register(DeviceKind::Socket, open_socket);
        registry
    }

    pub fn register(&mut self, kind: DeviceKind, factory: LinkFactory) {
        self.factories.insert(kind, factory);
    }

    pub fn open(&self, kind: DeviceKind, config: &SessionConfig, bus: usize) -> Result<Box<dyn ChipLink>> {
        let factory = self.factories.get(&kind).ok_or_else(|| {
            SeclinkError::ParameterInvalid(format!("no link factory registered for {kind:?}"))
        })?;
        factory(config, bus)
    }
}

fn open_spi(config: &SessionConfig, bus: usize) -> Result<Box<dyn ChipLink>> {
    let path = config.spi_devices.get(bus).ok_or_else(|| {
        SeclinkError::ParameterInvalid(format!("spi bus {bus} is not configured"))
    })?;
    Ok(Box::new(BusDevice::open(DeviceKind::Spi, path)?))
}

fn open_i2c(config: &SessionConfig, _bus: usize) -> Result<Box<dyn ChipLink>> {
    Ok(Box::new(BusDevice::open(DeviceKind::I2c, &config.i2c_device)?))
}

fn open_sdio(config: &SessionConfig, _bus: usize) -> Result<Box<dyn ChipLink>> {
    Ok(Box::new(BusDevice::open(DeviceKind::Sdio, &config.sdio_device)?))
}

fn open_socket(config: &SessionConfig, _bus: usize) -> Result<Box<dyn ChipLink>> {
    Ok(Box::new(ProxySocket::connect(
        &config.proxy_addr,
        config.connect_timeout(),
    )?))
}

/// An open session with the chip: one or more channels of a single
/// link kind, selected by `device` in the configuration.
///
/// SPI sessions get one channel per configured bus; every other kind
/// has exactly one channel.
pub struct Session {
    config: SessionConfig,
    channels: Vec<Channel>,
}

impl Session {
    /// Open a session using the default link factories.
    pub fn open(config: SessionConfig) -> Result<Self> {
        Self::open_with(config, &LinkRegistry::with_defaults())
    }

    /// Open a session with caller-supplied link factories.
    pub fn open_with(config: SessionConfig, registry: &LinkRegistry) -> Result<Self> {
        config.validate()?;

        let bus_count = match config.device {
            DeviceKind::Spi => config.spi_devices.len(),
            _ => 1,
        };

        let mut channels = Vec::with_capacity(bus_count);
        for bus in 0..bus_count {
            let link = registry.open(config.device, &config, bus)?;
            let lock = channel_lock(config.device, bus)?;
            let mut channel = Channel::new(config.device, link, lock)
                .with_lock_timeout(config.lock_timeout());
            if config.device.needs_ready_check() {
                channel = channel.with_ready(ready_check(&config)?);
            }
            channels.push(channel);
        }

        info!(
            device = ?config.device,
            channels = channels.len(),
            "session opened"
        );
        Ok(Self { config, channels })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_mut(&mut self, bus: usize) -> Result<&mut Channel> {
        let count = self.channels.len();
        self.channels.get_mut(bus).ok_or_else(|| {
            SeclinkError::ParameterInvalid(format!(
                "channel {bus} does not exist (session has {count})"
            ))
        })
    }

    /// One locked command/response exchange on channel `bus`.
    pub fn send_recv(&mut self, bus: usize, command: &Command) -> Result<Frame> {
        let timeout = self.config.response_timeout();
        let channel = self.channel_mut(bus)?;
        dispatch::send_recv(channel, command, timeout)
    }

    /// Build the reset controller matching this session's kind.
    ///
    /// Socket sessions get a remote-only controller (the proxy owns
    /// the physical lines); hardware sessions export the reset and
    /// wake-up pins locally.
    pub fn reset_controller(&self) -> Result<ResetController> {
        if self.config.device == DeviceKind::Socket {
            return Ok(ResetController::remote_only());
        }

        let reset_line = GpioLine::export_at(
            &self.config.gpio_base,
            self.config.reset_pin,
            Direction::Out,
        )?;
        let wakeup_line = GpioLine::export_at(
            &self.config.gpio_base,
            self.config.wakeup_pin,
            Direction::Out,
        )?;
        let ready = ready_check(&self.config)?;

        debug!(
            reset_pin = self.config.reset_pin,
            wakeup_pin = self.config.wakeup_pin,
            "reset controller lines exported"
        );
        let controller = ResetController::hardware(
            Box::new(reset_line),
            Box::new(wakeup_line),
            ready,
            control_lock(LockKey::Reset)?,
            control_lock(LockKey::Wakeup)?,
        )
        .with_pulse(self.config.reset_pulse())
        .with_lock_timeout(self.config.lock_timeout())
        .with_verify(self.config.auto_verify.clone());
        Ok(controller)
    }
}

fn ready_check(config: &SessionConfig) -> Result<ReadyCheck> {
    let mut line = GpioLine::export_at(&config.gpio_base, config.ready_pin, Direction::In)?;
    let gate = config.ready_gate();
    if gate.mode() == seclink_gpio::ReadyMode::Edge {
        line.set_edge(Edge::Both)?;
    }
    Ok(ReadyCheck {
        line: Box::new(line),
        gate,
        expected: config.ready_level(),
        timeout: config.ready_timeout(),
    })
}

#[cfg(unix)]
fn channel_lock(kind: DeviceKind, bus: usize) -> Result<Arc<dyn ChannelLock>> {
    let key = match (kind, bus) {
        (DeviceKind::Spi, 0) => LockKey::SpiBus0,
        (DeviceKind::Spi, 1) => LockKey::SpiBus1,
        (DeviceKind::Spi, n) => {
            return Err(SeclinkError::ParameterInvalid(format!(
                "no lock key for spi bus {n}"
            )))
        }
        (DeviceKind::I2c, _) => LockKey::I2cBus,
        (DeviceKind::Sdio, _) => LockKey::SdioBus,
        // The proxy serializes hardware access on its side; the local
        // lock only orders exchanges within this process.
        (DeviceKind::Socket, _) => {
            return Ok(Arc::new(LocalLock::new("socket")));
        }
    };
    Ok(Arc::new(SysvSemaphore::open(key)?))
}

#[cfg(not(unix))]
fn channel_lock(kind: DeviceKind, bus: usize) -> Result<Arc<dyn ChannelLock>> {
    let _ = bus;
    Ok(Arc::new(LocalLock::new(format!("{kind:?}").to_lowercase())))
}

#[cfg(unix)]
fn control_lock(key: LockKey) -> Result<Arc<dyn ChannelLock>> {
    Ok(Arc::new(SysvSemaphore::open(key)?))
}

#[cfg(not(unix))]
fn control_lock(key: LockKey) -> Result<Arc<dyn ChannelLock>> {
    Ok(Arc::new(LocalLock::new(key.name())))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use seclink_transport::{ResetRequest, TransportError};

    struct NullLink(DeviceKind);

    impl ChipLink for NullLink {
        fn kind(&self) -> DeviceKind {
            self.0
        }

        fn send(&mut self, _frame: &[u8]) -> seclink_transport::Result<()> {
            Ok(())
        }

        fn recv(&mut self, _max_len: usize, timeout: Duration) -> seclink_transport::Result<Bytes> {
            Err(TransportError::Timeout(timeout))
        }

        fn try_remote_reset(&mut self, _request: &ResetRequest<'_>) -> seclink_transport::Result<bool> {
            Ok(false)
        }
    }

    fn null_factory(_config: &SessionConfig, _bus: usize) -> Result<Box<dyn ChipLink>> {
        Ok(Box::new(NullLink(DeviceKind::Socket)))
    }

    #[test]
    fn socket_session_has_one_channel_and_no_ready_check() {
        let mut registry = LinkRegistry::with_defaults();
        registry.register(DeviceKind::Socket, null_factory);

        let config = SessionConfig {
            device: DeviceKind::Socket,
            ..SessionConfig::default()
        };
        let mut session = Session::open_with(config, &registry).unwrap();
        assert_eq!(session.channel_count(), 1);
        let channel = session.channel_mut(0).unwrap();
        assert!(channel.ready.is_none());
        assert_eq!(channel.kind(), DeviceKind::Socket);
    }

    #[test]
    fn out_of_range_channel_is_an_error() {
        let mut registry = LinkRegistry::with_defaults();
        registry.register(DeviceKind::Socket, null_factory);

        let config = SessionConfig {
            device: DeviceKind::Socket,
            ..SessionConfig::default()
        };
        let mut session = Session::open_with(config, &registry).unwrap();
        let err = session.channel_mut(3).unwrap_err();
        assert!(matches!(err, SeclinkError::ParameterInvalid(_)));
    }

    #[test]
    fn unregistered_kind_is_reported() {
        let registry = LinkRegistry {
            factories: HashMap::new(),
        };
        let config = SessionConfig::default();
        let err = registry.open(DeviceKind::Spi, &config, 0).unwrap_err();
        assert!(matches!(err, SeclinkError::ParameterInvalid(_)));
    }

    #[test]
    fn spi_factory_rejects_unconfigured_bus() {
        let config = SessionConfig::default();
        let err = open_spi(&config, 1).unwrap_err();
        assert!(matches!(err, SeclinkError::ParameterInvalid(_)));
    }
}
