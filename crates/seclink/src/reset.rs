use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{self, PinVerify};
use crate::dispatch::{self, Command};
use crate::error::{Result, SeclinkError};
use crate::session::{Channel, ReadyCheck};
use seclink_gpio::{Level, OutputLine, ReadyOutcome};
use seclink_lock::ChannelLock;
use seclink_transport::{ResetRequest, TransportError};

const DEFAULT_PULSE: Duration = Duration::from_millis(10);
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Vendor reset mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Reset and install the accompanying PIN as the global PIN.
    UpdateGlobalPin,
    /// Plain reset; any PIN is only verified afterwards.
    Plain,
}

impl ResetMode {
    pub fn selector(self) -> u8 {
        match self {
            ResetMode::UpdateGlobalPin => 0,
            ResetMode::Plain => 1,
        }
    }
}

/// The physical half of the controller: output lines plus the ready
/// line that confirms the chip came back.
struct HardwareLines {
    reset_line: Box<dyn OutputLine>,
    wakeup_line: Box<dyn OutputLine>,
    ready: ReadyCheck,
}

/// Drives the chip's reset and wake-up lines.
///
/// Reset is attempted remotely first — a proxy link confirms the reset
/// on the far side and nothing is pulsed locally. On hardware links
/// the reset line is pulsed low, the ready line awaited, and any
/// configured PIN verified through a normal dispatch exchange. A ready
/// timeout here is fatal: the caller never gets to run a transaction
/// against a chip that did not come back.
pub struct ResetController {
    hw: Option<HardwareLines>,
    reset_lock: Option<Arc<dyn ChannelLock>>,
    wakeup_lock: Option<Arc<dyn ChannelLock>>,
    lock_timeout: Duration,
    pulse: Duration,
    verify: Option<PinVerify>,
}

impl ResetController {
    /// Controller for direct-hardware sessions.
    pub fn hardware(
        reset_line: Box<dyn OutputLine>,
        wakeup_line: Box<dyn OutputLine>,
        ready: ReadyCheck,
        reset_lock: Arc<dyn ChannelLock>,
        wakeup_lock: Arc<dyn ChannelLock>,
    ) -> Self {
        Self {
            hw: Some(HardwareLines {
                reset_line,
                wakeup_line,
                ready,
            }),
            reset_lock: Some(reset_lock),
            wakeup_lock: Some(wakeup_lock),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            pulse: DEFAULT_PULSE,
            verify: None,
        }
    }

    /// Controller for socket sessions, where the proxy owns the lines.
    pub fn remote_only() -> Self {
        Self {
            hw: None,
            reset_lock: None,
            wakeup_lock: None,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            pulse: DEFAULT_PULSE,
            verify: None,
        }
    }

    pub fn with_pulse(mut self, pulse: Duration) -> Self {
        self.pulse = pulse;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_verify(mut self, verify: Option<PinVerify>) -> Self {
        self.verify = verify;
        self
    }

    /// Reset the chip behind `channel`.
    ///
    /// An explicit `pin` overrides the configured auto-verify PIN. In
    /// [`ResetMode::UpdateGlobalPin`] the PIN travels with the reset
    /// itself; in [`ResetMode::Plain`] it is verified afterwards.
    pub fn reset(
        &mut self,
        channel: &mut Channel,
        mode: ResetMode,
        pin: Option<&str>,
    ) -> Result<()> {
        if let Some(pin) = pin {
            config::validate_pin(pin)?;
        }

        let _guard = match &self.reset_lock {
            Some(lock) => Some(lock.acquire(self.lock_timeout)?),
            None => None,
        };

        let request = ResetRequest {
            mode: mode.selector(),
            need_pin: pin.is_some(),
            pin,
        };
        if channel.link_mut().try_remote_reset(&request)? {
            info!(?mode, "chip reset confirmed by proxy");
            return Ok(());
        }

        let hw = self.hw.as_mut().ok_or_else(|| {
            SeclinkError::Transport(TransportError::NotSupported(channel.kind()))
        })?;

        debug!(pulse = ?self.pulse, "pulsing reset line");
        hw.reset_line.drive(Level::Low)?;
        std::thread::sleep(self.pulse);
        hw.reset_line.drive(Level::High)?;

        Self::await_ready(&mut hw.ready)?;
        info!(?mode, "chip reset complete");

        let verify = match (pin, &self.verify) {
            (Some(pin), _) => Some((self.verify_instruction(), pin.to_string())),
            (None, Some(configured)) => {
                Some((configured.instruction, configured.pin.clone()))
            }
            (None, None) => None,
        };
        if let Some((instruction, pin)) = verify {
            self.verify_pin(channel, instruction, &pin)?;
        }
        Ok(())
    }

    /// Wake the chip from low-power state and wait for it to report
    /// ready.
    pub fn wakeup(&mut self) -> Result<()> {
        let hw = self.hw.as_mut().ok_or_else(|| {
            SeclinkError::ParameterInvalid(
                "wakeup requires local control lines".to_string(),
            )
        })?;

        let _guard = match &self.wakeup_lock {
            Some(lock) => Some(lock.acquire(self.lock_timeout)?),
            None => None,
        };

        debug!(pulse = ?self.pulse, "pulsing wakeup line");
        hw.wakeup_line.drive(Level::High)?;
        std::thread::sleep(self.pulse);
        hw.wakeup_line.drive(Level::Low)?;

        Self::await_ready(&mut hw.ready)?;
        info!("chip awake");
        Ok(())
    }

    fn await_ready(ready: &mut ReadyCheck) -> Result<()> {
        match ready
            .gate
            .wait_ready(ready.line.as_mut(), ready.timeout, ready.expected)?
        {
            ReadyOutcome::Expected => Ok(()),
            ReadyOutcome::TimedOut => Err(SeclinkError::ChipBusy {
                waited: ready.timeout,
            }),
        }
    }

    fn verify_instruction(&self) -> u8 {
        // An explicit PIN without configured verification still needs
        // an instruction byte; fall back to the configured one.
        self.verify
            .as_ref()
            .map(|v| v.instruction)
            .unwrap_or(PIN_VERIFY_FALLBACK_INS)
    }

    fn verify_pin(&self, channel: &mut Channel, instruction: u8, pin: &str) -> Result<()> {
        let command = Command::new(instruction, 0, 0, pin.as_bytes());
        let frame = dispatch::send_recv(channel, &command, VERIFY_TIMEOUT)?;
        if frame.return_code != 0 {
            return Err(SeclinkError::Transport(TransportError::CommFailure(
                frame.return_code,
            )));
        }
        debug!("pin verified after reset");
        Ok(())
    }
}

/// Reference-board PIN verification instruction, used only when no
/// `auto_verify` block overrides it.
const PIN_VERIFY_FALLBACK_INS: u8 = 0x20;

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;

    use super::*;
    use seclink_frame::{decode_frame, encode_frame, MAX_BODY_LEN};
    use seclink_gpio::{DigitalLine, ReadyGate};
    use seclink_lock::LocalLock;
    use seclink_transport::{ChipLink, DeviceKind};

    struct RecordedOutput {
        levels: Arc<Mutex<Vec<Level>>>,
    }

    impl RecordedOutput {
        fn new() -> (Self, Arc<Mutex<Vec<Level>>>) {
            let levels = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    levels: Arc::clone(&levels),
                },
                levels,
            )
        }
    }

    impl OutputLine for RecordedOutput {
        fn drive(&mut self, level: Level) -> seclink_gpio::Result<()> {
            self.levels.lock().unwrap().push(level);
            Ok(())
        }
    }

    struct StuckLine(Level);

    impl DigitalLine for StuckLine {
        fn level(&mut self) -> seclink_gpio::Result<Level> {
            Ok(self.0)
        }

        fn wait_edge(&mut self, _t: Duration, _e: Level) -> seclink_gpio::Result<bool> {
            Ok(false)
        }
    }

    struct MockLink {
        remote_reset: bool,
        resets: Arc<Mutex<Vec<(u8, bool, Option<String>)>>>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        response: Option<Bytes>,
    }

    impl MockLink {
        fn hardware() -> Self {
            Self {
                remote_reset: false,
                resets: Arc::new(Mutex::new(Vec::new())),
                sent: Arc::new(Mutex::new(Vec::new())),
                response: None,
            }
        }

        fn proxy() -> Self {
            Self {
                remote_reset: true,
                ..Self::hardware()
            }
        }

        fn with_response(mut self, response: Bytes) -> Self {
            self.response = Some(response);
            self
        }
    }

    impl ChipLink for MockLink {
        fn kind(&self) -> DeviceKind {
            if self.remote_reset {
                DeviceKind::Socket
            } else {
                DeviceKind::Spi
            }
        }

        fn send(&mut self, frame: &[u8]) -> seclink_transport::Result<()> {
            self.sent.lock().unwrap().push(frame.to_vec());
            Ok(())
        }

        fn recv(&mut self, _max_len: usize, timeout: Duration) -> seclink_transport::Result<Bytes> {
            match &self.response {
                Some(bytes) => Ok(bytes.clone()),
                None => Err(TransportError::Timeout(timeout)),
            }
        }

        fn try_remote_reset(
            &mut self,
            request: &ResetRequest<'_>,
        ) -> seclink_transport::Result<bool> {
            self.resets.lock().unwrap().push((
                request.mode,
                request.need_pin,
                request.pin.map(str::to_string),
            ));
            Ok(self.remote_reset)
        }
    }

    fn ready(level: Level) -> ReadyCheck {
        ReadyCheck {
            line: Box::new(StuckLine(level)),
            gate: ReadyGate::polling_with(3, Duration::from_millis(1)),
            expected: Level::High,
            timeout: Duration::from_millis(20),
        }
    }

    fn controller(ready_level: Level) -> (ResetController, Arc<Mutex<Vec<Level>>>, Arc<Mutex<Vec<Level>>>) {
        let (reset_line, reset_levels) = RecordedOutput::new();
        let (wakeup_line, wakeup_levels) = RecordedOutput::new();
        let controller = ResetController::hardware(
            Box::new(reset_line),
            Box::new(wakeup_line),
            ready(ready_level),
            Arc::new(LocalLock::new("reset")),
            Arc::new(LocalLock::new("wakeup")),
        )
        .with_pulse(Duration::from_millis(1));
        (controller, reset_levels, wakeup_levels)
    }

    fn hardware_channel(link: MockLink) -> Channel {
        Channel::new(
            DeviceKind::Spi,
            Box::new(link),
            Arc::new(LocalLock::new("spi0")),
        )
    }

    #[test]
    fn hardware_reset_pulses_low_then_high() {
        let (mut controller, reset_levels, _) = controller(Level::High);
        let mut channel = hardware_channel(MockLink::hardware());

        controller
            .reset(&mut channel, ResetMode::Plain, None)
            .unwrap();
        assert_eq!(*reset_levels.lock().unwrap(), vec![Level::Low, Level::High]);
    }

    #[test]
    fn ready_timeout_fails_the_reset() {
        let (mut controller, _, _) = controller(Level::Low);
        let link = MockLink::hardware();
        let sent = Arc::clone(&link.sent);
        let mut channel = hardware_channel(link);

        let err = controller
            .reset(&mut channel, ResetMode::Plain, None)
            .unwrap_err();
        assert!(matches!(err, SeclinkError::ChipBusy { .. }));
        // No transaction may follow a failed reset.
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn proxy_reset_skips_the_lines() {
        let (mut controller, reset_levels, _) = controller(Level::High);
        let link = MockLink::proxy();
        let resets = Arc::clone(&link.resets);
        let mut channel = Channel::new(
            DeviceKind::Socket,
            Box::new(link),
            Arc::new(LocalLock::new("socket")),
        );

        controller
            .reset(&mut channel, ResetMode::UpdateGlobalPin, Some("123456"))
            .unwrap();
        assert!(reset_levels.lock().unwrap().is_empty());
        assert_eq!(
            *resets.lock().unwrap(),
            vec![(0, true, Some("123456".to_string()))]
        );
    }

    #[test]
    fn explicit_pin_is_verified_after_hardware_reset() {
        let (mut controller, _, _) = controller(Level::High);
        let ok = encode_frame(0x20, 0, 0, &[], MAX_BODY_LEN).unwrap().freeze();
        let link = MockLink::hardware().with_response(ok);
        let sent = Arc::clone(&link.sent);
        let mut channel = hardware_channel(link);

        controller
            .reset(&mut channel, ResetMode::Plain, Some("654321"))
            .unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let request = decode_frame(&sent[0], MAX_BODY_LEN).unwrap();
        assert_eq!(request.instruction, PIN_VERIFY_FALLBACK_INS);
        assert_eq!(request.body.as_ref(), b"654321");
    }

    #[test]
    fn rejected_pin_fails_the_reset() {
        let (mut controller, _, _) = controller(Level::High);
        let mut refused = encode_frame(0x20, 0, 0, &[], MAX_BODY_LEN).unwrap();
        refused[7] = 0x63; // non-zero return code
        // Re-stamp the checksum the encoder wrote for rc = 0.
        let crc = seclink_frame::crc16_ccitt_false(
            &[&refused[..2], &refused[4..]].concat(),
        );
        refused[2..4].copy_from_slice(&crc.to_be_bytes());

        let link = MockLink::hardware().with_response(refused.freeze());
        let mut channel = hardware_channel(link);

        let err = controller
            .reset(&mut channel, ResetMode::Plain, Some("654321"))
            .unwrap_err();
        assert!(matches!(
            err,
            SeclinkError::Transport(TransportError::CommFailure(0x63))
        ));
    }

    #[test]
    fn malformed_pin_never_reaches_the_chip() {
        let (mut controller, reset_levels, _) = controller(Level::High);
        let mut channel = hardware_channel(MockLink::hardware());

        let err = controller
            .reset(&mut channel, ResetMode::Plain, Some("12"))
            .unwrap_err();
        assert!(matches!(err, SeclinkError::ParameterInvalid(_)));
        assert!(reset_levels.lock().unwrap().is_empty());
    }

    #[test]
    fn wakeup_pulses_high_then_low_and_awaits_ready() {
        let (mut controller, _, wakeup_levels) = controller(Level::High);
        controller.wakeup().unwrap();
        assert_eq!(
            *wakeup_levels.lock().unwrap(),
            vec![Level::High, Level::Low]
        );
    }

    #[test]
    fn wakeup_reports_a_chip_that_never_wakes() {
        let (mut controller, _, _) = controller(Level::Low);
        let err = controller.wakeup().unwrap_err();
        assert!(matches!(err, SeclinkError::ChipBusy { .. }));
    }

    #[test]
    fn configured_auto_verify_runs_without_an_explicit_pin() {
        let (mut controller, _, _) = controller(Level::High);
        let ok = encode_frame(0x31, 0, 0, &[], MAX_BODY_LEN).unwrap().freeze();
        let link = MockLink::hardware().with_response(ok);
        let sent = Arc::clone(&link.sent);
        let mut channel = hardware_channel(link);

        controller = controller.with_verify(Some(PinVerify {
            instruction: 0x31,
            pin: "987654".to_string(),
        }));
        controller
            .reset(&mut channel, ResetMode::Plain, None)
            .unwrap();

        let sent = sent.lock().unwrap();
        let request = decode_frame(&sent[0], MAX_BODY_LEN).unwrap();
        assert_eq!(request.instruction, 0x31);
        assert_eq!(request.body.as_ref(), b"987654");
    }
}
