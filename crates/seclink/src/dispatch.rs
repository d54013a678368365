use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{Result, SeclinkError};
use crate::session::Channel;
use seclink_frame::{decode_frame, encode_frame, Frame};
use seclink_gpio::ReadyOutcome;

/// One chip command: instruction byte, two parameter bytes and a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub instruction: u8,
    pub param1: u8,
    pub param2: u8,
    pub body: Vec<u8>,
}

impl Command {
    pub fn new(instruction: u8, param1: u8, param2: u8, body: impl Into<Vec<u8>>) -> Self {
        Self {
            instruction,
            param1,
            param2,
            body: body.into(),
        }
    }
}

/// One complete locked exchange with the chip.
///
/// The channel lock is held for the whole sequence — ready check,
/// send, receive — and released on every exit path when the guard
/// drops. A write from another process between our write and read
/// would desynchronize the bus; the lock is what prevents it.
pub fn send_recv(channel: &mut Channel, command: &Command, timeout: Duration) -> Result<Frame> {
    let _guard = channel.lock.acquire(channel.lock_timeout)?;
    trace!(
        lock = %channel.lock.name(),
        ins = command.instruction,
        "channel lock acquired for exchange"
    );

    if let Some(ready) = channel.ready.as_mut() {
        match ready
            .gate
            .wait_ready(ready.line.as_mut(), ready.timeout, ready.expected)?
        {
            ReadyOutcome::Expected => {}
            ReadyOutcome::TimedOut => {
                debug!(waited = ?ready.timeout, "ready line never asserted");
                return Err(SeclinkError::ChipBusy {
                    waited: ready.timeout,
                });
            }
        }
    }

    let wire = encode_frame(
        command.instruction,
        command.param1,
        command.param2,
        &command.body,
        channel.kind.max_body(),
    )?;
    channel.link.send(&wire)?;

    let raw = channel.link.recv(channel.kind.max_message(), timeout)?;
    let frame = decode_frame(&raw, channel.kind.max_body())?;
    trace!(
        ins = frame.instruction,
        rc = frame.return_code,
        body_len = frame.body.len(),
        "exchange complete"
    );
    Ok(frame)
}
