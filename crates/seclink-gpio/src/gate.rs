use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::Result;
use crate::line::{DigitalLine, Level};

/// Default polling attempt budget, from the vendor protocol.
pub const DEFAULT_POLL_ATTEMPTS: u32 = 100;
/// Default delay between polling attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Default overall ready-check budget.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// How the gate observes the ready line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyMode {
    /// Sample the line repeatedly with a short delay.
    Poll,
    /// Sleep on an edge notification.
    Edge,
}

/// Result of a ready wait. I/O failures surface as `Err(GpioError)`
/// instead — a clean timeout and a broken line are different things.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// The line reached the expected level in time.
    Expected,
    /// The budget ran out first.
    TimedOut,
}

/// Waits for the chip to signal readiness on a [`DigitalLine`].
#[derive(Debug, Clone)]
pub struct ReadyGate {
    mode: ReadyMode,
    attempts: u32,
    interval: Duration,
}

impl ReadyGate {
    /// Polling gate with the protocol's default attempt budget.
    pub fn polling() -> Self {
        Self {
            mode: ReadyMode::Poll,
            attempts: DEFAULT_POLL_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Edge-notification gate.
    pub fn edge_triggered() -> Self {
        Self {
            mode: ReadyMode::Edge,
            attempts: 0,
            interval: Duration::ZERO,
        }
    }

    /// Polling gate with an explicit budget. Mostly for tests and
    /// unusual board timings.
    pub fn polling_with(attempts: u32, interval: Duration) -> Self {
        Self {
            mode: ReadyMode::Poll,
            attempts,
            interval,
        }
    }

    pub fn mode(&self) -> ReadyMode {
        self.mode
    }

    /// Wait until `line` reads `expected`, bounded by `timeout` (and,
    /// in polling mode, by the attempt budget — whichever runs out
    /// first).
    pub fn wait_ready(
        &self,
        line: &mut dyn DigitalLine,
        timeout: Duration,
        expected: Level,
    ) -> Result<ReadyOutcome> {
        match self.mode {
            ReadyMode::Poll => self.wait_polling(line, timeout, expected),
            ReadyMode::Edge => self.wait_edge(line, timeout, expected),
        }
    }

    fn wait_polling(
        &self,
        line: &mut dyn DigitalLine,
        timeout: Duration,
        expected: Level,
    ) -> Result<ReadyOutcome> {
        let deadline = Instant::now() + timeout;
        for attempt in 0..self.attempts.max(1) {
            if line.level()? == expected {
                trace!(attempt, "ready line reached expected level");
                return Ok(ReadyOutcome::Expected);
            }
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) if !d.is_zero() => d,
                _ => return Ok(ReadyOutcome::TimedOut),
            };
            std::thread::sleep(self.interval.min(remaining));
        }
        Ok(ReadyOutcome::TimedOut)
    }

    fn wait_edge(
        &self,
        line: &mut dyn DigitalLine,
        timeout: Duration,
        expected: Level,
    ) -> Result<ReadyOutcome> {
        // The chip may already be ready; a level check avoids waiting
        // for an edge that fired before we started listening.
        if line.level()? == expected {
            return Ok(ReadyOutcome::Expected);
        }
        if line.wait_edge(timeout, expected)? {
            Ok(ReadyOutcome::Expected)
        } else {
            Ok(ReadyOutcome::TimedOut)
        }
    }
}
