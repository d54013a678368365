//! GPIO lines and chip readiness signaling.
//!
//! The chip raises a dedicated pin when it is able to accept a command
//! or has produced a response. [`GpioLine`] is a thin handle over one
//! exported sysfs pin; [`ReadyGate`] waits on such a line — by polling
//! or by edge notification — bounded by a timeout.

pub mod error;
pub mod gate;
pub mod line;

pub use error::{GpioError, Result};
pub use gate::{ReadyGate, ReadyMode, ReadyOutcome, DEFAULT_READY_TIMEOUT};
pub use line::{DigitalLine, Direction, Edge, GpioLine, Level, OutputLine};
