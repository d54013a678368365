//! Cross-process mutual exclusion for chip channels.
//!
//! The chip is a single physical device shared by every process on the
//! box, and the command/response protocol is stateful: a write from
//! one process interleaved between another's write and read would
//! desynchronize the bus. Each channel therefore has one well-known
//! lock held for the *whole* transaction.
//!
//! Two implementations sit behind [`ChannelLock`]:
//! - [`SysvSemaphore`] — a named System V semaphore with `SEM_UNDO`,
//!   so the kernel rolls the lock back if its holder crashes.
//! - [`LocalLock`] — an in-process timed mutex for tests and
//!   single-process deployments.

pub mod error;
pub mod keys;
pub mod local;
#[cfg(unix)]
pub mod sysv;

pub use error::{LockError, Result};
pub use keys::LockKey;
pub use local::LocalLock;
#[cfg(unix)]
pub use sysv::SysvSemaphore;

use std::time::Duration;

/// A named lock guarding one physical channel across all processes.
///
/// `acquire` blocks up to `timeout`; the returned [`LockGuard`]
/// releases on drop, so every exit path of a transaction — success,
/// error or timeout — gives the lock back.
pub trait ChannelLock: Send + Sync {
    fn acquire(&self, timeout: Duration) -> Result<LockGuard<'_>>;

    /// Release the lock. Called by [`LockGuard::drop`]; not for direct
    /// use.
    fn release(&self);

    /// Human-readable identity for logs.
    fn name(&self) -> String;
}

/// A held channel lock, released on drop.
#[must_use = "dropping the guard releases the channel lock"]
pub struct LockGuard<'a> {
    lock: &'a dyn ChannelLock,
}

impl<'a> LockGuard<'a> {
    /// Only lock implementations construct guards.
    pub fn new(lock: &'a dyn ChannelLock) -> Self {
        Self { lock }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl std::fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock", &self.lock.name())
            .finish()
    }
}
