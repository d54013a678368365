use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{LockError, Result};
use crate::{ChannelLock, LockGuard};

/// In-process channel lock: a timed mutex built from a condvar.
///
/// Used by tests and by deployments where a single process owns the
/// chip; it honors the same acquire/timeout contract as the
/// cross-process semaphore.
pub struct LocalLock {
    name: String,
    held: Mutex<bool>,
    freed: Condvar,
}

impl LocalLock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            held: Mutex::new(false),
            freed: Condvar::new(),
        }
    }
}

impl ChannelLock for LocalLock {
    fn acquire(&self, timeout: Duration) -> Result<LockGuard<'_>> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock().map_err(|_| poisoned(&self.name))?;
        while *held {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) if !d.is_zero() => d,
                _ => {
                    return Err(LockError::LockTimeout {
                        name: self.name.clone(),
                        timeout,
                    })
                }
            };
            let (guard, wait) = self
                .freed
                .wait_timeout(held, remaining)
                .map_err(|_| poisoned(&self.name))?;
            held = guard;
            if wait.timed_out() && *held {
                return Err(LockError::LockTimeout {
                    name: self.name.clone(),
                    timeout,
                });
            }
        }
        *held = true;
        Ok(LockGuard::new(self))
    }

    fn release(&self) {
        if let Ok(mut held) = self.held.lock() {
            *held = false;
            self.freed.notify_one();
        }
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

fn poisoned(name: &str) -> LockError {
    LockError::LockFailure {
        name: name.to_string(),
        source: std::io::Error::other("lock poisoned"),
    }
}
