use std::io::ErrorKind;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{LockError, Result};
use crate::keys::LockKey;
use crate::{ChannelLock, LockGuard};

// libc does not declare `semtimedop` for gnu targets; glibc exports it.
extern "C" {
    fn semtimedop(
        semid: libc::c_int,
        sops: *mut libc::sembuf,
        nsops: libc::size_t,
        timeout: *const libc::timespec,
    ) -> libc::c_int;
}

/// A cross-process channel lock backed by a named System V semaphore.
///
/// The semaphore is created with value 1 on first open; `acquire`
/// decrements it with `SEM_UNDO`, so if the holding process dies the
/// kernel restores the value and other processes are not starved.
/// Fairness among waiters is whatever the kernel provides —
/// best-effort, not FIFO.
pub struct SysvSemaphore {
    name: String,
    semid: libc::c_int,
}

impl SysvSemaphore {
    /// Open (creating and initializing if needed) the semaphore for a
    /// well-known channel key.
    pub fn open(key: LockKey) -> Result<Self> {
        Self::open_raw(key.key(), key.name())
    }

    /// Open by raw key. Tests use process-unique keys to avoid
    /// colliding with real deployments.
    pub fn open_raw(key: i32, name: &str) -> Result<Self> {
        // Exclusive create first so exactly one process initializes the
        // value; losers of the race attach to the existing semaphore.
        // SAFETY: plain syscalls on integer arguments.
        let semid = unsafe { libc::semget(key, 1, libc::IPC_CREAT | libc::IPC_EXCL | 0o666) };
        if semid >= 0 {
            let rc = unsafe { libc::semctl(semid, 0, libc::SETVAL, 1) };
            if rc < 0 {
                return Err(failure(name, std::io::Error::last_os_error()));
            }
            debug!(name, key, semid, "created channel semaphore");
            return Ok(Self {
                name: name.to_string(),
                semid,
            });
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EEXIST) {
            return Err(failure(name, err));
        }

        let semid = unsafe { libc::semget(key, 1, 0o666) };
        if semid < 0 {
            return Err(failure(name, std::io::Error::last_os_error()));
        }
        trace!(name, key, semid, "attached to existing channel semaphore");
        Ok(Self {
            name: name.to_string(),
            semid,
        })
    }

    /// Remove the semaphore from the system. Used by teardown paths
    /// and tests; normal shutdown leaves it for the other processes.
    pub fn remove(self) -> Result<()> {
        // SAFETY: semid refers to a semaphore this handle opened.
        let rc = unsafe { libc::semctl(self.semid, 0, libc::IPC_RMID) };
        if rc < 0 {
            return Err(failure(&self.name, std::io::Error::last_os_error()));
        }
        Ok(())
    }

    fn op(&self, delta: i16, timeout: Option<Duration>) -> std::io::Result<bool> {
        let mut op = libc::sembuf {
            sem_num: 0,
            sem_op: delta,
            sem_flg: libc::SEM_UNDO as libc::c_short,
        };

        match timeout {
            None => {
                // SAFETY: op points to one valid sembuf.
                let rc = unsafe { libc::semop(self.semid, &mut op, 1) };
                if rc < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(true)
            }
            Some(timeout) => {
                let ts = libc::timespec {
                    tv_sec: timeout.as_secs() as libc::time_t,
                    tv_nsec: timeout.subsec_nanos() as libc::c_long,
                };
                // SAFETY: op and ts point to valid structures for the
                // duration of the call.
                let rc = unsafe { semtimedop(self.semid, &mut op, 1, &ts) };
                if rc < 0 {
                    let err = std::io::Error::last_os_error();
                    if err.raw_os_error() == Some(libc::EAGAIN) {
                        return Ok(false);
                    }
                    return Err(err);
                }
                Ok(true)
            }
        }
    }
}

impl ChannelLock for SysvSemaphore {
    fn acquire(&self, timeout: Duration) -> Result<LockGuard<'_>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .unwrap_or(Duration::ZERO);
            if remaining.is_zero() {
                return Err(LockError::LockTimeout {
                    name: self.name.clone(),
                    timeout,
                });
            }

            match self.op(-1, Some(remaining)) {
                Ok(true) => {
                    trace!(name = %self.name, "channel lock acquired");
                    return Ok(LockGuard::new(self));
                }
                Ok(false) => {
                    return Err(LockError::LockTimeout {
                        name: self.name.clone(),
                        timeout,
                    })
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(failure(&self.name, err)),
            }
        }
    }

    fn release(&self) {
        if let Err(err) = self.op(1, None) {
            // Nothing actionable mid-drop; the SEM_UNDO adjustment
            // still protects other processes.
            debug!(name = %self.name, %err, "semaphore release failed");
        }
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

fn failure(name: &str, source: std::io::Error) -> LockError {
    LockError::LockFailure {
        name: name.to_string(),
        source,
    }
}
