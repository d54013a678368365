use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::{ChipLink, DeviceKind};

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// A kernel character-device link (SPI, I²C or SDIO).
///
/// `write` performs one bus transfer; `recv` waits for readability via
/// `poll(2)` and accumulates bytes until the response's declared
/// length is satisfied or the timeout expires.
#[derive(Debug)]
pub struct BusDevice {
    kind: DeviceKind,
    file: File,
    path: PathBuf,
}

impl BusDevice {
    /// Open the device node for `kind` at `path`.
    pub fn open(kind: DeviceKind, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| TransportError::Open {
                path: path.clone(),
                source: e,
            })?;
        debug!(?path, ?kind, "opened bus device");
        Ok(Self { kind, file, path })
    }

    /// Wrap an already-open handle. Used by tests to drive the link
    /// over a socketpair instead of real hardware.
    pub fn from_file(kind: DeviceKind, file: File) -> Self {
        Self {
            kind,
            file,
            path: PathBuf::new(),
        }
    }

    /// The device node this link was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChipLink for BusDevice {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < frame.len() {
            match self.file.write(&frame[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        trace!(len = frame.len(), kind = ?self.kind, "bus transfer out");
        Ok(())
    }

    fn recv(&mut self, max_len: usize, timeout: Duration) -> Result<Bytes> {
        let deadline = Instant::now() + timeout;
        let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);

        loop {
            if let Some(total) = declared_total(&buf) {
                if buf.len() >= total || buf.len() >= max_len {
                    trace!(len = buf.len(), kind = ?self.kind, "bus transfer in");
                    return Ok(buf.freeze());
                }
            }

            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or(TransportError::Timeout(timeout))?;
            if !wait_readable(self.file.as_raw_fd(), remaining)? {
                return Err(TransportError::Timeout(timeout));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let want = chunk.len().min(max_len.saturating_sub(buf.len()).max(1));
            let read = match self.file.read(&mut chunk[..want]) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            };
            if read == 0 {
                return Err(TransportError::Closed);
            }
            buf.put_slice(&chunk[..read]);
        }
    }
}

/// Both wire formats open with a 16-bit big-endian total length.
pub(crate) fn declared_total(buf: &[u8]) -> Option<usize> {
    if buf.len() < 2 {
        return None;
    }
    Some(u16::from_be_bytes([buf[0], buf[1]]) as usize)
}

/// Block until `fd` is readable or `timeout` elapses.
///
/// Returns `Ok(false)` on a clean timeout (including `EINTR`, which the
/// surrounding deadline loop absorbs).
#[cfg(unix)]
fn wait_readable(fd: i32, timeout: Duration) -> Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = timeout.as_millis().min(i32::MAX as u128) as i32;

    // SAFETY: pfd points to one valid pollfd for the duration of the call.
    let rc = unsafe { libc::poll(&mut pfd, 1, millis.max(1)) };
    match rc {
        0 => Ok(false),
        n if n < 0 => {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                Ok(false)
            } else {
                Err(TransportError::Io(err))
            }
        }
        _ => Ok(true),
    }
}
