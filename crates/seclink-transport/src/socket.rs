use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::bus::declared_total;
use crate::error::{Result, TransportError};
use crate::traits::{ChipLink, DeviceKind, ResetRequest};
use seclink_frame::{
    decode_envelope, encode_envelope, MessageId, ServerEnvelope, PROXY_RESET_WAIT,
};

// Chip/proxy return codes that mean "try again later" rather than a
// broken link.
const RC_CHIP_BUSY: u8 = 0xF6;
const RC_SOCKET_BUSY: u8 = 0xFC;

/// TCP link to the proxy process that owns the real chip connection.
///
/// Business frames travel inside [`ServerEnvelope`]s; reset, lock and
/// heartbeat control messages use their own envelope ids. The proxy
/// multiplexes several clients, so per-exchange exclusivity is still
/// the channel lock's job on this side.
#[derive(Debug)]
pub struct ProxySocket {
    stream: TcpStream,
    addr: String,
}

impl ProxySocket {
    /// Connect to the proxy at `addr` within `timeout`.
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let resolved = addr
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect {
                addr: addr.to_string(),
                source: e,
            })?
            .next()
            .ok_or_else(|| TransportError::Connect {
                addr: addr.to_string(),
                source: std::io::Error::new(ErrorKind::NotFound, "address did not resolve"),
            })?;

        let stream =
            TcpStream::connect_timeout(&resolved, timeout).map_err(|e| TransportError::Connect {
                addr: addr.to_string(),
                source: e,
            })?;
        stream.set_nodelay(true).map_err(TransportError::Io)?;
        debug!(%addr, "connected to chip proxy");
        Ok(Self {
            stream,
            addr: addr.to_string(),
        })
    }

    /// Wrap an already-connected stream. Used by tests.
    pub fn from_stream(stream: TcpStream, addr: impl Into<String>) -> Self {
        Self {
            stream,
            addr: addr.into(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// One envelope request/response exchange. `wait` bounds how long
    /// the proxy may take to service the request.
    pub fn exchange(
        &mut self,
        id: MessageId,
        param1: u8,
        param2: u8,
        body: &[u8],
        wait: Duration,
    ) -> Result<ServerEnvelope> {
        let request = encode_envelope(id, param1, param2, body)?;
        self.write_all_retrying(&request)?;
        let raw = self.read_envelope(wait)?;
        let envelope = decode_envelope(&raw)?;
        trace!(id = ?envelope.id, rc = envelope.return_code, "proxy exchange complete");
        Ok(envelope)
    }

    /// Keep the proxy connection alive. Callers invoke this on their
    /// own schedule; there is no internal timer thread.
    pub fn heartbeat(&mut self, wait: Duration) -> Result<()> {
        let envelope = self.exchange(MessageId::Heartbeat, 0, 0, &[], wait)?;
        if envelope.return_code != 0 {
            warn!(rc = envelope.return_code, "proxy heartbeat rejected");
            return Err(TransportError::CommFailure(envelope.return_code));
        }
        Ok(())
    }

    fn write_all_retrying(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.stream.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }

    fn read_envelope(&mut self, wait: Duration) -> Result<Bytes> {
        let deadline = Instant::now() + wait;
        self.stream
            .set_read_timeout(Some(wait))
            .map_err(TransportError::Io)?;

        let mut buf = BytesMut::with_capacity(512);
        let mut chunk = [0u8; 2048];
        loop {
            if let Some(total) = declared_total(&buf) {
                if buf.len() >= total {
                    return Ok(buf.freeze());
                }
            }
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout(wait));
            }

            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Err(TransportError::Timeout(wait));
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl ChipLink for ProxySocket {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Socket
    }

    /// Wrap the chip frame in a Business envelope and hand it to the
    /// proxy. The response is unwrapped by `recv`.
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        let request = encode_envelope(MessageId::Business, 0, 0, frame)?;
        self.write_all_retrying(&request)
    }

    fn recv(&mut self, _max_len: usize, timeout: Duration) -> Result<Bytes> {
        let raw = self.read_envelope(timeout)?;
        let envelope = decode_envelope(&raw)?;
        match envelope.return_code {
            0 => Ok(envelope.body),
            rc @ (RC_CHIP_BUSY | RC_SOCKET_BUSY) => Err(TransportError::DeviceBusy(rc)),
            rc => Err(TransportError::CommFailure(rc)),
        }
    }

    fn try_remote_reset(&mut self, request: &ResetRequest<'_>) -> Result<bool> {
        // nFlag convention from the vendor protocol: 0 = PIN attached,
        // 1 = no PIN.
        let flag = if request.need_pin { 0 } else { 1 };
        let body = match (request.need_pin, request.pin) {
            (true, Some(pin)) => pin.as_bytes(),
            _ => &[],
        };

        let envelope = self.exchange(MessageId::Reset, request.mode, flag, body, PROXY_RESET_WAIT)?;
        if envelope.return_code != 0 {
            return Err(TransportError::CommFailure(envelope.return_code));
        }
        debug!(mode = request.mode, "proxy confirmed chip reset");
        Ok(true)
    }
}
