use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{GpioError, Result};

/// Logical pin level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn from_bit(bit: u8) -> Self {
        if bit == 0 {
            Level::Low
        } else {
            Level::High
        }
    }

    fn as_sysfs_byte(self) -> u8 {
        match self {
            Level::Low => b'0',
            Level::High => b'1',
        }
    }
}

/// Pin direction, fixed at export time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_sysfs_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// Edge selection for interrupt-style monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Edge {
    fn as_sysfs_str(self) -> &'static str {
        match self {
            Edge::Rising => "rising",
            Edge::Falling => "falling",
            Edge::Both => "both",
        }
    }
}

/// Read/wait surface of a pin, split out so the ready gate and reset
/// controller can be exercised with mock lines.
pub trait DigitalLine: Send {
    /// Sample the current level.
    fn level(&mut self) -> Result<Level>;

    /// Block until an edge brings the line to `expected` or `timeout`
    /// elapses. `Ok(false)` is a clean timeout.
    fn wait_edge(&mut self, timeout: Duration, expected: Level) -> Result<bool>;
}

/// Drive surface of an output pin (reset and wake-up lines).
pub trait OutputLine: Send {
    fn drive(&mut self, level: Level) -> Result<()>;
}

impl OutputLine for GpioLine {
    fn drive(&mut self, level: Level) -> Result<()> {
        self.write(level)
    }
}

/// One exported sysfs GPIO pin, unexported again on drop.
///
/// The sysfs base path is injectable so tests can point the line at a
/// fake tree instead of `/sys/class/gpio`.
#[derive(Debug)]
pub struct GpioLine {
    pin: u32,
    base: PathBuf,
    direction: Direction,
    value_file: File,
}

impl GpioLine {
    pub const DEFAULT_BASE: &'static str = "/sys/class/gpio";

    /// Export `pin` and configure its direction.
    pub fn export(pin: u32, direction: Direction) -> Result<Self> {
        Self::export_at(Self::DEFAULT_BASE, pin, direction)
    }

    /// Export against an explicit sysfs base path.
    pub fn export_at(base: impl AsRef<Path>, pin: u32, direction: Direction) -> Result<Self> {
        let base = base.as_ref().to_path_buf();

        let export_path = base.join("export");
        if let Err(err) = write_attr(&export_path, &pin.to_string()) {
            // EBUSY means the pin is already exported, which is fine.
            if err.raw_os_error() != Some(libc::EBUSY) {
                return Err(GpioError::Sysfs {
                    pin,
                    op: "export",
                    path: export_path,
                    source: err,
                });
            }
        }

        let dir_path = base.join(format!("gpio{pin}")).join("direction");
        write_attr(&dir_path, direction.as_sysfs_str()).map_err(|err| GpioError::Sysfs {
            pin,
            op: "set direction",
            path: dir_path,
            source: err,
        })?;

        let value_path = base.join(format!("gpio{pin}")).join("value");
        let value_file = OpenOptions::new()
            .read(true)
            .write(direction == Direction::Out)
            .open(&value_path)
            .map_err(|err| GpioError::Sysfs {
                pin,
                op: "open value",
                path: value_path,
                source: err,
            })?;

        debug!(pin, ?direction, "exported gpio line");
        Ok(Self {
            pin,
            base,
            direction,
            value_file,
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Drive the line. Fails on input lines.
    pub fn write(&mut self, level: Level) -> Result<()> {
        if self.direction != Direction::Out {
            return Err(GpioError::NotOutput { pin: self.pin });
        }
        self.value_file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.value_file.write_all(&[level.as_sysfs_byte()]))
            .map_err(|err| GpioError::Sysfs {
                pin: self.pin,
                op: "write value",
                path: self.value_path(),
                source: err,
            })?;
        trace!(pin = self.pin, ?level, "gpio write");
        Ok(())
    }

    /// Select which edges wake an edge wait.
    pub fn set_edge(&mut self, edge: Edge) -> Result<()> {
        let edge_path = self.base.join(format!("gpio{}", self.pin)).join("edge");
        write_attr(&edge_path, edge.as_sysfs_str()).map_err(|err| GpioError::Sysfs {
            pin: self.pin,
            op: "set edge",
            path: edge_path,
            source: err,
        })
    }

    fn value_path(&self) -> PathBuf {
        self.base.join(format!("gpio{}", self.pin)).join("value")
    }

    fn read_value(&mut self) -> Result<Level> {
        let mut byte = [0u8; 1];
        self.value_file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.value_file.read_exact(&mut byte))
            .map_err(|err| GpioError::Sysfs {
                pin: self.pin,
                op: "read value",
                path: self.value_path(),
                source: err,
            })?;
        match byte[0] {
            b'0' => Ok(Level::Low),
            b'1' => Ok(Level::High),
            other => Err(GpioError::BadValue {
                pin: self.pin,
                value: other,
            }),
        }
    }
}

impl DigitalLine for GpioLine {
    fn level(&mut self) -> Result<Level> {
        self.read_value()
    }

    fn wait_edge(&mut self, timeout: Duration, expected: Level) -> Result<bool> {
        use std::os::fd::AsRawFd;

        let deadline = Instant::now() + timeout;
        // Clear the pending interrupt state before sleeping on POLLPRI.
        let _ = self.read_value()?;

        loop {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) => d,
                None => return Ok(false),
            };

            let mut pfd = libc::pollfd {
                fd: self.value_file.as_raw_fd(),
                events: libc::POLLPRI | libc::POLLERR,
                revents: 0,
            };
            let millis = remaining.as_millis().min(i32::MAX as u128) as i32;
            // SAFETY: pfd points to one valid pollfd for the duration
            // of the call.
            let rc = unsafe { libc::poll(&mut pfd, 1, millis.max(1)) };
            if rc == 0 {
                return Ok(false);
            }
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(GpioError::Poll {
                    pin: self.pin,
                    source: err,
                });
            }

            if self.read_value()? == expected {
                return Ok(true);
            }
            // An edge fired but the level is not the one we want
            // (e.g. edge mode "both"); keep waiting out the budget.
        }
    }
}

impl Drop for GpioLine {
    fn drop(&mut self) {
        let unexport_path = self.base.join("unexport");
        if let Err(err) = write_attr(&unexport_path, &self.pin.to_string()) {
            debug!(pin = self.pin, %err, "gpio unexport failed");
        }
    }
}

fn write_attr(path: &Path, value: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.write_all(value.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a fake sysfs tree: export/unexport files plus a gpioN
    /// directory with direction, value and edge attributes.
    fn fake_sysfs(pin: u32, value: &str) -> PathBuf {
        let base = std::env::temp_dir().join(format!(
            "seclink-gpio-{}-{pin}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&base);
        std::fs::create_dir_all(base.join(format!("gpio{pin}"))).unwrap();
        std::fs::write(base.join("export"), "").unwrap();
        std::fs::write(base.join("unexport"), "").unwrap();
        std::fs::write(base.join(format!("gpio{pin}/direction")), "").unwrap();
        std::fs::write(base.join(format!("gpio{pin}/value")), value).unwrap();
        std::fs::write(base.join(format!("gpio{pin}/edge")), "").unwrap();
        base
    }

    #[test]
    fn export_read_high_and_low() {
        let base = fake_sysfs(17, "1");
        let mut line = GpioLine::export_at(&base, 17, Direction::In).unwrap();
        assert_eq!(line.level().unwrap(), Level::High);

        std::fs::write(base.join("gpio17/value"), "0").unwrap();
        assert_eq!(line.level().unwrap(), Level::Low);

        drop(line);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn output_line_writes_value() {
        let base = fake_sysfs(22, "0");
        let mut line = GpioLine::export_at(&base, 22, Direction::Out).unwrap();
        line.write(Level::High).unwrap();
        assert_eq!(line.level().unwrap(), Level::High);

        drop(line);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn input_line_rejects_writes() {
        let base = fake_sysfs(23, "0");
        let mut line = GpioLine::export_at(&base, 23, Direction::In).unwrap();
        let err = line.write(Level::High).unwrap_err();
        assert!(matches!(err, GpioError::NotOutput { pin: 23 }));

        drop(line);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn garbage_value_byte_is_reported() {
        let base = fake_sysfs(24, "x");
        let mut line = GpioLine::export_at(&base, 24, Direction::In).unwrap();
        let err = line.level().unwrap_err();
        assert!(matches!(err, GpioError::BadValue { pin: 24, value: b'x' }));

        drop(line);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn export_fails_without_sysfs_tree() {
        let err = GpioLine::export_at("/nonexistent-sysfs", 5, Direction::In).unwrap_err();
        assert!(matches!(err, GpioError::Sysfs { op: "export", .. }));
    }

    #[test]
    fn edge_attribute_is_written() {
        let base = fake_sysfs(25, "0");
        let mut line = GpioLine::export_at(&base, 25, Direction::In).unwrap();
        line.set_edge(Edge::Both).unwrap();
        assert_eq!(
            std::fs::read_to_string(base.join("gpio25/edge")).unwrap(),
            "both"
        );

        drop(line);
        let _ = std::fs::remove_dir_all(&base);
    }
}
