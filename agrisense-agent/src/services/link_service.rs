use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, SerialPort};

use crate::configs::Channel;
use crate::errors::LinkError;

/// Longest answer kept from a device; a valid frame is well under this.
pub const MAX_LINE_LEN: usize = 256;

/// Timing of one serial channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    pub baud_rate: u32,
    /// Upper bound for a single line read.
    pub read_timeout: Duration,
    /// Wait after opening, some boards reset when the port opens.
    pub settle_delay: Duration,
    /// Wait after a command before its answer is read.
    pub pre_read_delay: Duration,
}

impl LinkSettings {
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            read_timeout: Duration::from_secs(1),
            settle_delay: Duration::ZERO,
            pre_read_delay: Duration::ZERO,
        }
    }
}

impl From<&Channel> for LinkSettings {
    fn from(channel: &Channel) -> Self {
        Self {
            baud_rate: channel.baud_rate,
            read_timeout: Duration::from_millis(channel.read_timeout_ms),
            settle_delay: Duration::from_millis(channel.settle_delay_ms),
            pre_read_delay: Duration::from_millis(channel.pre_read_delay_ms),
        }
    }
}

/// One line-oriented request/response channel to a sensor.
///
/// Calls block; async callers run them on the blocking pool.
pub trait SensorLink: Send {
    fn port(&self) -> &str;

    /// Drops stale input, then writes `command` followed by a newline.
    fn send(&mut self, command: &str) -> Result<(), LinkError>;

    /// Reads one line, stripped. A timeout yields an empty string and leaves
    /// [`SensorLink::is_ok`] true; a device fault yields an empty string and
    /// sets it false.
    fn receive(&mut self) -> String;

    fn is_ok(&self) -> bool;

    fn close(&mut self);
}

/// Opens links by port name, so resolution and startup can be exercised
/// without hardware.
pub trait Connector: Send + Sync {
    fn open(&self, port: &str, settings: &LinkSettings) -> Result<Box<dyn SensorLink>, LinkError>;
}

pub struct SerialConnector;

impl Connector for SerialConnector {
    fn open(&self, port: &str, settings: &LinkSettings) -> Result<Box<dyn SensorLink>, LinkError> {
        Ok(Box::new(SerialLink::open(port, settings)?))
    }
}

pub struct SerialLink {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
    read_timeout: Duration,
    pre_read_delay: Duration,
    ok: bool,
}

impl SerialLink {
    pub fn open(port_name: &str, settings: &LinkSettings) -> Result<Self, LinkError> {
        tracing::debug!("Connect to port: {} at {} baud", port_name, settings.baud_rate);

        let port = serialport::new(port_name, settings.baud_rate)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|source| LinkError::Open {
                port: port_name.to_string(),
                source,
            })?;

        if !settings.settle_delay.is_zero() {
            thread::sleep(settings.settle_delay);
        }

        Ok(Self {
            port_name: port_name.to_string(),
            port: Some(port),
            read_timeout: settings.read_timeout,
            pre_read_delay: settings.pre_read_delay,
            ok: true,
        })
    }

    fn closed(&self) -> LinkError {
        LinkError::Closed {
            port: self.port_name.clone(),
        }
    }
}

impl SensorLink for SerialLink {
    fn port(&self) -> &str {
        &self.port_name
    }

    fn send(&mut self, command: &str) -> Result<(), LinkError> {
        let Some(port) = self.port.as_mut() else {
            return Err(self.closed());
        };

        if let Err(e) = port.clear(ClearBuffer::Input) {
            tracing::warn!("Failed to clear input buffer on {}: {}", self.port_name, e);
        }

        let frame = format!("{command}\n");
        let written = port
            .write(frame.as_bytes())
            .and_then(|bytes_written| port.flush().map(|_| bytes_written));

        match written {
            Ok(bytes_written) if bytes_written == frame.len() => {
                tracing::debug!("Send to {}: {:?}", self.port_name, command);
                Ok(())
            }
            Ok(_) => {
                self.ok = false;
                Err(LinkError::IncompleteWrite {
                    port: self.port_name.clone(),
                })
            }
            Err(source) => {
                self.ok = false;
                Err(LinkError::Write {
                    port: self.port_name.clone(),
                    source,
                })
            }
        }
    }

    fn receive(&mut self) -> String {
        let Some(port) = self.port.as_mut() else {
            self.ok = false;
            return String::new();
        };

        if !self.pre_read_delay.is_zero() {
            thread::sleep(self.pre_read_delay);
        }

        let line = match read_line(port, self.read_timeout, MAX_LINE_LEN) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Read from {} failed: {}", self.port_name, e);
                self.ok = false;
                return String::new();
            }
        };

        self.ok = true;
        let line: String = String::from_utf8_lossy(&line)
            .chars()
            .filter(|c| *c != char::REPLACEMENT_CHARACTER)
            .collect();

        tracing::debug!("Receive from {}: {:?}", self.port_name, line);

        line.trim().to_string()
    }

    fn is_ok(&self) -> bool {
        self.ok
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::info!("Closed serial port {}", self.port_name);
        }
    }
}

/// Reads bytes up to a newline. Stops early at end of input, at a read
/// timeout, once `timeout` has passed in total or after `max_len` bytes,
/// returning what was read so far.
pub fn read_line<R: Read + ?Sized>(reader: &mut R, timeout: Duration, max_len: usize) -> io::Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    while line.len() < max_len {
        if Instant::now() >= deadline {
            tracing::warn!("No line end within {:?}, {} bytes read", timeout, line.len());
            break;
        }

        match reader.read(&mut byte) {
            Ok(0) => break,
            Ok(_) if byte[0] == b'\n' => return Ok(line),
            Ok(_) => line.push(byte[0]),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    if line.len() >= max_len {
        tracing::warn!("Line longer than {} bytes, rest dropped", max_len);
    }

    Ok(line)
}
