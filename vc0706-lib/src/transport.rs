//! The byte channel the camera is attached to, and the idle-wait primitive
//! used by the reply poll loop.

use crate::error::TransportError;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// A half-duplex serial link with non-blocking availability checks.
pub trait Transport {
    /// Open or re-configure the link at the given baud rate.
    fn begin(&mut self, baud_rate: u32) -> Result<(), TransportError>;

    /// Write all bytes. A partial write is a transport failure.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Number of received bytes ready to read without blocking.
    fn bytes_available(&mut self) -> Result<usize, TransportError>;

    /// Read one byte. Only called after `bytes_available` reported data.
    fn read_byte(&mut self) -> Result<u8, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn begin(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        (**self).begin(baud_rate)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(bytes)
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        (**self).read_byte()
    }
}

/// Suspends the caller for one idle-poll unit.
pub trait Delay {
    fn idle(&mut self);
}

/// Sleeps the current thread for a fixed duration per idle unit.
#[derive(Debug, Clone, Copy)]
pub struct ThreadDelay {
    unit: Duration,
}

impl ThreadDelay {
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }
}

impl Default for ThreadDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(1))
    }
}

impl Delay for ThreadDelay {
    fn idle(&mut self) {
        std::thread::sleep(self.unit);
    }
}

// Upper bound for a single-byte read after bytes_to_read() reported data
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A camera attached to a host serial port (e.g. `/dev/ttyUSB0`, `/dev/ttyAMA0`).
pub struct SerialTransport {
    path: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Create a transport for the port at `path`. Nothing is opened until `begin`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            port: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::NotOpen)
    }
}

impl Transport for SerialTransport {
    fn begin(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        match self.port.as_mut() {
            Some(port) => {
                debug!(baud_rate, "Reconfiguring serial port");
                port.set_baud_rate(baud_rate)?;
            }
            None => {
                info!(path = %self.path, baud_rate, "Opening serial port");
                let port = serialport::new(&self.path, baud_rate)
                    .timeout(READ_TIMEOUT)
                    .open()?;
                self.port = Some(port);
            }
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        Ok(self.port()?.bytes_to_read()? as usize)
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        let mut byte = [0u8; 1];
        self.port()?.read_exact(&mut byte)?;
        Ok(byte[0])
    }
}
