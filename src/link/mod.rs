//! Serial transport for the device link.
//!
//! The controller never talks to `serialport` directly. It goes through two
//! small traits so the whole read/parse/write path can run in-process against
//! [`mock::MockOpener`] in tests:
//!
//! - [`SerialLink`]: an open byte channel (`Read + Write`) that can report how
//!   many bytes are pending without blocking, drop buffered input, and say
//!   whether the OS handle is still alive.
//! - [`PortOpener`]: turns a port name and baud rate into a boxed
//!   [`SerialLink`]. [`SystemOpener`] is the `serialport` backed one.
//!
//! Submodules hold the individual stages:
//! - [`connection`]: handle lifecycle (open, settle, discard, close)
//! - [`reader`]: non-blocking line reads with lossy decoding
//! - [`writer`]: command normalization and flushed writes

pub mod connection;
pub mod mock;
pub mod reader;
pub mod writer;

use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::debug;

/// Baud rate used when none is configured.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Rates the rig firmware is known to run at.
pub const SUPPORTED_BAUD_RATES: [u32; 5] = [9_600, 19_200, 38_400, 57_600, 115_200];

/// Read timeout applied to the OS handle.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Time the board needs to come out of the reset triggered by opening the port.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// An open, bidirectional serial channel.
pub trait SerialLink: Read + Write + Send {
    /// Bytes currently buffered for reading. Must not block.
    fn bytes_available(&self) -> io::Result<u32>;

    /// Drops everything buffered on the input side.
    fn discard_input(&mut self) -> io::Result<()>;

    /// Asks the underlying handle whether it is still usable.
    fn is_open(&self) -> bool;
}

/// Opens serial links by port name.
pub trait PortOpener: Send {
    /// Opens `port` at `baud_rate`, bounding reads by `read_timeout`.
    fn open(
        &mut self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> io::Result<Box<dyn SerialLink>>;
}

/// Timing knobs for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    /// Bound on a single OS read call.
    pub read_timeout: Duration,
    /// Wait after opening before the link is trusted.
    pub settle_delay: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl LinkSettings {
    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the post-open settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// [`PortOpener`] backed by the host's serial ports (8N1, no flow control).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl PortOpener for SystemOpener {
    fn open(
        &mut self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> io::Result<Box<dyn SerialLink>> {
        let handle = serialport::new(port, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(read_timeout)
            .open()?;
        debug!(port, baud_rate, "OS serial handle opened");
        Ok(Box::new(SystemPort { port: handle }))
    }
}

/// A `serialport` handle adapted to [`SerialLink`].
pub struct SystemPort {
    port: Box<dyn SerialPort>,
}

impl Read for SystemPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SystemPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl SerialLink for SystemPort {
    fn bytes_available(&self) -> io::Result<u32> {
        Ok(self.port.bytes_to_read()?)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        Ok(self.port.clear(ClearBuffer::Input)?)
    }

    fn is_open(&self) -> bool {
        // A handle whose device was unplugged fails the queue-size ioctl.
        self.port.bytes_to_read().is_ok()
    }
}
