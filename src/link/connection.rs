//! Connection handle lifecycle.
//!
//! A [`ConnectionHandle`] exists only while the port is open: it is created
//! by [`ConnectionHandle::open`] after the board has settled and its boot
//! output was discarded, and the OS handle is released when it is dropped.

use super::reader::LineReader;
use super::{LinkSettings, PortOpener, SerialLink};
use crate::error::{LinkError, LinkResult};
use std::fmt;
use std::thread;
use tracing::{debug, trace};

/// Connectivity as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No handle is held.
    Closed,
    /// A handle is held and was usable when last checked.
    Open,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Closed => f.write_str("closed"),
            ConnectionState::Open => f.write_str("open"),
        }
    }
}

/// An open serial connection bound to one port and baud rate.
pub struct ConnectionHandle {
    port_name: String,
    baud_rate: u32,
    link: Box<dyn SerialLink>,
    reader: LineReader,
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("port_name", &self.port_name)
            .field("baud_rate", &self.baud_rate)
            .finish_non_exhaustive()
    }
}

impl ConnectionHandle {
    /// Opens `port`, waits out the board reset and drops whatever the board
    /// printed while booting.
    ///
    /// Any failure yields [`LinkError::ConnectionFailure`]; a partially opened
    /// handle is released before returning.
    pub fn open<O: PortOpener + ?Sized>(
        opener: &mut O,
        port: &str,
        baud_rate: u32,
        settings: &LinkSettings,
    ) -> LinkResult<Self> {
        if baud_rate == 0 {
            return Err(LinkError::connection_failure(
                port,
                "baud rate must be a positive integer",
            ));
        }

        let mut link = opener
            .open(port, baud_rate, settings.read_timeout)
            .map_err(|e| LinkError::connection_failure(port, e))?;

        if !settings.settle_delay.is_zero() {
            debug!(port, delay = ?settings.settle_delay, "Waiting for board reset");
            thread::sleep(settings.settle_delay);
        }

        let pending = link
            .bytes_available()
            .map_err(|e| LinkError::connection_failure(port, e))?;
        if pending > 0 {
            link.discard_input()
                .map_err(|e| LinkError::connection_failure(port, e))?;
            trace!(port, discarded = pending, "Discarded boot output");
        }

        Ok(Self {
            port_name: port.to_string(),
            baud_rate,
            link,
            reader: LineReader::new(),
        })
    }

    /// Port this handle is bound to.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Baud rate the port was opened at.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Probes the OS handle.
    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    /// Reads at most one line from the link.
    pub fn read_line(&mut self) -> std::io::Result<Option<String>> {
        self.reader.read_line(self.link.as_mut())
    }

    pub(crate) fn link_mut(&mut self) -> &mut dyn SerialLink {
        self.link.as_mut()
    }
}
