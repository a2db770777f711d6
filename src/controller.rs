//! The device controller: one serial link plus the telemetry it produced.
//!
//! `DeviceController` is driven from the outside. A periodic caller (a UI
//! refresh timer, or the CLI monitor loop) calls [`DeviceController::poll_once`]
//! on every tick and [`DeviceController::write`] on user action. Nothing here
//! spawns a thread or blocks waiting for data: `poll_once` returns
//! immediately when no bytes are pending.
//!
//! A read or write fault tears the connection down before the error is
//! returned, so every following call fails fast with
//! [`LinkError::NotConnected`] until the caller reconnects. Bad telemetry
//! content never produces an error.
//!
//! # Example
//! ```no_run
//! use rig_comm::DeviceController;
//!
//! # fn main() -> Result<(), rig_comm::LinkError> {
//! let mut controller = DeviceController::new();
//! controller.connect("/dev/ttyACM0", 115_200)?;
//! if controller.poll_once()? {
//!     println!("temp = {:?}", controller.value("temp"));
//! }
//! controller.write("BARRIER_OPEN")?;
//! # Ok(())
//! # }
//! ```

use crate::error::{LinkError, LinkResult};
use crate::link::connection::{ConnectionHandle, ConnectionState};
use crate::link::{writer, LinkSettings, PortOpener, SystemOpener};
use crate::telemetry::{TelemetryCache, TelemetryValue};
use std::collections::HashMap;
use std::io;
use tracing::{debug, info, warn};

/// Owns the serial connection, the telemetry cache and the last raw line.
pub struct DeviceController<O: PortOpener = SystemOpener> {
    opener: O,
    settings: LinkSettings,
    connection: Option<ConnectionHandle>,
    telemetry: TelemetryCache,
    last_raw_line: String,
}

impl DeviceController<SystemOpener> {
    /// Controller for the host's serial ports with default timing.
    pub fn new() -> Self {
        Self::with_opener(SystemOpener, LinkSettings::default())
    }

    /// Controller for the host's serial ports with custom timing.
    pub fn with_settings(settings: LinkSettings) -> Self {
        Self::with_opener(SystemOpener, settings)
    }
}

impl Default for DeviceController<SystemOpener> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: PortOpener> DeviceController<O> {
    /// Controller using a custom [`PortOpener`].
    pub fn with_opener(opener: O, settings: LinkSettings) -> Self {
        Self {
            opener,
            settings,
            connection: None,
            telemetry: TelemetryCache::new(),
            last_raw_line: String::new(),
        }
    }

    /// Timing in effect for new connections.
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Connects to `port` at `baud_rate`, closing any current connection
    /// first.
    ///
    /// Blocks for the configured settle delay. On failure the controller is
    /// left closed.
    pub fn connect(&mut self, port: &str, baud_rate: u32) -> LinkResult<()> {
        if self.connection.is_some() {
            self.disconnect();
        }

        match ConnectionHandle::open(&mut self.opener, port, baud_rate, &self.settings) {
            Ok(handle) => {
                info!("Connected to device on {} at {} baud", port, baud_rate);
                self.connection = Some(handle);
                Ok(())
            }
            Err(err) => {
                warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Closes the connection if one is open. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if let Some(handle) = self.connection.take() {
            let port = handle.port_name().to_string();
            drop(handle);
            info!("Disconnected from device on {}", port);
        }
    }

    /// True only when a handle is held and the OS still reports it usable.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(ConnectionHandle::is_open)
    }

    /// Whether a connection handle is currently held.
    pub fn state(&self) -> ConnectionState {
        if self.connection.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Port of the current connection.
    pub fn port_name(&self) -> Option<&str> {
        self.connection.as_ref().map(ConnectionHandle::port_name)
    }

    /// Baud rate of the current connection.
    pub fn baud_rate(&self) -> Option<u32> {
        self.connection.as_ref().map(ConnectionHandle::baud_rate)
    }

    /// Consumes at most one pending line.
    ///
    /// Returns `Ok(true)` when a non-blank line was read; it is then stored as
    /// the last raw line and merged into the telemetry cache. Returns
    /// `Ok(false)` when nothing was pending or the line was blank.
    pub fn poll_once(&mut self) -> LinkResult<bool> {
        let handle = self.live_connection()?;
        match handle.read_line() {
            Ok(Some(line)) => {
                let applied = self.telemetry.apply_line(&line);
                debug!(line = %line, fields = applied, "Received line");
                self.last_raw_line = line;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => Err(self.link_fault("reading", err)),
        }
    }

    /// Sends one command line, appending `\n` if missing, and flushes it.
    pub fn write(&mut self, command: &str) -> LinkResult<()> {
        let handle = match self.live_connection() {
            Ok(handle) => handle,
            Err(err) => {
                warn!("Cannot write {:?}: not connected", command.trim_end());
                return Err(err);
            }
        };
        match writer::send_command(handle.link_mut(), command) {
            Ok(bytes) => {
                debug!(command = command.trim_end(), bytes, "Sent command");
                Ok(())
            }
            Err(err) => Err(self.link_fault("writing", err)),
        }
    }

    /// Latest reading for `label`.
    pub fn value(&self, label: &str) -> Option<&TelemetryValue> {
        self.telemetry.get(label)
    }

    /// Copy of every cached reading.
    pub fn values(&self) -> HashMap<String, TelemetryValue> {
        self.telemetry.snapshot()
    }

    /// Read-only view of the cache.
    pub fn telemetry(&self) -> &TelemetryCache {
        &self.telemetry
    }

    /// Last non-blank line received, verbatim after trimming.
    pub fn last_raw_line(&self) -> &str {
        &self.last_raw_line
    }

    /// Clears cached readings and the last raw line. Connection is untouched.
    pub fn clear_readings(&mut self) {
        self.telemetry.clear();
        self.last_raw_line.clear();
    }

    /// Returns the handle if it is still usable; releases a dead one.
    fn live_connection(&mut self) -> LinkResult<&mut ConnectionHandle> {
        match self.connection.as_ref().map(ConnectionHandle::is_open) {
            None => Err(LinkError::NotConnected),
            Some(false) => {
                if let Some(handle) = self.connection.take() {
                    warn!("Serial handle on {} is no longer open", handle.port_name());
                }
                Err(LinkError::NotConnected)
            }
            Some(true) => self.connection.as_mut().ok_or(LinkError::NotConnected),
        }
    }

    /// Drops the connection after an I/O fault and builds the error for it.
    fn link_fault(&mut self, operation: &'static str, source: io::Error) -> LinkError {
        let port = self
            .connection
            .take()
            .map(|handle| handle.port_name().to_string())
            .unwrap_or_default();
        warn!("Serial error on {} while {}: {}", port, operation, source);
        LinkError::TransientIo {
            port,
            operation,
            source,
        }
    }
}

impl<O: PortOpener> Drop for DeviceController<O> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
