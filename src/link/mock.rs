//! In-memory serial transport.
//!
//! `MockOpener` hands out `MockPort` links wired to `MockDevice` handles the
//! test (or a demo) keeps on the other side. The device side can queue bytes
//! for the host to read, inspect what the host wrote, inject read/write
//! faults and simulate an unplug. The opener also counts live handles so
//! callers can check that reconnecting never holds two ports at once.
//!
//! # Example
//! ```
//! use rig_comm::link::mock::MockOpener;
//! use rig_comm::{DeviceController, LinkSettings};
//! use std::time::Duration;
//!
//! let opener = MockOpener::new();
//! let device = opener.add_port("/dev/ttyMOCK0");
//! let settings = LinkSettings::default().with_settle_delay(Duration::ZERO);
//! let mut controller = DeviceController::with_opener(opener.clone(), settings);
//!
//! controller.connect("/dev/ttyMOCK0", 115_200).unwrap();
//! device.push_line("temp: 26, humidity: 10");
//! assert!(controller.poll_once().unwrap());
//! ```

use super::{PortOpener, SerialLink};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct DeviceState {
    to_host: VecDeque<u8>,
    from_host: Vec<u8>,
    flushes: usize,
    open: bool,
    unplugged: bool,
    read_fault: Option<io::ErrorKind>,
    write_fault: Option<io::ErrorKind>,
    last_baud_rate: Option<u32>,
}

/// Device side of a mock port.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    /// Creates a detached device (not registered with any opener).
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues raw bytes for the host to read.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.state.lock().to_host.extend(bytes.iter().copied());
    }

    /// Queues `line` followed by `\n`.
    pub fn push_line(&self, line: &str) {
        let mut state = self.state.lock();
        state.to_host.extend(line.as_bytes().iter().copied());
        state.to_host.push_back(b'\n');
    }

    /// Bytes queued but not yet read by the host.
    pub fn pending(&self) -> usize {
        self.state.lock().to_host.len()
    }

    /// Everything the host has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().from_host.clone()
    }

    /// Everything written so far, decoded lossily.
    pub fn written_string(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().from_host).into_owned()
    }

    /// Drains and returns what the host has written.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().from_host)
    }

    /// Number of successful `flush` calls from the host.
    pub fn flushes(&self) -> usize {
        self.state.lock().flushes
    }

    /// Whether a host handle is currently open on this device.
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Baud rate of the most recent open.
    pub fn last_baud_rate(&self) -> Option<u32> {
        self.state.lock().last_baud_rate
    }

    /// Makes every following read fail with `kind` (`None` clears it).
    pub fn set_read_fault(&self, kind: Option<io::ErrorKind>) {
        self.state.lock().read_fault = kind;
    }

    /// Makes every following write or flush fail with `kind` (`None` clears it).
    pub fn set_write_fault(&self, kind: Option<io::ErrorKind>) {
        self.state.lock().write_fault = kind;
    }

    /// Simulates pulling the cable: the handle stops reporting itself open
    /// and every operation fails.
    pub fn unplug(&self) {
        self.state.lock().unplugged = true;
    }

    /// Undoes [`MockDevice::unplug`] for future opens.
    pub fn replug(&self) {
        self.state.lock().unplugged = false;
    }
}

#[derive(Debug, Default)]
struct Registry {
    devices: HashMap<String, MockDevice>,
    busy: HashMap<String, bool>,
    live_handles: usize,
    peak_handles: usize,
    opens: Vec<String>,
}

/// [`PortOpener`] over a set of named [`MockDevice`]s.
#[derive(Debug, Clone, Default)]
pub struct MockOpener {
    registry: Arc<Mutex<Registry>>,
}

impl MockOpener {
    /// Creates an opener with no ports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a port and returns its device side.
    pub fn add_port(&self, name: &str) -> MockDevice {
        let device = MockDevice::new();
        self.registry
            .lock()
            .devices
            .insert(name.to_string(), device.clone());
        device
    }

    /// Marks a port as held by another process; opening it fails.
    pub fn set_busy(&self, name: &str, busy: bool) {
        self.registry.lock().busy.insert(name.to_string(), busy);
    }

    /// Handles currently open across all ports.
    pub fn live_handles(&self) -> usize {
        self.registry.lock().live_handles
    }

    /// Highest number of simultaneously open handles ever observed.
    pub fn peak_handles(&self) -> usize {
        self.registry.lock().peak_handles
    }

    /// Port names in the order they were successfully opened.
    pub fn opens(&self) -> Vec<String> {
        self.registry.lock().opens.clone()
    }
}

impl PortOpener for MockOpener {
    fn open(
        &mut self,
        port: &str,
        baud_rate: u32,
        _read_timeout: Duration,
    ) -> io::Result<Box<dyn SerialLink>> {
        let mut registry = self.registry.lock();
        if registry.busy.get(port).copied().unwrap_or(false) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is busy", port),
            ));
        }
        let device = registry.devices.get(port).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such device: {}", port))
        })?;

        {
            let mut state = device.state.lock();
            if state.unplugged {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} is not plugged in", port),
                ));
            }
            state.open = true;
            state.last_baud_rate = Some(baud_rate);
        }

        registry.live_handles += 1;
        registry.peak_handles = registry.peak_handles.max(registry.live_handles);
        registry.opens.push(port.to_string());

        Ok(Box::new(MockPort {
            device,
            registry: Arc::clone(&self.registry),
        }))
    }
}

/// Host side of a mock port.
pub struct MockPort {
    device: MockDevice,
    registry: Arc<Mutex<Registry>>,
}

impl MockPort {
    fn check(state: &DeviceState, fault: Option<io::ErrorKind>) -> io::Result<()> {
        if state.unplugged {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        match fault {
            Some(kind) => Err(io::Error::new(kind, "injected fault")),
            None => Ok(()),
        }
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.device.state.lock();
        Self::check(&state, state.read_fault)?;
        if state.to_host.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
        }
        let n = buf.len().min(state.to_host.len());
        for (slot, byte) in buf.iter_mut().zip(state.to_host.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.device.state.lock();
        Self::check(&state, state.write_fault)?;
        state.from_host.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.device.state.lock();
        Self::check(&state, state.write_fault)?;
        state.flushes += 1;
        Ok(())
    }
}

impl SerialLink for MockPort {
    fn bytes_available(&self) -> io::Result<u32> {
        let state = self.device.state.lock();
        Self::check(&state, None)?;
        Ok(u32::try_from(state.to_host.len()).unwrap_or(u32::MAX))
    }

    fn discard_input(&mut self) -> io::Result<()> {
        let mut state = self.device.state.lock();
        Self::check(&state, None)?;
        state.to_host.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        let state = self.device.state.lock();
        state.open && !state.unplugged
    }
}

impl Drop for MockPort {
    fn drop(&mut self) {
        self.device.state.lock().open = false;
        let mut registry = self.registry.lock();
        registry.live_handles = registry.live_handles.saturating_sub(1);
    }
}
