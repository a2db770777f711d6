//! Serial port enumeration.

use serde::Serialize;
use std::fmt;
use tracing::warn;

/// What kind of device backs a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortKind {
    /// USB serial adapter or native USB CDC board.
    Usb {
        /// USB vendor id.
        vid: u16,
        /// USB product id.
        pid: u16,
        /// Manufacturer string, if reported.
        manufacturer: Option<String>,
        /// Product string, if reported.
        product: Option<String>,
        /// Serial number, if reported.
        serial_number: Option<String>,
    },
    /// PCI serial card.
    Pci,
    /// Bluetooth serial profile.
    Bluetooth,
    /// Anything the OS could not classify (including built-in UARTs).
    Unknown,
}

/// A port name together with what the OS knows about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDetails {
    /// Name to pass to `connect` (e.g. `/dev/ttyACM0`, `COM3`).
    pub name: String,
    /// Device classification.
    pub kind: PortKind,
}

impl fmt::Display for PortDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PortKind::Usb {
                vid,
                pid,
                manufacturer,
                product,
                ..
            } => {
                write!(f, "{} (USB {:04x}:{:04x}", self.name, vid, pid)?;
                if let Some(m) = manufacturer {
                    write!(f, " {}", m)?;
                }
                if let Some(p) = product {
                    write!(f, " {}", p)?;
                }
                f.write_str(")")
            }
            PortKind::Pci => write!(f, "{} (PCI)", self.name),
            PortKind::Bluetooth => write!(f, "{} (Bluetooth)", self.name),
            PortKind::Unknown => f.write_str(&self.name),
        }
    }
}

impl From<serialport::SerialPortInfo> for PortDetails {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let kind = match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => PortKind::Usb {
                vid: usb.vid,
                pid: usb.pid,
                manufacturer: usb.manufacturer,
                product: usb.product,
                serial_number: usb.serial_number,
            },
            serialport::SerialPortType::PciPort => PortKind::Pci,
            serialport::SerialPortType::BluetoothPort => PortKind::Bluetooth,
            serialport::SerialPortType::Unknown => PortKind::Unknown,
        };
        Self {
            name: info.port_name,
            kind,
        }
    }
}

/// Every serial port the host reports, with details.
///
/// Never fails: enumeration errors are logged and yield an empty list.
pub fn list_port_details() -> Vec<PortDetails> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(PortDetails::from).collect(),
        Err(err) => {
            warn!("Failed to enumerate serial ports: {}", err);
            Vec::new()
        }
    }
}

/// Names of every serial port the host reports; empty when there are none.
pub fn list_ports() -> Vec<String> {
    list_port_details()
        .into_iter()
        .map(|details| details.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_never_panics() {
        let names = list_ports();
        let details = list_port_details();
        assert_eq!(names.len(), details.len());
    }

    #[test]
    fn usb_port_display() {
        let details = PortDetails {
            name: "/dev/ttyACM0".into(),
            kind: PortKind::Usb {
                vid: 0x2341,
                pid: 0x0043,
                manufacturer: Some("Arduino".into()),
                product: None,
                serial_number: None,
            },
        };
        assert_eq!(details.to_string(), "/dev/ttyACM0 (USB 2341:0043 Arduino)");
    }

    #[test]
    fn converts_from_serialport_info() {
        let info = serialport::SerialPortInfo {
            port_name: "COM3".into(),
            port_type: serialport::SerialPortType::BluetoothPort,
        };
        let details = PortDetails::from(info);
        assert_eq!(details.name, "COM3");
        assert_eq!(details.kind, PortKind::Bluetooth);
        assert_eq!(details.to_string(), "COM3 (Bluetooth)");
    }
}
