//! Serial port names of the programmer's CDC ACM interfaces
//!
//! The programmer exposes two virtual serial ports: the STK500 programming
//! port on interface 1 and the TTL serial port on interface 3. The OS names
//! them (`/dev/ttyACM0`, `COM5`, ...); we find them through `serialport`
//! and match them to a programmer by USB serial number.

use pavr2_core::protocol::{USB_PRODUCT_ID_V2, USB_PRODUCT_ID_V2_1, USB_VENDOR_ID};
use serialport::SerialPortType;

/// Interface number of the programming port's CDC control interface
pub const PROGRAMMING_PORT_INTERFACE: u8 = 1;
/// Interface number of the TTL port's CDC control interface
pub const TTL_PORT_INTERFACE: u8 = 3;

/// A serial port that belongs to some programmer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgrammerPort {
    pub name: String,
    pub serial_number: Option<String>,
    /// USB interface number, when the platform reports it
    pub interface: Option<u8>,
}

/// Port names for one programmer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortNames {
    pub programming: Option<String>,
    pub ttl: Option<String>,
}

/// Serial ports of every connected programmer. Failures only cost us the
/// port names, so they are logged and yield an empty list.
pub fn programmer_ports() -> Vec<ProgrammerPort> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            log::debug!("Failed to list serial ports: {}", e);
            return Vec::new();
        }
    };

    ports
        .into_iter()
        .filter_map(|port| match port.port_type {
            SerialPortType::UsbPort(info)
                if info.vid == USB_VENDOR_ID
                    && matches!(info.pid, USB_PRODUCT_ID_V2 | USB_PRODUCT_ID_V2_1) =>
            {
                Some(ProgrammerPort {
                    name: port.port_name,
                    serial_number: info.serial_number,
                    interface: info.interface,
                })
            }
            _ => None,
        })
        .collect()
}

/// Pick the programming and TTL ports of the programmer with `serial_number`
///
/// Ports are matched by interface number. If the platform does not report
/// interface numbers, the ports are taken in name order, which follows
/// interface order on the platforms that omit them.
pub fn assign_ports(serial_number: &str, ports: &[ProgrammerPort]) -> PortNames {
    let mut own: Vec<&ProgrammerPort> = ports
        .iter()
        .filter(|p| p.serial_number.as_deref() == Some(serial_number))
        .collect();

    if own.iter().all(|p| p.interface.is_some()) {
        let by_interface = |interface: u8| {
            own.iter()
                .find(|p| p.interface == Some(interface))
                .map(|p| p.name.clone())
        };
        return PortNames {
            programming: by_interface(PROGRAMMING_PORT_INTERFACE),
            ttl: by_interface(TTL_PORT_INTERFACE),
        };
    }

    own.sort_by(|a, b| a.name.cmp(&b.name));
    PortNames {
        programming: own.first().map(|p| p.name.clone()),
        ttl: own.get(1).map(|p| p.name.clone()),
    }
}
