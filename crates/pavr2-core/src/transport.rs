//! Transport trait definitions
//!
//! The core never talks to USB directly. A backend crate provides a
//! [`Transport`] that can enumerate programmers and open them, and each open
//! device is a [`DeviceHandle`] that performs control transfers.
//!
//! Dropping a handle closes it. Backends report every failure as
//! [`Error::Transport`](crate::error::Error::Transport).

use crate::error::Result;

/// A programmer found during enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: String,
    /// Device release number from the USB descriptor, BCD encoded (0x0107 = 1.07)
    pub firmware_version: u16,
    /// Opaque token identifying this physical connection to the OS
    pub os_id: String,
    /// Serial port for the STK500 programming interface, if the OS exposed one
    pub programming_port: Option<String>,
    /// Serial port for the TTL serial interface
    pub ttl_port: Option<String>,
}

/// Shown in place of a serial port name the OS did not report
pub const UNKNOWN_PORT_NAME: &str = "(unknown)";

fn bcd_to_decimal(bcd: u8) -> u8 {
    (bcd & 0xF) + 10 * (bcd >> 4)
}

impl DeviceDescriptor {
    /// Product name (e.g. "Pololu USB AVR Programmer v2.1")
    pub fn name(&self) -> &'static str {
        crate::protocol::product_name(self.product_id)
    }

    pub fn firmware_version_major(&self) -> u8 {
        bcd_to_decimal((self.firmware_version >> 8) as u8)
    }

    pub fn firmware_version_minor(&self) -> u8 {
        bcd_to_decimal((self.firmware_version & 0xFF) as u8)
    }

    /// Firmware version as "major.minor" (e.g. "1.07")
    pub fn firmware_version_string(&self) -> String {
        format!(
            "{}.{:02}",
            self.firmware_version_major(),
            self.firmware_version_minor()
        )
    }

    /// Name of the programming port (e.g. "/dev/ttyACM0", "COM5")
    pub fn programming_port_name(&self) -> &str {
        self.programming_port.as_deref().unwrap_or(UNKNOWN_PORT_NAME)
    }

    pub fn ttl_port_name(&self) -> &str {
        self.ttl_port.as_deref().unwrap_or(UNKNOWN_PORT_NAME)
    }

    /// Whether another descriptor refers to the same connected device
    pub fn same_device(&self, other: &DeviceDescriptor) -> bool {
        self.os_id == other.os_id
    }
}

/// An open device
pub trait DeviceHandle {
    /// Perform a control transfer.
    ///
    /// For IN requests (`request_type & 0x80 != 0`) up to `buf.len()` bytes
    /// are read into `buf`; for OUT requests `buf` is sent. Returns the
    /// number of bytes transferred.
    fn control_transfer(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize>;
}

impl<H: DeviceHandle + ?Sized> DeviceHandle for Box<H> {
    fn control_transfer(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize> {
        (**self).control_transfer(request_type, request, value, index, buf)
    }
}

/// Enumerates and opens programmers
pub trait Transport {
    /// List the supported programmers that are currently connected
    fn list_devices(&mut self) -> Result<Vec<DeviceDescriptor>>;

    /// Whether an older, unsupported programmer model is connected
    fn legacy_device_present(&mut self) -> Result<bool>;

    /// Open a device from the latest enumeration
    fn open(&mut self, device: &DeviceDescriptor) -> Result<Box<dyn DeviceHandle>>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn list_devices(&mut self) -> Result<Vec<DeviceDescriptor>> {
        (**self).list_devices()
    }

    fn legacy_device_present(&mut self) -> Result<bool> {
        (**self).legacy_device_present()
    }

    fn open(&mut self, device: &DeviceDescriptor) -> Result<Box<dyn DeviceHandle>> {
        (**self).open(device)
    }
}
