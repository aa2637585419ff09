//! nusb-backed transport and device handle

use std::time::Duration;

use nusb::transfer::{ControlIn, ControlOut, ControlType, Recipient};
use nusb::{Interface, MaybeFuture};
use pavr2_core::protocol::{
    USB_PRODUCT_ID_PGM03A, USB_PRODUCT_ID_V2, USB_PRODUCT_ID_V2_1, USB_VENDOR_ID,
};
use pavr2_core::{DeviceDescriptor, DeviceHandle, Transport};

use crate::error::{Result, UsbError};
use crate::ports::{assign_ports, programmer_ports};

/// Timeout for every control transfer
pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(300);

fn is_supported(d: &nusb::DeviceInfo) -> bool {
    d.vendor_id() == USB_VENDOR_ID
        && matches!(d.product_id(), USB_PRODUCT_ID_V2 | USB_PRODUCT_ID_V2_1)
}

fn os_id(d: &nusb::DeviceInfo) -> String {
    format!("{}-{}", d.busnum(), d.device_address())
}

fn list_raw() -> Result<Vec<nusb::DeviceInfo>> {
    Ok(nusb::list_devices()
        .wait()
        .map_err(|e| UsbError::ListFailed(e.to_string()))?
        .collect())
}

/// Transport over the host's USB stack
#[derive(Debug, Default)]
pub struct UsbTransport {
    _private: (),
}

impl UsbTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_device(&self, device: &DeviceDescriptor) -> Result<UsbHandle> {
        let device_info = list_raw()?
            .into_iter()
            .find(|d| is_supported(d) && os_id(d) == device.os_id)
            .ok_or(UsbError::DeviceNotFound)?;

        log::debug!(
            "Opening programmer at bus {} address {}",
            device_info.busnum(),
            device_info.device_address()
        );

        let usb_device = device_info
            .open()
            .wait()
            .map_err(|e| UsbError::OpenFailed(e.to_string()))?;

        // Interface 0 is the vendor-specific interface; the others belong
        // to the CDC ACM serial ports.
        let interface = usb_device
            .claim_interface(0)
            .wait()
            .map_err(|e| UsbError::ClaimFailed(e.to_string()))?;

        Ok(UsbHandle { interface })
    }
}

impl Transport for UsbTransport {
    fn list_devices(&mut self) -> pavr2_core::Result<Vec<DeviceDescriptor>> {
        let supported: Vec<_> = list_raw()?.into_iter().filter(is_supported).collect();
        let ports = if supported.is_empty() {
            Vec::new()
        } else {
            programmer_ports()
        };

        let devices = supported
            .iter()
            .map(|d| {
                let serial_number = d.serial_number().unwrap_or_default().to_string();
                let port_names = assign_ports(&serial_number, &ports);
                DeviceDescriptor {
                    vendor_id: d.vendor_id(),
                    product_id: d.product_id(),
                    firmware_version: d.device_version(),
                    os_id: os_id(d),
                    programming_port: port_names.programming,
                    ttl_port: port_names.ttl,
                    serial_number,
                }
            })
            .collect::<Vec<_>>();

        log::trace!("Found {} programmer(s)", devices.len());
        Ok(devices)
    }

    fn legacy_device_present(&mut self) -> pavr2_core::Result<bool> {
        Ok(list_raw()?
            .iter()
            .any(|d| d.vendor_id() == USB_VENDOR_ID && d.product_id() == USB_PRODUCT_ID_PGM03A))
    }

    fn open(&mut self, device: &DeviceDescriptor) -> pavr2_core::Result<Box<dyn DeviceHandle>> {
        Ok(Box::new(self.open_device(device)?))
    }
}

/// An open programmer. Dropping it releases the interface and closes the
/// device.
pub struct UsbHandle {
    interface: Interface,
}

fn control_type(request_type: u8) -> ControlType {
    match (request_type >> 5) & 0x03 {
        0 => ControlType::Standard,
        1 => ControlType::Class,
        _ => ControlType::Vendor,
    }
}

fn recipient(request_type: u8) -> Recipient {
    match request_type & 0x1F {
        0 => Recipient::Device,
        1 => Recipient::Interface,
        2 => Recipient::Endpoint,
        _ => Recipient::Other,
    }
}

impl UsbHandle {
    fn control_read(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize> {
        let data = self
            .interface
            .control_in(
                ControlIn {
                    control_type: control_type(request_type),
                    recipient: recipient(request_type),
                    request,
                    value,
                    index,
                    length: buf.len() as u16,
                },
                TRANSFER_TIMEOUT,
            )
            .wait()
            .map_err(|e| UsbError::TransferFailed(e.to_string()))?;

        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn control_write(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize> {
        self.interface
            .control_out(
                ControlOut {
                    control_type: control_type(request_type),
                    recipient: recipient(request_type),
                    request,
                    value,
                    index,
                    data,
                },
                TRANSFER_TIMEOUT,
            )
            .wait()
            .map_err(|e| UsbError::TransferFailed(e.to_string()))?;

        Ok(data.len())
    }
}

impl DeviceHandle for UsbHandle {
    fn control_transfer(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> pavr2_core::Result<usize> {
        let transferred = if request_type & 0x80 != 0 {
            self.control_read(request_type, request, value, index, buf)?
        } else {
            self.control_write(request_type, request, value, index, buf)?
        };
        Ok(transferred)
    }
}
