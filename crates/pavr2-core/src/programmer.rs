//! Open programmer handle
//!
//! [`Programmer`] wraps a transport-level [`DeviceHandle`] with the raw
//! single-byte setting and variable accessors. The settings synchronizer
//! (`settings.rs`) and variable reader (`variables.rs`) build on these.

use crate::error::{Error, Result};
use crate::protocol::*;
use crate::transport::{DeviceDescriptor, DeviceHandle, Transport};

/// Raw states of the AVR I/O ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DigitalReadings {
    pub port_a: u8,
    pub port_b: u8,
    pub port_c: u8,
}

/// An open Pololu USB AVR Programmer v2/v2.1
pub struct Programmer {
    handle: Box<dyn DeviceHandle>,
    device: DeviceDescriptor,
    cached_firmware_version: Option<String>,
}

impl Programmer {
    /// Open a device, refusing firmware newer than this software supports
    pub fn open<T: Transport + ?Sized>(transport: &mut T, device: &DeviceDescriptor) -> Result<Self> {
        let major = device.firmware_version_major();
        if major > FIRMWARE_VERSION_MAJOR_MAX {
            return Err(Error::UnsupportedFirmware { major });
        }

        log::info!(
            "Opening {} (serial {}, firmware {})",
            device.name(),
            device.serial_number,
            device.firmware_version_string()
        );

        let handle = transport.open(device)?;
        Ok(Self::from_handle(handle, device.clone()))
    }

    /// Wrap an already open handle
    pub fn from_handle(handle: Box<dyn DeviceHandle>, device: DeviceDescriptor) -> Self {
        Self {
            handle,
            device,
            cached_firmware_version: None,
        }
    }

    /// The device this handle was opened for
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    fn read_exact(
        &mut self,
        context: &'static str,
        request: u8,
        index: u16,
        buf: &mut [u8],
    ) -> Result<()> {
        let transferred = self
            .handle
            .control_transfer(REQTYPE_VENDOR_IN, request, 0, index, buf)
            .map_err(|e| Error::transport(context, e))?;
        log::trace!(
            "IN  req=0x{:02X} index={} -> {:02X?}",
            request,
            index,
            &buf[..transferred.min(buf.len())]
        );

        if transferred != buf.len() {
            return Err(Error::Protocol {
                context,
                expected: buf.len(),
                actual: transferred,
            });
        }
        Ok(())
    }

    /// Read one setting byte
    pub fn get_raw_setting(&mut self, id: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        self.read_exact(
            "Failed to read a setting.",
            REQUEST_GET_SETTING,
            id as u16,
            &mut value,
        )?;
        Ok(value[0])
    }

    /// Write one setting byte
    pub fn set_raw_setting(&mut self, id: u8, value: u8) -> Result<()> {
        log::trace!("OUT req=0x{:02X} index={} value={}", REQUEST_SET_SETTING, id, value);
        self.handle
            .control_transfer(
                REQTYPE_VENDOR_OUT,
                REQUEST_SET_SETTING,
                value as u16,
                id as u16,
                &mut [],
            )
            .map_err(|e| Error::transport("Failed to set a setting.", e))?;
        Ok(())
    }

    /// Read one variable byte
    pub fn get_raw_variable(&mut self, id: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        self.read_exact(
            "Failed to get a variable.",
            REQUEST_GET_VARIABLE,
            id as u16,
            &mut value,
        )?;
        Ok(value[0])
    }

    /// Read the raw states of ports A, B and C
    pub fn digital_read(&mut self) -> Result<DigitalReadings> {
        let mut buf = [0u8; 3];
        self.read_exact(
            "Failed to read the digital inputs.",
            REQUEST_DIGITAL_READ,
            0,
            &mut buf,
        )?;
        Ok(DigitalReadings {
            port_a: buf[0],
            port_b: buf[1],
            port_c: buf[2],
        })
    }

    /// Ask the programmer to reset into its bootloader. The device
    /// disconnects from USB afterwards.
    pub fn start_bootloader(&mut self) -> Result<()> {
        self.handle
            .control_transfer(REQTYPE_VENDOR_OUT, REQUEST_START_BOOTLOADER, 0, 0, &mut [])
            .map_err(|e| Error::transport("Failed to start the bootloader.", e))?;
        Ok(())
    }

    /// Firmware version plus modification code (e.g. "1.07nc")
    ///
    /// The modification code comes from a string descriptor. If that read
    /// fails, or returns less than the descriptor's length, the version gets
    /// a "?" suffix instead. The result is cached for the lifetime of the
    /// handle.
    pub fn firmware_version_string(&mut self) -> Result<String> {
        if let Some(version) = &self.cached_firmware_version {
            return Ok(version.clone());
        }

        let mut version = self.device.firmware_version_string();

        let mut buf = [0u8; 64];
        let value =
            ((USB_DESCRIPTOR_TYPE_STRING as u16) << 8) | FIRMWARE_MODIFICATION_STRING_INDEX as u16;
        match self.handle.control_transfer(
            REQTYPE_STANDARD_IN,
            USB_REQUEST_GET_DESCRIPTOR,
            value,
            0,
            &mut buf,
        ) {
            Ok(transferred) => {
                let transferred = transferred.min(buf.len());
                if transferred >= 1 && (buf[0] as usize) > transferred {
                    log::debug!(
                        "Firmware modification string truncated: {} of {} bytes",
                        transferred,
                        buf[0]
                    );
                    version.push('?');
                } else {
                    let modification = decode_string_descriptor(&buf[..transferred]);
                    if modification != "-" {
                        version.push_str(&modification);
                    }
                }
            }
            Err(e) => {
                log::debug!("Failed to get firmware modification string: {}", e);
                version.push('?');
            }
        }

        self.cached_firmware_version = Some(version.clone());
        Ok(version)
    }
}

/// Decode the UTF-16LE payload of a USB string descriptor
fn decode_string_descriptor(descriptor: &[u8]) -> String {
    let units: Vec<u16> = descriptor
        .get(2..)
        .unwrap_or_default()
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Minimal scripted device for unit tests

    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Transfer {
        pub request_type: u8,
        pub request: u8,
        pub value: u16,
        pub index: u16,
    }

    #[derive(Default)]
    pub struct Registers {
        pub settings: [u8; SETTING_COUNT],
        pub variables: [u8; VARIABLE_COUNT],
        pub log: Vec<Transfer>,
        pub fail_setting_read: Option<u8>,
        pub short_reads: bool,
        pub descriptor: Option<Vec<u8>>,
    }

    pub struct FakeHandle(pub Rc<RefCell<Registers>>);

    impl DeviceHandle for FakeHandle {
        fn control_transfer(
            &mut self,
            request_type: u8,
            request: u8,
            value: u16,
            index: u16,
            buf: &mut [u8],
        ) -> Result<usize> {
            let mut regs = self.0.borrow_mut();
            regs.log.push(Transfer {
                request_type,
                request,
                value,
                index,
            });
            if regs.short_reads && request_type & 0x80 != 0 {
                return Ok(0);
            }
            match request {
                REQUEST_GET_SETTING => {
                    if regs.fail_setting_read == Some(index as u8) {
                        return Err(Error::Transport("LIBUSB_ERROR_PIPE".to_string()));
                    }
                    buf[0] = regs.settings[index as usize];
                    Ok(1)
                }
                REQUEST_SET_SETTING => {
                    regs.settings[index as usize] = value as u8;
                    Ok(0)
                }
                REQUEST_GET_VARIABLE => {
                    buf[0] = regs.variables[index as usize];
                    Ok(1)
                }
                REQUEST_DIGITAL_READ => {
                    buf[..3].copy_from_slice(&[0x12, 0x34, 0x56]);
                    Ok(3)
                }
                USB_REQUEST_GET_DESCRIPTOR => match &regs.descriptor {
                    Some(d) => {
                        buf[..d.len()].copy_from_slice(d);
                        Ok(d.len())
                    }
                    None => Err(Error::Transport("LIBUSB_ERROR_TIMEOUT".to_string())),
                },
                _ => Ok(0),
            }
        }
    }

    pub fn programmer() -> (Programmer, Rc<RefCell<Registers>>) {
        let regs = Rc::new(RefCell::new(Registers::default()));
        let device = DeviceDescriptor {
            vendor_id: USB_VENDOR_ID,
            product_id: USB_PRODUCT_ID_V2,
            serial_number: "00ABCDEF".to_string(),
            firmware_version: 0x0107,
            os_id: "test".to_string(),
            programming_port: None,
            ttl_port: None,
        };
        let programmer = Programmer::from_handle(Box::new(FakeHandle(regs.clone())), device);
        (programmer, regs)
    }
}
