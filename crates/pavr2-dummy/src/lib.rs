//! pavr2-dummy - In-memory programmer emulator for testing
//!
//! This crate emulates a Pololu USB AVR Programmer v2.1 behind the
//! [`Transport`] and [`DeviceHandle`] traits. It answers the same vendor
//! requests as the real firmware, keeps a log of every control transfer,
//! and can be unplugged, replugged or made to fail on command.
//!
//! [`DummyTransport`] is cheap to clone; every clone drives the same
//! emulated device, so a test can hand one clone to a
//! [`SessionManager`](pavr2_core::SessionManager) and keep another to
//! inspect and manipulate the device.

use std::cell::RefCell;
use std::rc::Rc;

use pavr2_core::error::{Error, Result};
use pavr2_core::protocol::*;
use pavr2_core::{DeviceDescriptor, DeviceHandle, Transport};

/// How the emulated firmware handles a request to restore defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreBehavior {
    /// Done by the first poll
    Immediate,
    /// Still busy for this many polls
    AfterPolls(u32),
    /// Never finishes and never touches the settings
    Never,
}

/// Configuration for the emulated programmer
#[derive(Debug, Clone)]
pub struct DummyConfig {
    pub product_id: u16,
    pub serial_number: String,
    /// BCD release number
    pub firmware_version: u16,
    /// Contents of the firmware modification string descriptor
    pub firmware_modification: String,
    /// Whether the programmer starts out plugged in
    pub present: bool,
    /// Whether an old pgm03a is also plugged in
    pub legacy_present: bool,
    pub restore: RestoreBehavior,
    /// Serial port names reported with the device; `None` emulates a port
    /// the OS has not bound a driver to
    pub programming_port: Option<String>,
    pub ttl_port: Option<String>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            product_id: USB_PRODUCT_ID_V2_1,
            serial_number: "00012345".to_string(),
            firmware_version: 0x0107,
            firmware_modification: "-".to_string(),
            present: true,
            legacy_present: false,
            restore: RestoreBehavior::AfterPolls(2),
            programming_port: Some("/dev/ttyDUMMY0".to_string()),
            ttl_port: Some("/dev/ttyDUMMY1".to_string()),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> std::result::Result<bool, String> {
    match value {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(format!("{}: {}", key, value)),
    }
}

/// Parse "1.07" into BCD 0x0107
fn parse_firmware_version(value: &str) -> Option<u16> {
    let (major, minor) = value.split_once('.')?;
    let major: u16 = major.parse().ok()?;
    let minor: u16 = minor.parse().ok()?;
    if major > 99 || minor > 99 {
        return None;
    }
    Some((major / 10) << 12 | (major % 10) << 8 | (minor / 10) << 4 | (minor % 10))
}

/// Parse options from key=value pairs
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<DummyConfig, String> {
    let mut config = DummyConfig::default();

    for (key, value) in options {
        match *key {
            "present" => config.present = parse_bool(key, value)?,
            "legacy" => config.legacy_present = parse_bool(key, value)?,
            "serial" => config.serial_number = value.to_string(),
            "firmware" => {
                config.firmware_version = parse_firmware_version(value)
                    .ok_or_else(|| format!("firmware: {}", value))?;
            }
            "modification" => config.firmware_modification = value.to_string(),
            "v2" => {
                if parse_bool(key, value)? {
                    config.product_id = USB_PRODUCT_ID_V2;
                }
            }
            "ports" => {
                if !parse_bool(key, value)? {
                    config.programming_port = None;
                    config.ttl_port = None;
                }
            }
            "restore" => {
                config.restore = match *value {
                    "immediate" => RestoreBehavior::Immediate,
                    "never" => RestoreBehavior::Never,
                    n => RestoreBehavior::AfterPolls(
                        n.parse().map_err(|_| format!("restore: {}", value))?,
                    ),
                };
            }
            _ => return Err(format!("unknown option: {}", key)),
        }
    }

    Ok(config)
}

/// Factory settings as stored in EEPROM
pub const FACTORY_SETTINGS: [u8; SETTING_COUNT] = [
    0,   // not initialized
    6,   // SCK duration
    8,   // ISP fastest period
    0,   // regulator mode: auto
    0,   // VCC output disabled
    0,   // indicator: blinking
    0,   // line A: none
    0,   // line B: none
    2,   // software version major
    10,  // software version minor
    15,  // hardware version
    0,   // reset polarity
    28,  // VCC/VDD max range: 896 mV
    84,  // VCC 3.3 V min: 2688 mV
    125, // VCC 3.3 V max: 4000 mV
    131, // VCC 5 V min: 4192 mV
    172, // VCC 5 V max: 5504 mV
];

/// Status after power-up with a 5 V target attached
pub const POWER_UP_VARIABLES: [u8; VARIABLE_COUNT] = [
    0,    // unused
    0,    // last reset: power-on
    0,    // programming error: none
    0xFF, // target VCC measured min: never measured
    0,    // target VCC measured max: never measured
    0xFF, // programmer VDD measured min: never measured
    0,    // programmer VDD measured max: never measured
    156,  // target VCC: 4992 mV
    157,  // programmer VDD: 5024 mV
    5,    // regulator level: 5 V
    0,    // not in programming mode
];

/// One control transfer seen by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

impl Transfer {
    /// Whether this is a SET_SETTING for `id`
    pub fn is_setting_write(&self, id: u8) -> bool {
        self.request_type == REQTYPE_VENDOR_OUT
            && self.request == REQUEST_SET_SETTING
            && self.index == id as u16
    }
}

/// State of the emulated programmer
#[derive(Debug)]
pub struct DummyProgrammer {
    config: DummyConfig,
    settings: [u8; SETTING_COUNT],
    variables: [u8; VARIABLE_COUNT],
    ports: [u8; 3],
    present: bool,
    legacy_present: bool,
    /// Bumped on every plug-in so each connection gets a new identity
    connection: u32,
    restore_polls_left: Option<u32>,
    fail_enumeration: bool,
    fail_transfers: bool,
    log: Vec<Transfer>,
}

impl DummyProgrammer {
    pub fn new(config: DummyConfig) -> Self {
        Self {
            present: config.present,
            legacy_present: config.legacy_present,
            config,
            settings: FACTORY_SETTINGS,
            variables: POWER_UP_VARIABLES,
            ports: [0; 3],
            connection: 1,
            restore_polls_left: None,
            fail_enumeration: false,
            fail_transfers: false,
            log: Vec::new(),
        }
    }

    fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            vendor_id: USB_VENDOR_ID,
            product_id: self.config.product_id,
            serial_number: self.config.serial_number.clone(),
            firmware_version: self.config.firmware_version,
            os_id: format!("dummy-{}", self.connection),
            programming_port: self.config.programming_port.clone(),
            ttl_port: self.config.ttl_port.clone(),
        }
    }

    fn string_descriptor(&self) -> Vec<u8> {
        let mut bytes = vec![0, USB_DESCRIPTOR_TYPE_STRING];
        for unit in self.config.firmware_modification.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes[0] = bytes.len() as u8;
        bytes
    }

    fn read_not_initialized(&mut self) -> u8 {
        match self.restore_polls_left {
            Some(0) => {
                self.settings = FACTORY_SETTINGS;
                self.restore_polls_left = None;
                0
            }
            Some(n) => {
                self.restore_polls_left = Some(n - 1);
                1
            }
            None => self.settings[SETTING_NOT_INITIALIZED as usize],
        }
    }

    fn write_setting(&mut self, id: usize, value: u8) {
        if id == SETTING_NOT_INITIALIZED as usize && value == 0xFF {
            log::debug!("dummy: restoring default settings");
            self.settings[id] = 1;
            self.restore_polls_left = match self.config.restore {
                RestoreBehavior::Immediate => Some(0),
                RestoreBehavior::AfterPolls(n) => Some(n),
                RestoreBehavior::Never => None,
            };
            return;
        }
        self.settings[id] = value;
    }

    fn transfer(
        &mut self,
        os_id: &str,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize> {
        // Attempts are logged even when they fail
        self.log.push(Transfer {
            request_type,
            request,
            value,
            index,
        });

        if !self.present || self.descriptor().os_id != os_id {
            return Err(Error::Transport("LIBUSB_ERROR_NO_DEVICE".to_string()));
        }
        if self.fail_transfers {
            return Err(Error::Transport("LIBUSB_ERROR_IO".to_string()));
        }

        let id = index as usize;
        match (request_type, request) {
            (REQTYPE_VENDOR_IN, REQUEST_GET_SETTING) if id < SETTING_COUNT && !buf.is_empty() => {
                buf[0] = if id == SETTING_NOT_INITIALIZED as usize {
                    self.read_not_initialized()
                } else {
                    self.settings[id]
                };
                Ok(1)
            }
            (REQTYPE_VENDOR_OUT, REQUEST_SET_SETTING) if id < SETTING_COUNT => {
                self.write_setting(id, value as u8);
                Ok(0)
            }
            (REQTYPE_VENDOR_IN, REQUEST_GET_VARIABLE)
                if (1..VARIABLE_COUNT).contains(&id) && !buf.is_empty() =>
            {
                buf[0] = self.variables[id];
                Ok(1)
            }
            (REQTYPE_VENDOR_IN, REQUEST_DIGITAL_READ) => {
                let len = buf.len().min(self.ports.len());
                buf[..len].copy_from_slice(&self.ports[..len]);
                Ok(len)
            }
            (REQTYPE_VENDOR_OUT, REQUEST_START_BOOTLOADER) => {
                log::debug!("dummy: entering bootloader");
                self.present = false;
                Ok(0)
            }
            (REQTYPE_STANDARD_IN, USB_REQUEST_GET_DESCRIPTOR)
                if value
                    == ((USB_DESCRIPTOR_TYPE_STRING as u16) << 8)
                        | FIRMWARE_MODIFICATION_STRING_INDEX as u16 =>
            {
                let descriptor = self.string_descriptor();
                let len = buf.len().min(descriptor.len());
                buf[..len].copy_from_slice(&descriptor[..len]);
                Ok(len)
            }
            _ => Err(Error::Transport("LIBUSB_ERROR_PIPE".to_string())),
        }
    }
}

/// Transport whose only device is an emulated programmer
#[derive(Debug, Clone)]
pub struct DummyTransport {
    state: Rc<RefCell<DummyProgrammer>>,
}

impl DummyTransport {
    pub fn new(config: DummyConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(DummyProgrammer::new(config))),
        }
    }

    /// Create a transport with one v2.1 programmer plugged in
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Disconnect the programmer from USB
    pub fn unplug(&self) {
        self.state.borrow_mut().present = false;
    }

    /// Connect the programmer. It gets a new identity token each time.
    pub fn plug_in(&self) {
        let mut state = self.state.borrow_mut();
        if !state.present {
            state.present = true;
            state.connection += 1;
        }
    }

    pub fn set_legacy_present(&self, present: bool) {
        self.state.borrow_mut().legacy_present = present;
    }

    /// Make enumeration fail
    pub fn set_fail_enumeration(&self, fail: bool) {
        self.state.borrow_mut().fail_enumeration = fail;
    }

    /// Make every control transfer fail
    pub fn set_fail_transfers(&self, fail: bool) {
        self.state.borrow_mut().fail_transfers = fail;
    }

    pub fn setting(&self, id: u8) -> u8 {
        self.state.borrow().settings[id as usize]
    }

    pub fn settings(&self) -> [u8; SETTING_COUNT] {
        self.state.borrow().settings
    }

    pub fn set_setting(&self, id: u8, value: u8) {
        self.state.borrow_mut().settings[id as usize] = value;
    }

    pub fn set_variable(&self, id: u8, value: u8) {
        self.state.borrow_mut().variables[id as usize] = value;
    }

    /// Set the raw states of ports A, B and C
    pub fn set_ports(&self, ports: [u8; 3]) {
        self.state.borrow_mut().ports = ports;
    }

    /// Transfers seen so far
    pub fn transfer_log(&self) -> Vec<Transfer> {
        self.state.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().log.clear();
    }
}

impl Transport for DummyTransport {
    fn list_devices(&mut self) -> Result<Vec<DeviceDescriptor>> {
        let state = self.state.borrow();
        if state.fail_enumeration {
            return Err(Error::Transport("LIBUSB_ERROR_IO".to_string()));
        }
        if state.present {
            Ok(vec![state.descriptor()])
        } else {
            Ok(Vec::new())
        }
    }

    fn legacy_device_present(&mut self) -> Result<bool> {
        Ok(self.state.borrow().legacy_present)
    }

    fn open(&mut self, device: &DeviceDescriptor) -> Result<Box<dyn DeviceHandle>> {
        let state = self.state.borrow();
        if !state.present || state.descriptor().os_id != device.os_id {
            return Err(Error::Transport("LIBUSB_ERROR_NO_DEVICE".to_string()));
        }
        log::debug!("dummy: opened {}", device.os_id);
        Ok(Box::new(DummyHandle {
            state: self.state.clone(),
            os_id: device.os_id.clone(),
        }))
    }
}

/// Open handle on the emulated programmer
pub struct DummyHandle {
    state: Rc<RefCell<DummyProgrammer>>,
    os_id: String,
}

impl DeviceHandle for DummyHandle {
    fn control_transfer(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize> {
        self.state
            .borrow_mut()
            .transfer(&self.os_id, request_type, request, value, index, buf)
    }
}

#[cfg(test)]
mod tests;
