//! Native USB protocol constants and field types
//!
//! Based on the vendor protocol of the Pololu USB AVR Programmer v2 (pgm04a)
//! and v2.1 (pgm04b). Every setting and variable is a single byte addressed
//! by a small id and accessed with a vendor control transfer.

use core::fmt;

// USB device identifiers
pub const USB_VENDOR_ID: u16 = 0x1FFB;
pub const USB_PRODUCT_ID_V2: u16 = 0x00B0;
pub const USB_PRODUCT_ID_V2_1: u16 = 0x00BB;

/// The older pgm03a programmer, which this software does not support
pub const USB_PRODUCT_ID_PGM03A: u16 = 0x0081;

// USB request types
pub const REQTYPE_VENDOR_IN: u8 = 0xC0; // IN | VENDOR | DEVICE
pub const REQTYPE_VENDOR_OUT: u8 = 0x40; // OUT | VENDOR | DEVICE
pub const REQTYPE_STANDARD_IN: u8 = 0x80; // IN | STANDARD | DEVICE

// Vendor requests
pub const REQUEST_GET_SETTING: u8 = 0x81;
pub const REQUEST_SET_SETTING: u8 = 0x82;
pub const REQUEST_GET_VARIABLE: u8 = 0x83;
pub const REQUEST_DIGITAL_READ: u8 = 0x84;
pub const REQUEST_START_BOOTLOADER: u8 = 0xFF;

// Standard requests (USB 2.0 Table 9-4 / 9-5)
pub const USB_REQUEST_GET_DESCRIPTOR: u8 = 6;
pub const USB_DESCRIPTOR_TYPE_STRING: u8 = 3;

/// String descriptor holding the firmware modification code
pub const FIRMWARE_MODIFICATION_STRING_INDEX: u8 = 6;

/// Highest firmware major version this software understands
pub const FIRMWARE_VERSION_MAJOR_MAX: u8 = 1;

// Setting ids
pub const SETTING_NOT_INITIALIZED: u8 = 0;
pub const SETTING_SCK_DURATION: u8 = 1;
pub const SETTING_ISP_FASTEST_PERIOD: u8 = 2;
pub const SETTING_REGULATOR_MODE: u8 = 3;
pub const SETTING_VCC_OUTPUT_ENABLED: u8 = 4;
pub const SETTING_VCC_OUTPUT_INDICATOR: u8 = 5;
pub const SETTING_LINE_A_FUNCTION: u8 = 6;
pub const SETTING_LINE_B_FUNCTION: u8 = 7;
pub const SETTING_SOFTWARE_VERSION_MAJOR: u8 = 8;
pub const SETTING_SOFTWARE_VERSION_MINOR: u8 = 9;
pub const SETTING_HARDWARE_VERSION: u8 = 10;
pub const SETTING_RESET_POLARITY: u8 = 11;
pub const SETTING_VCC_VDD_MAX_RANGE: u8 = 12;
pub const SETTING_VCC_3V3_MIN: u8 = 13;
pub const SETTING_VCC_3V3_MAX: u8 = 14;
pub const SETTING_VCC_5V_MIN: u8 = 15;
pub const SETTING_VCC_5V_MAX: u8 = 16;

/// Number of setting ids (0..=16)
pub const SETTING_COUNT: usize = 17;

// Variable ids
pub const VARIABLE_LAST_DEVICE_RESET: u8 = 1;
pub const VARIABLE_PROGRAMMING_ERROR: u8 = 2;
pub const VARIABLE_TARGET_VCC_MEASURED_MIN: u8 = 3;
pub const VARIABLE_TARGET_VCC_MEASURED_MAX: u8 = 4;
pub const VARIABLE_PROGRAMMER_VDD_MEASURED_MIN: u8 = 5;
pub const VARIABLE_PROGRAMMER_VDD_MEASURED_MAX: u8 = 6;
pub const VARIABLE_TARGET_VCC: u8 = 7;
pub const VARIABLE_PROGRAMMER_VDD: u8 = 8;
pub const VARIABLE_REGULATOR_LEVEL: u8 = 9;
pub const VARIABLE_IN_PROGRAMMING_MODE: u8 = 10;

/// Number of variable slots (ids 1..=10, slot 0 unused)
pub const VARIABLE_COUNT: usize = 11;

/// Smallest allowed ISP_FASTEST_PERIOD. Lower values behave like 2 (6 MHz).
pub const ISP_FASTEST_PERIOD_MIN: u32 = 2;

/// Largest allowed ISP_FASTEST_PERIOD. Anything slower than SCK_DURATION=1
/// would make "max frequency" a misnomer.
pub const ISP_FASTEST_PERIOD_MAX: u32 = 26;

/// Millivolts per raw voltage unit
pub const VOLTAGE_UNITS: u32 = 32;

/// Largest voltage a single raw byte can hold (8160 mV)
pub const MAX_REPRESENTABLE_VOLTAGE: u32 = 255 * VOLTAGE_UNITS;

/// Decode a raw voltage byte to millivolts
#[inline]
pub const fn raw_to_mv(raw: u8) -> u32 {
    raw as u32 * VOLTAGE_UNITS
}

/// Encode millivolts as a raw voltage byte
///
/// Rounds to the nearest unit (exact halves round up) and saturates at 255.
#[inline]
pub fn mv_to_raw(mv: u32) -> u8 {
    let units = mv.saturating_add(VOLTAGE_UNITS / 2) / VOLTAGE_UNITS;
    units.min(0xFF) as u8
}

/// Regulator mode (policy that decides the regulator level)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegulatorMode {
    #[default]
    Auto = 0,
    V3_3 = 3,
    V5 = 5,
}

impl RegulatorMode {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(RegulatorMode::Auto),
            3 => Some(RegulatorMode::V3_3),
            5 => Some(RegulatorMode::V5),
            _ => None,
        }
    }

    /// Parse a user-supplied mode ("auto", "3.3", "3v3", "5V", ...)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(' ', "").as_str() {
            "auto" | "0" => Some(RegulatorMode::Auto),
            "3.3" | "3.3v" | "3v3" | "3" => Some(RegulatorMode::V3_3),
            "5" | "5v" => Some(RegulatorMode::V5),
            _ => None,
        }
    }
}

impl fmt::Display for RegulatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegulatorMode::Auto => write!(f, "auto"),
            RegulatorMode::V3_3 => write!(f, "3.3 V"),
            RegulatorMode::V5 => write!(f, "5 V"),
        }
    }
}

/// Describe a raw regulator level reading. Levels are a subset of the modes.
pub fn regulator_level_name(level: u8) -> String {
    RegulatorMode::from_raw(level)
        .unwrap_or_default()
        .to_string()
}

/// How the programmer's LEDs show that VCC is being driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VccOutputIndicator {
    #[default]
    Blinking,
    Steady,
}

impl VccOutputIndicator {
    pub fn from_raw(raw: u8) -> Self {
        if raw != 0 {
            VccOutputIndicator::Steady
        } else {
            VccOutputIndicator::Blinking
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            VccOutputIndicator::Blinking => 0,
            VccOutputIndicator::Steady => 1,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "blinking" | "blink" | "0" => Some(VccOutputIndicator::Blinking),
            "steady" | "1" => Some(VccOutputIndicator::Steady),
            _ => None,
        }
    }
}

impl fmt::Display for VccOutputIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VccOutputIndicator::Blinking => write!(f, "blinking"),
            VccOutputIndicator::Steady => write!(f, "steady"),
        }
    }
}

/// Function assigned to the programmer's A and B lines
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFunction {
    Nothing = 0,
    /// DB9 pin 4, output, Data Terminal Ready
    Dtr = 1,
    /// DB9 pin 7, output, Request to Send
    Rts = 2,
    /// DB9 pin 1, input, Carrier Detect
    Cd = 3,
    /// DB9 pin 6, input, Data Set Ready
    Dsr = 4,
    /// Clock output (line B only)
    Clock = 5,
    /// Open drain output, pulses low when DTR gets asserted
    DtrReset = 6,
}

impl LineFunction {
    pub const MAX: u8 = LineFunction::DtrReset as u8;

    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(LineFunction::Nothing),
            1 => Some(LineFunction::Dtr),
            2 => Some(LineFunction::Rts),
            3 => Some(LineFunction::Cd),
            4 => Some(LineFunction::Dsr),
            5 => Some(LineFunction::Clock),
            6 => Some(LineFunction::DtrReset),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "none" | "nothing" => Some(LineFunction::Nothing),
            "dtr" => Some(LineFunction::Dtr),
            "rts" => Some(LineFunction::Rts),
            "cd" => Some(LineFunction::Cd),
            "dsr" => Some(LineFunction::Dsr),
            "clock" => Some(LineFunction::Clock),
            "dtrreset" => Some(LineFunction::DtrReset),
            other => other.parse().ok().and_then(Self::from_raw),
        }
    }
}

/// Describe a raw line function byte
pub fn line_function_name(raw: u8) -> &'static str {
    match LineFunction::from_raw(raw) {
        Some(LineFunction::Dtr) => "DTR",
        Some(LineFunction::Rts) => "RTS",
        Some(LineFunction::Cd) => "CD",
        Some(LineFunction::Dsr) => "DSR",
        Some(LineFunction::Clock) => "Clock",
        Some(LineFunction::DtrReset) => "DTR reset",
        Some(LineFunction::Nothing) | None => "None",
    }
}

// Causes of programmer resets
pub const RESET_POWER_UP: u8 = 0;
pub const RESET_BROWNOUT: u8 = 1;
pub const RESET_RESET_LINE: u8 = 2;
pub const RESET_WATCHDOG: u8 = 4;
pub const RESET_SOFTWARE: u8 = 8;
pub const RESET_STACK_OVERFLOW: u8 = 16;
pub const RESET_STACK_UNDERFLOW: u8 = 32;

/// Describe the cause of the last programmer reset
pub fn device_reset_name(reset: u8) -> String {
    match reset {
        RESET_POWER_UP => "Power-on reset".to_string(),
        RESET_BROWNOUT => "Brown-out reset".to_string(),
        RESET_RESET_LINE => "Reset pin driven low".to_string(),
        RESET_WATCHDOG => "Watchdog reset".to_string(),
        RESET_SOFTWARE => "Software reset (bootloader)".to_string(),
        RESET_STACK_OVERFLOW => "Stack overflow".to_string(),
        RESET_STACK_UNDERFLOW => "Stack underflow".to_string(),
        other => format!("Unknown code {}.", other),
    }
}

// Programming errors
pub const PROGRAMMING_ERROR_TARGET_POWER_BAD: u8 = 1;
pub const PROGRAMMING_ERROR_SYNCH: u8 = 2;
pub const PROGRAMMING_ERROR_IDLE_FOR_TOO_LONG: u8 = 3;
pub const PROGRAMMING_ERROR_USB_NOT_CONFIGURED: u8 = 4;
pub const PROGRAMMING_ERROR_USB_SUSPEND: u8 = 5;
pub const PROGRAMMING_ERROR_PROGRAMMER_POWER_BAD: u8 = 6;

/// One-line description of a programming error code
pub fn programming_error_short(code: u8) -> String {
    match code {
        0 => "No error.".to_string(),
        PROGRAMMING_ERROR_TARGET_POWER_BAD => "Target power error.".to_string(),
        PROGRAMMING_ERROR_SYNCH => "Initial SPI command failed.".to_string(),
        PROGRAMMING_ERROR_IDLE_FOR_TOO_LONG => "Idle error.".to_string(),
        PROGRAMMING_ERROR_USB_NOT_CONFIGURED => "USB not configured.".to_string(),
        PROGRAMMING_ERROR_USB_SUSPEND => "USB suspended.".to_string(),
        PROGRAMMING_ERROR_PROGRAMMER_POWER_BAD => "Programmer power error.".to_string(),
        other => format!("Unknown code {}.", other),
    }
}

/// Longer explanation of a programming error code (empty if none)
pub fn programming_error_long(code: u8) -> &'static str {
    match code {
        PROGRAMMING_ERROR_TARGET_POWER_BAD => {
            "Target VCC went outside of the allowed range, so programming was aborted.  \
             Make sure that the target is powered on and its batteries are not too low \
             (if applicable)."
        }
        PROGRAMMING_ERROR_SYNCH => {
            "The SPI command for entering programming mode was sent, but the expected \
             response from the target was not received.  Make sure that the ISP frequency \
             is less than one sixth of the target's clock frequency."
        }
        PROGRAMMING_ERROR_IDLE_FOR_TOO_LONG => {
            "The programmer received no programming commands from the computer for a time \
             longer than the timeout period, so programming was aborted."
        }
        PROGRAMMING_ERROR_USB_NOT_CONFIGURED => {
            "The computer's USB controller deconfigured the programmer, so programming was \
             aborted."
        }
        PROGRAMMING_ERROR_USB_SUSPEND => {
            "The computer's USB controller put the programmer into suspend mode, so \
             programming was aborted."
        }
        PROGRAMMING_ERROR_PROGRAMMER_POWER_BAD => {
            "The programmer's VDD either went too low or had too much range, so programming \
             was aborted."
        }
        _ => "",
    }
}

/// Product name for a USB product id
pub fn product_name(product_id: u16) -> &'static str {
    match product_id {
        USB_PRODUCT_ID_V2 => "Pololu USB AVR Programmer v2",
        USB_PRODUCT_ID_V2_1 => "Pololu USB AVR Programmer v2.1",
        _ => "Pololu USB AVR Programmer v2.x?",
    }
}

/// Shown once at start-up when only a pgm03a is plugged in
pub const PGM03A_MESSAGE: &str = "This utility only supports the Pololu USB AVR Programmer v2 \
     and v2.1 (blue-colored, labeled \"pgm04a\" or \"pgm04b\").\n\
     \n\
     It looks you have an older programmer, the Pololu USB AVR Programmer (pgm03a).  \
     You can find documentation and software for the older programmer here:\n\
     \n\
     https://www.pololu.com/docs/0J36";
