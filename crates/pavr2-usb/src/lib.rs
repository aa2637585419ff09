//! pavr2-usb - USB transport for the Pololu USB AVR Programmer v2/v2.1
//!
//! Implements [`pavr2_core::Transport`] on top of nusb. The programmer is a
//! composite device; all configuration traffic is vendor control transfers
//! on the device, addressed through interface 0.
//!
//! Supported devices (VID 0x1FFB):
//! - 0x00B0: Pololu USB AVR Programmer v2
//! - 0x00BB: Pololu USB AVR Programmer v2.1
//!
//! The older pgm03a (PID 0x0081) is only detected, never opened.
//!
//! Serial port names for the programming and TTL ports come from
//! `serialport` and are matched to devices by serial number.
//!
//! # Example
//!
//! ```no_run
//! use pavr2_core::{EventLog, SessionConfig, SessionManager};
//! use pavr2_usb::UsbTransport;
//!
//! let mut session = SessionManager::new(UsbTransport::new(), EventLog::default(), SessionConfig::default());
//! session.start();
//! println!("{:?}", session.state());
//! ```

mod device;
mod error;
mod ports;

pub use device::{UsbHandle, UsbTransport, TRANSFER_TIMEOUT};
pub use error::{Result, UsbError};
pub use ports::{
    assign_ports, programmer_ports, PortNames, ProgrammerPort, PROGRAMMING_PORT_INTERFACE,
    TTL_PORT_INTERFACE,
};
