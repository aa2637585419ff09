//! pavr2-core - Core library for the Pololu USB AVR Programmer v2/v2.1
//!
//! This crate knows how to talk to the programmer but not how to reach it.
//! USB access comes from a [`transport::Transport`] implementation in a
//! separate crate (`pavr2-usb` for real hardware, `pavr2-dummy` for an
//! in-memory emulator).
//!
//! - [`frequency`]: conversion between raw clock settings and kHz names
//! - [`programmer`]: raw setting/variable access on an open device
//! - [`settings`]: settings record, validation and device synchronization
//! - [`variables`]: status snapshot
//! - [`session`]: connection lifecycle, the single error-reporting boundary
//! - [`scheduler`]: periodic driver for the session

pub mod config;
pub mod error;
pub mod frequency;
pub mod programmer;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod transport;
pub mod variables;

pub use config::{RestoreTiming, SessionConfig, FIRST_DEVICE_INDEX};
pub use error::{Error, Result, ValidationError};
pub use programmer::{DigitalReadings, Programmer};
pub use scheduler::Scheduler;
pub use session::{
    ConnectionState, DisconnectReason, EventLog, SessionEvent, SessionManager, SessionObserver,
};
pub use settings::Settings;
pub use transport::{DeviceDescriptor, DeviceHandle, Transport};
pub use variables::Variables;
