//! Connection lifecycle of a single programmer
//!
//! [`SessionManager`] owns the transport, the open [`Programmer`] (if any)
//! and the cached settings, variables and firmware string. It is the only
//! place where [`Error`]s turn into user-facing text: every public
//! operation reports failures through the [`SessionObserver`] as
//! `"<context>  <error>"` and never returns them.
//!
//! Background work ([`SessionManager::update`]) keeps quiet about
//! enumeration failures; explicit user operations always report.

use crate::config::{SessionConfig, FIRST_DEVICE_INDEX};
use crate::error::Error;
use crate::programmer::{DigitalReadings, Programmer};
use crate::protocol::PGM03A_MESSAGE;
use crate::settings::Settings;
use crate::transport::{DeviceDescriptor, Transport};
use crate::variables::Variables;

/// Why no device is connected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Not connected yet, or nothing to connect to. Auto-reconnect is armed.
    Clean,
    /// The connection failed or was lost
    Error(String),
    /// The user asked to disconnect
    UserInitiated,
}

/// Connection state as seen by presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected(DisconnectReason),
}

/// Receives coarse change notifications and user-facing messages
///
/// The change signals carry no data; the receiver reads whatever it cares
/// about back from the manager.
pub trait SessionObserver {
    /// Connection state or device identity changed
    fn device_changed(&mut self) {}
    fn variables_changed(&mut self) {}
    fn settings_changed(&mut self) {}
    fn show_error(&mut self, message: &str);
    fn show_warning(&mut self, message: &str);
    fn show_info(&mut self, message: &str);
}

/// Observer notifications, as recorded by [`EventLog`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    DeviceChanged,
    VariablesChanged,
    SettingsChanged,
    Error(String),
    Warning(String),
    Info(String),
}

/// Observer that records every notification in order
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<SessionEvent>,
}

impl EventLog {
    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            SessionEvent::Error(message) => Some(message.as_str()),
            _ => None,
        })
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            SessionEvent::Warning(message) => Some(message.as_str()),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl SessionObserver for EventLog {
    fn device_changed(&mut self) {
        self.events.push(SessionEvent::DeviceChanged);
    }

    fn variables_changed(&mut self) {
        self.events.push(SessionEvent::VariablesChanged);
    }

    fn settings_changed(&mut self) {
        self.events.push(SessionEvent::SettingsChanged);
    }

    fn show_error(&mut self, message: &str) {
        self.events.push(SessionEvent::Error(message.to_string()));
    }

    fn show_warning(&mut self, message: &str) {
        self.events.push(SessionEvent::Warning(message.to_string()));
    }

    fn show_info(&mut self, message: &str) {
        self.events.push(SessionEvent::Info(message.to_string()));
    }
}

/// Owns the connection to one programmer and everything cached from it
pub struct SessionManager<T: Transport, O: SessionObserver> {
    transport: T,
    observer: O,
    config: SessionConfig,

    device_list: Vec<DeviceDescriptor>,
    programmer: Option<Programmer>,
    connection_error: Option<String>,
    disconnected_by_user: bool,

    settings: Settings,
    settings_modified: bool,
    variables: Variables,
    variables_update_failed: bool,
    firmware_version: String,
}

impl<T: Transport, O: SessionObserver> SessionManager<T, O> {
    pub fn new(transport: T, observer: O, config: SessionConfig) -> Self {
        Self {
            transport,
            observer,
            config,
            device_list: Vec::new(),
            programmer: None,
            connection_error: None,
            disconnected_by_user: false,
            settings: Settings::default(),
            settings_modified: false,
            variables: Variables::default(),
            variables_update_failed: false,
            firmware_version: String::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.programmer.is_some() {
            ConnectionState::Connected
        } else if let Some(message) = &self.connection_error {
            ConnectionState::Disconnected(DisconnectReason::Error(message.clone()))
        } else if self.disconnected_by_user {
            ConnectionState::Disconnected(DisconnectReason::UserInitiated)
        } else {
            ConnectionState::Disconnected(DisconnectReason::Clean)
        }
    }

    pub fn connected(&self) -> bool {
        self.programmer.is_some()
    }

    /// The connected device
    pub fn device(&self) -> Option<&DeviceDescriptor> {
        self.programmer.as_ref().map(|p| p.device())
    }

    /// Devices seen by the latest successful enumeration
    pub fn device_list(&self) -> &[DeviceDescriptor] {
        &self.device_list
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether the cached settings differ from (or could not be read from)
    /// the device
    pub fn settings_modified(&self) -> bool {
        self.settings_modified
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Whether the latest variables read failed, leaving a stale snapshot
    pub fn variables_update_failed(&self) -> bool {
        self.variables_update_failed
    }

    pub fn firmware_version(&self) -> &str {
        &self.firmware_version
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Connect to the first programmer if there is one. With none plugged
    /// in, warn once if only an older unsupported model is present.
    pub fn start(&mut self) {
        if !self.update_device_list_or_report() {
            self.observer.device_changed();
            return;
        }

        if !self.device_list.is_empty() {
            self.really_connect();
            return;
        }

        match self.transport.legacy_device_present() {
            Ok(true) => self.observer.show_warning(PGM03A_MESSAGE),
            Ok(false) => {}
            Err(e) => self.report("There was an error checking for older programmers.", &e),
        }
        self.observer.device_changed();
    }

    /// Explicit connect request
    pub fn connect(&mut self) {
        if self.connected() {
            return;
        }

        if !self.update_device_list_or_report() {
            self.observer.device_changed();
            return;
        }

        if self.device_list.is_empty() {
            self.observer.show_error(
                "No programmer was found.  \
                 Please verify that the programmer is connected to the computer via USB.",
            );
            return;
        }

        self.really_connect();
    }

    /// Explicit disconnect request. Auto-reconnect stays off until the
    /// next [`connect`](Self::connect).
    pub fn disconnect(&mut self) {
        if !self.connected() {
            return;
        }

        self.close();
        self.disconnected_by_user = true;
        self.connection_error = None;
        log::info!("Disconnected by user");
        self.observer.device_changed();
    }

    /// Periodic tick: watch for the device going away, refresh variables,
    /// and reconnect automatically when that is allowed
    pub fn update(&mut self) {
        if self.connected() {
            // A failed enumeration keeps the previous list; the device may
            // still be usable.
            self.update_device_list_quietly();

            if self.current_device_present() {
                if let Err(e) = self.load_variables() {
                    log::debug!("Failed to refresh variables: {}", e);
                }
                self.observer.variables_changed();
            } else {
                log::warn!("The connection to the device was lost");
                self.close();
                self.connection_error = Some("The connection to the device was lost.".to_string());
                self.observer.device_changed();
            }
            return;
        }

        if self.connection_error.is_some() || self.disconnected_by_user {
            return;
        }

        if self.update_device_list_quietly() && !self.device_list.is_empty() {
            self.really_connect();
        }
    }

    /// Whether the application may exit without losing edits
    pub fn exit(&self) -> bool {
        !(self.connected() && self.settings_modified)
    }

    /// Discard local edits and read the settings again
    pub fn reload_settings(&mut self) {
        if !self.connected() {
            return;
        }

        if let Err(e) = self.load_settings() {
            self.report("There was an error loading the settings from the device.", &e);
        }
        self.observer.settings_changed();
    }

    /// Write the local settings to the device
    pub fn apply_settings(&mut self) {
        let Some(programmer) = self.programmer.as_mut() else {
            return;
        };

        match programmer.apply_settings(&self.settings) {
            Ok(()) => {
                self.settings_modified = false;
                log::info!("Settings applied");
            }
            Err(e) => self.report("There was an error applying settings.", &e),
        }
        self.observer.settings_changed();
    }

    /// Reset the device to factory settings and reload them
    pub fn restore_default_settings(&mut self) {
        let Some(programmer) = self.programmer.as_mut() else {
            return;
        };

        let restored = programmer.restore_defaults(&self.config.restore);
        if let Err(e) = &restored {
            self.report("There was an error resetting to the default settings.", e);
        }

        // Reload even on failure; the device may be partway through.
        self.reload_settings();

        if restored.is_ok() {
            self.observer
                .show_info("Your device's settings have been reset to their default values.");
        }
    }

    /// Select an ISP frequency by display name (without unit)
    pub fn set_isp_frequency(&mut self, name: &str) {
        if !self.connected() {
            return;
        }

        match self.settings.set_isp_frequency(name) {
            Ok(()) => self.settings_modified = true,
            Err(e) => self.report("There was an error setting the ISP frequency.", &e),
        }
        self.observer.settings_changed();
    }

    /// Select a max ISP frequency by display name (without unit)
    pub fn set_max_isp_frequency(&mut self, name: &str) {
        if !self.connected() {
            return;
        }

        match self.settings.set_max_isp_frequency(name) {
            Ok(()) => self.settings_modified = true,
            Err(e) => self.report("There was an error setting the maximum ISP frequency.", &e),
        }
        self.observer.settings_changed();
    }

    /// Edit the local settings. Nothing is written until
    /// [`apply_settings`](Self::apply_settings).
    pub fn edit_settings<F: FnOnce(&mut Settings)>(&mut self, edit: F) {
        if !self.connected() {
            return;
        }

        edit(&mut self.settings);
        self.settings_modified = true;
        self.observer.settings_changed();
    }

    /// Read the raw states of the I/O ports
    pub fn digital_read(&mut self) -> Option<DigitalReadings> {
        let programmer = self.programmer.as_mut()?;

        match programmer.digital_read() {
            Ok(readings) => Some(readings),
            Err(e) => {
                self.report("There was an error reading the digital inputs.", &e);
                None
            }
        }
    }

    /// Reset the programmer into its bootloader
    ///
    /// The device leaves USB right away, so the session is closed as if
    /// the user had disconnected.
    pub fn start_bootloader(&mut self) {
        let Some(programmer) = self.programmer.as_mut() else {
            return;
        };

        match programmer.start_bootloader() {
            Ok(()) => {
                log::info!("Bootloader started");
                self.close();
                self.disconnected_by_user = true;
                self.connection_error = None;
                self.observer.device_changed();
            }
            Err(e) => self.report("There was an error starting the bootloader.", &e),
        }
    }

    fn report(&mut self, context: &str, error: &Error) {
        let message = format!("{}  {}", context, error);
        log::debug!("{}", message);
        self.observer.show_error(&message);
    }

    fn close(&mut self) {
        if let Some(programmer) = self.programmer.take() {
            log::debug!("Closing {}", programmer.device().os_id);
        }
        self.settings_modified = false;
    }

    fn current_device_present(&self) -> bool {
        match self.device() {
            Some(current) => self.device_list.iter().any(|d| d.same_device(current)),
            None => false,
        }
    }

    /// Enumerate for an explicit operation, reporting failure
    fn update_device_list_or_report(&mut self) -> bool {
        match self.transport.list_devices() {
            Ok(list) => {
                self.device_list = list;
                true
            }
            Err(e) => {
                self.connection_error = Some("Failed to get the list of devices.".to_string());
                self.report("There was an error getting the list of devices.", &e);
                false
            }
        }
    }

    /// Enumerate in the background, logging failure only
    fn update_device_list_quietly(&mut self) -> bool {
        match self.transport.list_devices() {
            Ok(list) => {
                self.device_list = list;
                true
            }
            Err(e) => {
                log::debug!("Background device enumeration failed: {}", e);
                false
            }
        }
    }

    fn really_connect(&mut self) {
        let Some(device) = self.device_list.get(FIRST_DEVICE_INDEX).cloned() else {
            return;
        };

        self.close();
        self.connection_error = None;
        self.disconnected_by_user = false;

        match Programmer::open(&mut self.transport, &device) {
            Ok(programmer) => self.programmer = Some(programmer),
            Err(e) => {
                self.connection_error = Some("Failed to connect to device.".to_string());
                self.report("There was an error connecting to the device.", &e);
                self.observer.device_changed();
                return;
            }
        }
        log::info!("Connected to {} ({})", device.name(), device.serial_number);

        // Each step reports on its own so partial information still shows.
        if let Err(e) = self.load_firmware_version() {
            self.report("There was an error getting the firmware version.", &e);
        }
        if let Err(e) = self.load_settings() {
            self.report("There was an error loading settings from the device.", &e);
        }
        if let Err(e) = self.load_variables() {
            self.report("There was an error getting the status of the device.", &e);
        }

        self.observer.device_changed();
    }

    fn load_firmware_version(&mut self) -> crate::error::Result<()> {
        let Some(programmer) = self.programmer.as_mut() else {
            return Ok(());
        };

        match programmer.firmware_version_string() {
            Ok(version) => {
                self.firmware_version = version;
                Ok(())
            }
            Err(e) => {
                self.firmware_version = "?".to_string();
                Err(e)
            }
        }
    }

    fn load_settings(&mut self) -> crate::error::Result<()> {
        let Some(programmer) = self.programmer.as_mut() else {
            return Ok(());
        };

        match programmer.read_settings() {
            Ok(settings) => {
                self.settings = settings;
                self.settings_modified = false;
                Ok(())
            }
            Err(e) => {
                self.settings_modified = true;
                Err(e)
            }
        }
    }

    fn load_variables(&mut self) -> crate::error::Result<()> {
        let Some(programmer) = self.programmer.as_mut() else {
            return Ok(());
        };

        match programmer.read_variables() {
            Ok(variables) => {
                self.variables = variables;
                self.variables_update_failed = false;
                Ok(())
            }
            Err(e) => {
                self.variables_update_failed = true;
                Err(e)
            }
        }
    }
}
