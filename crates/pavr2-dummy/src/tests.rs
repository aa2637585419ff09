//! Session scenarios against the emulated programmer

use std::time::Duration;

use pavr2_core::protocol::*;
use pavr2_core::{
    ConnectionState, DisconnectReason, EventLog, RestoreTiming, SessionConfig, SessionEvent,
    SessionManager, Settings,
};

use super::*;

type Session = SessionManager<DummyTransport, EventLog>;

fn fast_config() -> SessionConfig {
    SessionConfig {
        update_interval: Duration::from_millis(10),
        restore: RestoreTiming {
            poll_interval: Duration::from_millis(1),
            timeout: Duration::from_millis(30),
        },
    }
}

fn session_with(config: DummyConfig) -> (Session, DummyTransport) {
    let dummy = DummyTransport::new(config);
    let session = SessionManager::new(dummy.clone(), EventLog::default(), fast_config());
    (session, dummy)
}

fn connected_session() -> (Session, DummyTransport) {
    let (mut session, dummy) = session_with(DummyConfig::default());
    session.start();
    assert_eq!(session.state(), ConnectionState::Connected);
    session.observer_mut().clear();
    dummy.clear_log();
    (session, dummy)
}

fn errors(session: &Session) -> Vec<String> {
    session.observer().errors().map(str::to_string).collect()
}

#[test]
fn test_parse_options() {
    let config = parse_options(&[
        ("firmware", "1.12"),
        ("legacy", "1"),
        ("restore", "never"),
        ("serial", "ABC"),
    ])
    .unwrap();
    assert_eq!(config.firmware_version, 0x0112);
    assert!(config.legacy_present);
    assert_eq!(config.restore, RestoreBehavior::Never);
    assert_eq!(config.serial_number, "ABC");

    assert_eq!(
        parse_options(&[("restore", "5")]).unwrap().restore,
        RestoreBehavior::AfterPolls(5)
    );
    assert!(parse_options(&[("firmware", "x")]).is_err());
    assert!(parse_options(&[("bogus", "1")]).is_err());
}

#[test]
fn test_start_connects_and_loads_everything() {
    let (mut session, _dummy) = session_with(DummyConfig::default());
    session.start();

    assert_eq!(session.state(), ConnectionState::Connected);
    assert_eq!(session.firmware_version(), "1.07");
    assert_eq!(
        session.device().map(|d| d.name()),
        Some("Pololu USB AVR Programmer v2.1")
    );
    assert!(!session.settings_modified());
    assert_eq!(session.settings().isp_frequency_name().unwrap(), "105");
    assert_eq!(session.settings().vcc_5v_max, 5504);
    assert_eq!(session.variables().target_vcc, 4992);
    assert!(!session.variables().has_results_from_last_programming);
    assert!(errors(&session).is_empty());
    assert_eq!(
        session.observer().events.last(),
        Some(&SessionEvent::DeviceChanged)
    );
}

#[test]
fn test_firmware_modification_string() {
    let (mut session, _dummy) = session_with(DummyConfig {
        firmware_modification: "nc".to_string(),
        ..Default::default()
    });
    session.start();
    assert_eq!(session.firmware_version(), "1.07nc");
}

#[test]
fn test_vanished_device_closes_without_reading() {
    let (mut session, dummy) = connected_session();

    dummy.unplug();
    session.update();

    assert_eq!(
        session.state(),
        ConnectionState::Disconnected(DisconnectReason::Error(
            "The connection to the device was lost.".to_string()
        ))
    );
    assert!(session.device().is_none());
    assert!(dummy.transfer_log().is_empty());
    assert_eq!(session.observer().events, vec![SessionEvent::DeviceChanged]);

    // No automatic reconnect out of an error state
    dummy.plug_in();
    session.update();
    assert!(!session.connected());

    session.connect();
    assert_eq!(session.state(), ConnectionState::Connected);
}

#[test]
fn test_failed_transfers_are_logged() {
    let (mut session, dummy) = connected_session();

    dummy.unplug();
    assert!(session.digital_read().is_none());

    assert_eq!(dummy.transfer_log().len(), 1);
    assert_eq!(dummy.transfer_log()[0].request, REQUEST_DIGITAL_READ);
    assert_eq!(
        errors(&session),
        vec!["There was an error reading the digital inputs.  \
              Failed to read the digital inputs.  LIBUSB_ERROR_NO_DEVICE"
            .to_string()]
    );
}

#[test]
fn test_auto_reconnect_swallows_enumeration_failures() {
    let (mut session, dummy) = session_with(DummyConfig {
        present: false,
        ..Default::default()
    });
    session.start();

    dummy.plug_in();
    dummy.set_fail_enumeration(true);
    session.update();
    session.update();

    assert_eq!(
        session.state(),
        ConnectionState::Disconnected(DisconnectReason::Clean)
    );
    assert!(errors(&session).is_empty());

    // Still armed
    dummy.set_fail_enumeration(false);
    session.update();
    assert_eq!(session.state(), ConnectionState::Connected);
}

#[test]
fn test_connect_reports_enumeration_failure() {
    let (mut session, dummy) = connected_session();
    session.disconnect();
    session.observer_mut().clear();

    dummy.set_fail_enumeration(true);
    session.connect();

    assert_eq!(
        session.state(),
        ConnectionState::Disconnected(DisconnectReason::Error(
            "Failed to get the list of devices.".to_string()
        ))
    );
    assert_eq!(
        errors(&session),
        vec!["There was an error getting the list of devices.  LIBUSB_ERROR_IO".to_string()]
    );
    assert!(session
        .observer()
        .events
        .contains(&SessionEvent::DeviceChanged));

    // The error state keeps the tick from reconnecting on its own
    dummy.set_fail_enumeration(false);
    session.update();
    assert!(!session.connected());

    session.connect();
    assert_eq!(session.state(), ConnectionState::Connected);
}

#[test]
fn test_port_names() {
    let (session, _dummy) = connected_session();
    let device = session.device().unwrap();
    assert_eq!(device.programming_port_name(), "/dev/ttyDUMMY0");
    assert_eq!(device.ttl_port_name(), "/dev/ttyDUMMY1");

    let (mut session, _dummy) = session_with(parse_options(&[("ports", "0")]).unwrap());
    session.start();
    let device = session.device().unwrap();
    assert_eq!(device.programming_port_name(), "(unknown)");
    assert_eq!(device.ttl_port_name(), "(unknown)");
}

#[test]
fn test_empty_start_then_auto_reconnect() {
    let (mut session, dummy) = session_with(DummyConfig {
        present: false,
        ..Default::default()
    });
    session.start();

    assert_eq!(
        session.state(),
        ConnectionState::Disconnected(DisconnectReason::Clean)
    );
    assert_eq!(session.observer().warnings().count(), 0);

    session.update();
    assert!(!session.connected());

    dummy.plug_in();
    session.update();
    assert_eq!(session.state(), ConnectionState::Connected);
}

#[test]
fn test_legacy_warning_only_at_start() {
    let (mut session, _dummy) = session_with(DummyConfig {
        present: false,
        legacy_present: true,
        ..Default::default()
    });
    session.start();
    session.update();
    session.update();

    let warnings: Vec<&str> = session.observer().warnings().collect();
    assert_eq!(warnings, vec![PGM03A_MESSAGE]);
}

#[test]
fn test_user_disconnect_blocks_auto_reconnect() {
    let (mut session, _dummy) = connected_session();

    session.disconnect();
    assert_eq!(
        session.state(),
        ConnectionState::Disconnected(DisconnectReason::UserInitiated)
    );

    session.update();
    assert!(!session.connected());

    session.connect();
    assert!(session.connected());
}

#[test]
fn test_update_refreshes_variables() {
    let (mut session, dummy) = connected_session();

    dummy.set_variable(VARIABLE_PROGRAMMING_ERROR, PROGRAMMING_ERROR_SYNCH);
    dummy.set_variable(VARIABLE_IN_PROGRAMMING_MODE, 1);
    session.update();

    let vars = session.variables();
    assert!(vars.has_results_from_last_programming);
    assert!(vars.in_programming_mode);
    assert_eq!(vars.programming_error_name(), "Initial SPI command failed.");
    assert_eq!(
        session.observer().events,
        vec![SessionEvent::VariablesChanged]
    );
}

#[test]
fn test_background_failures_are_swallowed() {
    let (mut session, dummy) = connected_session();
    let before = session.variables().clone();

    dummy.set_fail_enumeration(true);
    session.update();
    assert!(session.connected());
    assert!(!session.variables_update_failed());

    dummy.set_fail_enumeration(false);
    dummy.set_fail_transfers(true);
    session.update();
    assert!(session.connected());
    assert!(session.variables_update_failed());
    assert_eq!(session.variables(), &before);
    assert!(errors(&session).is_empty());

    dummy.set_fail_transfers(false);
    session.update();
    assert!(!session.variables_update_failed());
}

#[test]
fn test_apply_disabling_vcc_writes_it_first() {
    let (mut session, dummy) = connected_session();
    dummy.set_setting(SETTING_REGULATOR_MODE, 5);
    dummy.set_setting(SETTING_VCC_OUTPUT_ENABLED, 1);
    session.reload_settings();
    dummy.clear_log();

    session.edit_settings(|s| {
        s.vcc_output_enabled = false;
        s.regulator_mode = 3;
        s.vcc_3v3_min = 3000;
        s.vcc_3v3_max = 3600;
    });
    session.apply_settings();

    let log = dummy.transfer_log();
    assert!(log[0].is_setting_write(SETTING_VCC_OUTPUT_ENABLED));
    assert_eq!(log[0].value, 0);
    assert_eq!(
        log.iter()
            .filter(|t| t.is_setting_write(SETTING_VCC_OUTPUT_ENABLED))
            .count(),
        1
    );
    assert_eq!(dummy.setting(SETTING_REGULATOR_MODE), 3);
    assert_eq!(dummy.setting(SETTING_VCC_3V3_MIN), 94);
    assert!(!session.settings_modified());
}

#[test]
fn test_apply_enabling_vcc_writes_it_last() {
    let (mut session, dummy) = connected_session();

    session.edit_settings(|s| {
        s.regulator_mode = 5;
        s.vcc_output_enabled = true;
        s.vcc_5v_min = 4500;
        s.vcc_5v_max = 5500;
    });
    session.apply_settings();

    let log = dummy.transfer_log();
    let enable = log
        .iter()
        .position(|t| t.is_setting_write(SETTING_VCC_OUTPUT_ENABLED))
        .unwrap();
    assert_eq!(enable, log.len() - 1);
    assert_eq!(log[enable].value, 1);

    let last_voltage = log
        .iter()
        .rposition(|t| {
            [
                SETTING_VCC_VDD_MAX_RANGE,
                SETTING_VCC_3V3_MIN,
                SETTING_VCC_3V3_MAX,
                SETTING_VCC_5V_MIN,
                SETTING_VCC_5V_MAX,
            ]
            .iter()
            .any(|&id| t.is_setting_write(id))
        })
        .unwrap();
    assert!(last_voltage < enable);
}

#[test]
fn test_apply_then_reload_round_trips() {
    let (mut session, _dummy) = connected_session();

    session.set_isp_frequency("57.4");
    session.set_max_isp_frequency("2000");
    session.edit_settings(|s| {
        s.regulator_mode = 3;
        s.vcc_output_enabled = true;
        s.vcc_output_indicator = VccOutputIndicator::Steady;
        s.line_a_function = LineFunction::DtrReset as u8;
        s.line_b_function = LineFunction::Clock as u8;
        s.vcc_vdd_max_range = 1024;
        s.vcc_3v3_min = 2976;
    });
    assert!(session.settings_modified());
    assert!(!session.exit());

    let expected: Settings = session.settings().clone();
    session.apply_settings();
    assert!(session.exit());

    session.reload_settings();
    assert_eq!(session.settings(), &expected);
    assert_eq!(session.settings().isp_frequency_name().unwrap(), "57.4");
    assert_eq!(session.settings().max_isp_frequency_name().unwrap(), "2000");
    assert!(errors(&session).is_empty());
}

#[test]
fn test_apply_invalid_settings_reports_and_writes_nothing() {
    let (mut session, dummy) = connected_session();

    session.edit_settings(|s| s.vcc_output_enabled = true);
    session.apply_settings();

    assert_eq!(
        errors(&session),
        vec!["There was an error applying settings.  \
              VCC cannot be an output if the regulator mode is auto."
            .to_string()]
    );
    assert!(dummy.transfer_log().is_empty());
    assert!(session.settings_modified());
}

#[test]
fn test_unknown_frequency_name() {
    let (mut session, _dummy) = connected_session();
    session.set_isp_frequency("abc");
    assert_eq!(
        errors(&session),
        vec!["There was an error setting the ISP frequency.  Invalid frequency name: 'abc'."
            .to_string()]
    );
    assert!(!session.settings_modified());
}

#[test]
fn test_restore_defaults() {
    let (mut session, dummy) = connected_session();
    dummy.set_setting(SETTING_LINE_B_FUNCTION, 2);
    session.reload_settings();
    assert_eq!(session.settings().line_b_function, 2);

    session.restore_default_settings();

    assert_eq!(dummy.settings(), FACTORY_SETTINGS);
    assert_eq!(session.settings().line_b_function, 0);
    assert!(errors(&session).is_empty());
    assert!(session
        .observer()
        .events
        .contains(&SessionEvent::Info(
            "Your device's settings have been reset to their default values.".to_string()
        )));
}

#[test]
fn test_restore_defaults_timeout() {
    let (mut session, dummy) = session_with(DummyConfig {
        restore: RestoreBehavior::Never,
        ..Default::default()
    });
    session.start();
    dummy.set_setting(SETTING_LINE_B_FUNCTION, 2);
    let before = dummy.settings();

    session.restore_default_settings();

    assert_eq!(
        errors(&session),
        vec!["There was an error resetting to the default settings.  \
              A timeout occurred while resetting to default settings."
            .to_string()]
    );
    let after = dummy.settings();
    assert_eq!(after[1..], before[1..]);
    assert!(!session
        .observer()
        .events
        .iter()
        .any(|e| matches!(e, SessionEvent::Info(_))));
}

#[test]
fn test_unsupported_firmware_refused() {
    let (mut session, dummy) = session_with(DummyConfig {
        firmware_version: 0x0200,
        ..Default::default()
    });
    session.start();

    assert_eq!(
        session.state(),
        ConnectionState::Disconnected(DisconnectReason::Error(
            "Failed to connect to device.".to_string()
        ))
    );
    let errors = errors(&session);
    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .starts_with("There was an error connecting to the device.  The device has new firmware"));
    assert!(dummy.transfer_log().is_empty());
}

#[test]
fn test_partial_failures_after_connect() {
    let (mut session, dummy) = session_with(DummyConfig::default());
    dummy.set_fail_transfers(true);
    session.start();

    // The handle opened, so the session counts as connected even though
    // nothing could be read.
    assert!(session.connected());
    assert_eq!(session.firmware_version(), "1.07?");
    assert!(session.settings_modified());
    assert!(session.variables_update_failed());
    assert_eq!(
        errors(&session),
        vec![
            "There was an error loading settings from the device.  \
             Failed to read a setting.  LIBUSB_ERROR_IO"
                .to_string(),
            "There was an error getting the status of the device.  \
             Failed to get a variable.  LIBUSB_ERROR_IO"
                .to_string(),
        ]
    );
}

#[test]
fn test_digital_read_and_bootloader() {
    let (mut session, dummy) = connected_session();
    dummy.set_ports([0x01, 0x80, 0x0F]);

    let readings = session.digital_read().unwrap();
    assert_eq!(
        (readings.port_a, readings.port_b, readings.port_c),
        (0x01, 0x80, 0x0F)
    );

    session.start_bootloader();
    assert_eq!(
        session.state(),
        ConnectionState::Disconnected(DisconnectReason::UserInitiated)
    );
    let mut transport = dummy.clone();
    assert!(transport.list_devices().unwrap().is_empty());
}
