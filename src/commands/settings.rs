//! Settings, apply and restore-defaults commands

use std::path::Path;

use pavr2_core::frequency::{FrequencyValidator, InputState, UNIT_SUFFIX};
use pavr2_core::protocol::{line_function_name, LineFunction, RegulatorMode, VccOutputIndicator};
use pavr2_core::Settings;

use super::profile::SettingsProfile;
use super::{finish, format_mv, open_session, CmdResult, Session};

fn print_row(label: &str, value: impl std::fmt::Display) {
    println!("  {:<28} {}", label, value);
}

fn frequency_display(name: pavr2_core::Result<&str>) -> String {
    match name {
        Ok(name) => format!("{}{}", name, UNIT_SUFFIX),
        Err(_) => "(unknown)".to_string(),
    }
}

pub fn print_settings(settings: &Settings) {
    let regulator = RegulatorMode::from_raw(settings.regulator_mode)
        .map(|mode| mode.to_string())
        .unwrap_or_else(|| format!("(invalid: {})", settings.regulator_mode));

    println!("Programming:");
    print_row("ISP frequency:", frequency_display(settings.isp_frequency_name()));
    print_row(
        "Max ISP frequency:",
        frequency_display(settings.max_isp_frequency_name()),
    );
    println!();

    println!("Power:");
    print_row("Regulator mode:", regulator);
    print_row(
        "VCC output:",
        if settings.vcc_output_enabled { "enabled" } else { "disabled" },
    );
    print_row("VCC output indicator:", settings.vcc_output_indicator);
    println!();

    println!("Serial:");
    print_row("Line A function:", line_function_name(settings.line_a_function));
    print_row("Line B function:", line_function_name(settings.line_b_function));
    println!();

    println!("Reported versions:");
    print_row("Software version:", format!(
        "{}.{}",
        settings.software_version_major, settings.software_version_minor
    ));
    print_row("Hardware version:", settings.hardware_version);
    println!();

    println!("Voltage limits:");
    print_row("VCC/VDD maximum range:", format_mv(settings.vcc_vdd_max_range));
    print_row("VCC 3.3 V minimum:", format_mv(settings.vcc_3v3_min));
    print_row("VCC 3.3 V maximum:", format_mv(settings.vcc_3v3_max));
    print_row("VCC 5 V minimum:", format_mv(settings.vcc_5v_min));
    print_row("VCC 5 V maximum:", format_mv(settings.vcc_5v_max));
}

/// The settings read from the device at connect time
///
/// A failed read leaves placeholder settings behind, which must never be
/// shown as the device's or layered into an apply.
pub fn loaded_settings(session: &Session) -> Result<&Settings, Box<dyn std::error::Error>> {
    if session.settings_modified() {
        return Err("The settings could not be read from the device.".into());
    }
    Ok(session.settings())
}

pub fn cmd_settings(programmer: &str, export: Option<&Path>) -> CmdResult {
    let session = open_session(programmer)?;
    finish(&session)?;
    let settings = loaded_settings(&session)?;
    print_settings(settings);

    if let Some(path) = export {
        SettingsProfile::from_settings(settings).save(path)?;
        println!();
        println!("Settings written to {}", path.display());
    }
    Ok(())
}

/// Split `key=value` arguments
pub fn parse_assignments(args: &[String]) -> Result<Vec<(&str, &str)>, String> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .ok_or_else(|| format!("Expected KEY=VALUE, got '{}'", arg))
        })
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "on" | "yes" | "true" | "enabled" => Some(true),
        "0" | "off" | "no" | "false" | "disabled" => Some(false),
        _ => None,
    }
}

fn parse_number(key: &str, value: &str) -> Result<u32, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid number for {}: '{}'", key, value))
}

/// Snap free-form frequency text to an allowed name (without unit).
/// Text with characters that can never form a frequency is rejected.
fn frequency_name(key: &str, validator: FrequencyValidator, value: &str) -> Result<String, String> {
    let display = match validator.classify(value) {
        InputState::Invalid => {
            return Err(format!("Invalid frequency for {}: '{}'", key, value));
        }
        InputState::Acceptable => value.to_string(),
        InputState::Intermediate => validator.normalize(value),
    };
    Ok(match display.strip_suffix(UNIT_SUFFIX) {
        Some(name) => name.to_string(),
        None => display,
    })
}

/// Apply `key=value` options to a settings record, in order
pub fn apply_options(settings: &mut Settings, options: &[(&str, &str)]) -> Result<(), String> {
    for &(key, value) in options {
        match key {
            "isp-frequency" => {
                let name = frequency_name(key, FrequencyValidator::isp(), value)?;
                settings
                    .set_isp_frequency(&name)
                    .map_err(|e| e.to_string())?;
                if name != value {
                    log::info!("ISP frequency {} rounded to {}{}", value, name, UNIT_SUFFIX);
                }
            }
            "max-frequency" => {
                let name = frequency_name(key, FrequencyValidator::max_isp(), value)?;
                settings
                    .set_max_isp_frequency(&name)
                    .map_err(|e| e.to_string())?;
                if name != value {
                    log::info!("Max ISP frequency {} rounded to {}{}", value, name, UNIT_SUFFIX);
                }
            }
            "regulator" => {
                let mode = RegulatorMode::parse(value)
                    .ok_or_else(|| format!("Invalid regulator mode: '{}'", value))?;
                settings.regulator_mode = mode as u8;
            }
            "vcc-output" => {
                settings.vcc_output_enabled = parse_bool(value)
                    .ok_or_else(|| format!("Invalid value for vcc-output: '{}'", value))?;
            }
            "vcc-indicator" => {
                settings.vcc_output_indicator = VccOutputIndicator::parse(value)
                    .ok_or_else(|| format!("Invalid VCC output indicator: '{}'", value))?;
            }
            "line-a" | "line-b" => {
                let function = LineFunction::parse(value)
                    .ok_or_else(|| format!("Invalid line function: '{}'", value))?;
                if key == "line-a" {
                    settings.line_a_function = function as u8;
                } else {
                    settings.line_b_function = function as u8;
                }
            }
            "sw-major" => settings.software_version_major = parse_number(key, value)?,
            "sw-minor" => settings.software_version_minor = parse_number(key, value)?,
            "hw-version" => settings.hardware_version = parse_number(key, value)?,
            "vcc-vdd-max-range" => settings.vcc_vdd_max_range = parse_number(key, value)?,
            "vcc-3v3-min" => settings.vcc_3v3_min = parse_number(key, value)?,
            "vcc-3v3-max" => settings.vcc_3v3_max = parse_number(key, value)?,
            "vcc-5v-min" => settings.vcc_5v_min = parse_number(key, value)?,
            "vcc-5v-max" => settings.vcc_5v_max = parse_number(key, value)?,
            other => return Err(format!("Unknown setting: '{}'", other)),
        }
    }
    Ok(())
}

/// Build the desired settings from the device's, a profile and options
fn desired_settings(
    session: &Session,
    profile: Option<&Path>,
    options: &[(&str, &str)],
) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut desired = loaded_settings(session)?.clone();

    if let Some(path) = profile {
        let profile_options = SettingsProfile::load(path)?.to_options();
        let pairs: Vec<(&str, &str)> = profile_options
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        apply_options(&mut desired, &pairs)?;
    }
    apply_options(&mut desired, options)?;

    // Report validation problems before touching the device
    desired.validate()?;
    Ok(desired)
}

pub fn cmd_apply(programmer: &str, profile: Option<&Path>, args: &[String]) -> CmdResult {
    let options = parse_assignments(args)?;
    if options.is_empty() && profile.is_none() {
        return Err("Nothing to apply (give KEY=VALUE settings or --profile)".into());
    }

    let mut session = open_session(programmer)?;
    finish(&session)?;
    let desired = desired_settings(&session, profile, &options)?;

    if &desired == session.settings() {
        println!("Settings already match; nothing to do.");
        return finish(&session);
    }

    session.edit_settings(|settings| *settings = desired);
    session.apply_settings();
    finish(&session)?;

    // Read back what the device actually stored
    session.reload_settings();
    finish(&session)?;
    println!("Settings applied.");
    println!();
    print_settings(session.settings());
    Ok(())
}

pub fn cmd_restore_defaults(programmer: &str) -> CmdResult {
    let mut session = open_session(programmer)?;
    session.restore_default_settings();
    finish(&session)
}
