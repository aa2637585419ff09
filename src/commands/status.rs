//! Status, digital read and bootloader commands

use pavr2_core::protocol::{line_function_name, programming_error_long};

use super::{finish, format_mv, open_session, CmdResult, Session};

fn print_row(label: &str, value: impl std::fmt::Display) {
    println!("  {:<32} {}", label, value);
}

/// Print device information and the latest variables
pub fn print_status(session: &Session) {
    let Some(device) = session.device() else {
        println!("Not connected.");
        return;
    };
    let vars = session.variables();

    println!("{}", device.name());
    print_row("Serial number:", &device.serial_number);
    print_row("Firmware version:", session.firmware_version());
    print_row("Programming port:", device.programming_port_name());
    print_row("TTL port:", device.ttl_port_name());
    print_row("Last reset:", vars.last_device_reset_name());
    println!();

    println!("Current status:");
    print_row("Target VCC:", format_mv(vars.target_vcc));
    print_row("Programmer VDD:", format_mv(vars.programmer_vdd));
    print_row("Regulator level:", vars.regulator_level_name());
    print_row(
        "In programming mode:",
        if vars.in_programming_mode { "Yes" } else { "No" },
    );
    print_row(
        "Line A:",
        line_function_name(session.settings().line_a_function),
    );
    print_row(
        "Line B:",
        line_function_name(session.settings().line_b_function),
    );
    println!();

    println!("Results from last programming:");
    if !vars.has_results_from_last_programming {
        println!("  (none)");
        return;
    }
    print_row("Programming error:", vars.programming_error_name());
    let details = programming_error_long(vars.programming_error);
    if !details.is_empty() {
        println!("    {}", details);
    }
    print_row("Target VCC measured minimum:", format_mv(vars.target_vcc_measured_min));
    print_row("Target VCC measured maximum:", format_mv(vars.target_vcc_measured_max));
    print_row(
        "Programmer VDD measured minimum:",
        format_mv(vars.programmer_vdd_measured_min),
    );
    print_row(
        "Programmer VDD measured maximum:",
        format_mv(vars.programmer_vdd_measured_max),
    );

    if session.variables_update_failed() {
        println!();
        println!("(status may be out of date)");
    }
}

pub fn cmd_status(programmer: &str) -> CmdResult {
    let session = open_session(programmer)?;
    print_status(&session);
    finish(&session)
}

pub fn cmd_digital_read(programmer: &str) -> CmdResult {
    let mut session = open_session(programmer)?;
    if let Some(readings) = session.digital_read() {
        for (port, value) in [
            ("A", readings.port_a),
            ("B", readings.port_b),
            ("C", readings.port_c),
        ] {
            println!("Port {}: 0x{:02X} ({:08b})", port, value, value);
        }
    }
    finish(&session)
}

pub fn cmd_bootloader(programmer: &str) -> CmdResult {
    let mut session = open_session(programmer)?;
    session.start_bootloader();
    finish(&session)?;
    println!("The programmer is now in bootloader mode.");
    Ok(())
}
