//! List commands implementation

use pavr2_core::protocol::PGM03A_MESSAGE;

use super::CmdResult;
use crate::programmers;

/// List all supported programmer backends
pub fn list_programmers() {
    println!("{}", programmers::programmer_help());
}

/// List connected programmers
pub fn cmd_list(programmer: &str) -> CmdResult {
    let mut transport = programmers::open_transport(programmer)?;
    let devices = transport.list_devices()?;

    if devices.is_empty() {
        println!("No programmers found.");
        if transport.legacy_device_present()? {
            println!();
            println!("{}", PGM03A_MESSAGE);
        }
        return Ok(());
    }

    println!(
        "{:<10} {:<32} {:>8}  {:<16} {:<16}",
        "Serial", "Name", "Firmware", "Programming port", "TTL port"
    );
    println!("{}", "-".repeat(86));
    for device in &devices {
        println!(
            "{:<10} {:<32} {:>8}  {:<16} {:<16}",
            device.serial_number,
            device.name(),
            device.firmware_version_string(),
            device.programming_port_name(),
            device.ttl_port_name()
        );
    }

    Ok(())
}
