//! pavr2 - Configuration utility for the Pololu USB AVR Programmer v2/v2.1
//!
//! # Architecture
//!
//! Device access is split across crates:
//! - **pavr2-core** - settings, variables, frequency tables and the session
//!   manager that owns the connection and reports errors
//! - **pavr2-usb** - the USB transport (nusb)
//! - **pavr2-dummy** - an emulated programmer for trying the tool without
//!   hardware
//!
//! Every device command opens a session, connects to the first programmer
//! found and drives the session's operations. Messages the session reports
//! go to the terminal through [`observer::ConsoleObserver`].

mod cli;
mod commands;
mod observer;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::List { programmer } => commands::cmd_list(&programmer),
        Commands::Status { programmer } => commands::cmd_status(&programmer),
        Commands::Settings { programmer, export } => {
            commands::cmd_settings(&programmer, export.as_deref())
        }
        Commands::Apply {
            programmer,
            profile,
            settings,
        } => commands::cmd_apply(&programmer, profile.as_deref(), &settings),
        Commands::RestoreDefaults { programmer } => commands::cmd_restore_defaults(&programmer),
        Commands::DigitalRead { programmer } => commands::cmd_digital_read(&programmer),
        Commands::Bootloader { programmer } => commands::cmd_bootloader(&programmer),
        Commands::Monitor {
            programmer,
            interval,
            count,
        } => commands::cmd_monitor(&programmer, interval, count),
        Commands::Frequencies { max, all } => commands::cmd_frequencies(max, all),
        Commands::Frequency { text, max } => commands::cmd_frequency(&text, max),
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
