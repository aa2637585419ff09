//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

const PROGRAMMER_HELP: &str =
    "Programmer backend, optionally with options (e.g. usb, dummy:legacy=1,firmware=1.07)";

#[derive(Parser)]
#[command(name = "pavr2")]
#[command(
    author,
    version,
    about = "Configuration utility for the Pololu USB AVR Programmer v2/v2.1",
    long_about = None
)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List connected programmers
    List {
        #[arg(short, long, default_value = "usb", help = PROGRAMMER_HELP)]
        programmer: String,
    },

    /// Show device information and status
    Status {
        #[arg(short, long, default_value = "usb", help = PROGRAMMER_HELP)]
        programmer: String,
    },

    /// Show the settings stored on the programmer
    Settings {
        #[arg(short, long, default_value = "usb", help = PROGRAMMER_HELP)]
        programmer: String,

        /// Also write the settings to a TOML profile
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Change settings and write them to the programmer
    ///
    /// Keys: isp-frequency, max-frequency, regulator, vcc-output,
    /// vcc-indicator, line-a, line-b, sw-major, sw-minor, hw-version,
    /// vcc-vdd-max-range, vcc-3v3-min, vcc-3v3-max, vcc-5v-min, vcc-5v-max.
    /// Voltages are in mV; frequencies accept kHz or MHz.
    Apply {
        #[arg(short, long, default_value = "usb", help = PROGRAMMER_HELP)]
        programmer: String,

        /// Start from a TOML profile instead of the device's current settings
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Settings to change, as key=value
        #[arg(value_name = "KEY=VALUE")]
        settings: Vec<String>,
    },

    /// Reset the programmer's settings to their factory defaults
    RestoreDefaults {
        #[arg(short, long, default_value = "usb", help = PROGRAMMER_HELP)]
        programmer: String,
    },

    /// Read the raw states of the programmer's I/O ports
    DigitalRead {
        #[arg(short, long, default_value = "usb", help = PROGRAMMER_HELP)]
        programmer: String,
    },

    /// Reset the programmer into its bootloader for a firmware upgrade
    Bootloader {
        #[arg(short, long, default_value = "usb", help = PROGRAMMER_HELP)]
        programmer: String,
    },

    /// Watch the programmer's status, reconnecting when it comes back
    Monitor {
        #[arg(short, long, default_value = "usb", help = PROGRAMMER_HELP)]
        programmer: String,

        /// Polling interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval: u64,

        /// Stop after this many updates
        #[arg(long)]
        count: Option<u64>,
    },

    /// List the selectable ISP frequencies
    Frequencies {
        /// List max ISP frequencies instead
        #[arg(long)]
        max: bool,

        /// Show every allowed frequency, not just the common ones
        #[arg(long)]
        all: bool,
    },

    /// Show which frequency a typed value would be rounded to
    Frequency {
        /// Frequency text, e.g. "1.5 MHz" or "57.4"
        text: String,

        /// Round against the max ISP frequency table
        #[arg(long)]
        max: bool,
    },

    /// List supported programmer backends
    ListProgrammers,
}
