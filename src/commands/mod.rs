//! CLI command implementations
//!
//! Device commands open a [`Session`], let it connect to the first
//! programmer found, and then work through the session manager's
//! operations. The session reports failures through the
//! [`ConsoleObserver`]; [`finish`] turns any reported error into a failing
//! exit status.

mod frequency;
mod list;
mod monitor;
mod profile;
mod settings;
mod status;

pub use frequency::{cmd_frequencies, cmd_frequency};
pub use list::{cmd_list, list_programmers};
pub use monitor::cmd_monitor;
pub use settings::{cmd_apply, cmd_restore_defaults, cmd_settings};
pub use status::{cmd_bootloader, cmd_digital_read, cmd_status};

use pavr2_core::{ConnectionState, DisconnectReason, SessionConfig, SessionManager, Transport};

use crate::observer::ConsoleObserver;
use crate::programmers;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Session manager as used by the CLI
pub type Session = SessionManager<Box<dyn Transport>, ConsoleObserver>;

/// Create a session without connecting
pub fn new_session(programmer: &str, config: SessionConfig) -> Result<Session, Box<dyn std::error::Error>> {
    let transport = programmers::open_transport(programmer)?;
    Ok(SessionManager::new(
        transport,
        ConsoleObserver::default(),
        config,
    ))
}

/// Create a session and connect to the first programmer
pub fn open_session(programmer: &str) -> Result<Session, Box<dyn std::error::Error>> {
    let mut session = new_session(programmer, SessionConfig::default())?;
    session.start();

    match session.state() {
        ConnectionState::Connected => Ok(session),
        ConnectionState::Disconnected(DisconnectReason::Error(message)) => Err(message.into()),
        ConnectionState::Disconnected(_) => Err("No programmer was found.  \
             Please verify that the programmer is connected to the computer via USB."
            .into()),
    }
}

/// Fail if the session reported any error
pub fn finish(session: &Session) -> CmdResult {
    match session.observer().errors {
        0 => Ok(()),
        1 => Err("The operation failed.".into()),
        n => Err(format!("{} errors occurred.", n).into()),
    }
}

/// Format millivolts as volts with two decimals (e.g. "4.99 V")
pub fn format_mv(mv: u32) -> String {
    format!("{}.{:02} V", mv / 1000, mv % 1000 / 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mv() {
        assert_eq!(format_mv(4992), "4.99 V");
        assert_eq!(format_mv(0), "0.00 V");
        assert_eq!(format_mv(3008), "3.00 V");
        assert_eq!(format_mv(8160), "8.16 V");
    }
}
