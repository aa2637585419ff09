//! Monitor command: keeps a session alive and prints status changes

use std::time::Duration;

use pavr2_core::{ConnectionState, Scheduler, SessionConfig};

use super::{finish, format_mv, new_session, CmdResult, Session};

fn status_line(session: &Session) -> String {
    match session.state() {
        ConnectionState::Connected => {
            let vars = session.variables();
            let mut line = format!(
                "VCC {}  VDD {}  regulator {}{}",
                format_mv(vars.target_vcc),
                format_mv(vars.programmer_vdd),
                vars.regulator_level_name(),
                if vars.in_programming_mode { "  programming" } else { "" },
            );
            if session.variables_update_failed() {
                line.push_str("  (stale)");
            }
            line
        }
        ConnectionState::Disconnected(_) => "Not connected".to_string(),
    }
}

pub fn cmd_monitor(programmer: &str, interval_ms: u64, count: Option<u64>) -> CmdResult {
    let config = SessionConfig {
        update_interval: Duration::from_millis(interval_ms.max(1)),
        ..SessionConfig::default()
    };
    let mut session = new_session(programmer, config)?;
    session.start();

    if let Some(device) = session.device() {
        println!(
            "Monitoring {} ({}), firmware {}",
            device.name(),
            device.serial_number,
            session.firmware_version()
        );
    }

    run_monitor(&mut session, count)
}

/// Tick the session until `count` updates have run (forever without a
/// count), printing the status whenever it changes
fn run_monitor(session: &mut Session, count: Option<u64>) -> CmdResult {
    if count != Some(0) {
        let mut scheduler = Scheduler::new(session.config().update_interval);
        let mut updates = 0u64;
        let mut last_line = String::new();

        scheduler.run(session, |session| {
            let line = status_line(session);
            if line != last_line {
                println!("{}", line);
                last_line = line;
            }
            updates += 1;
            count.map_or(true, |limit| updates < limit)
        });
    }

    finish(session)
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::observer::ConsoleObserver;
    use pavr2_core::{SessionManager, Transport};
    use pavr2_dummy::{DummyConfig, DummyTransport};

    fn session(dummy: &DummyTransport) -> Session {
        let transport: Box<dyn Transport> = Box::new(dummy.clone());
        let config = SessionConfig {
            update_interval: Duration::from_millis(1),
            ..SessionConfig::default()
        };
        SessionManager::new(transport, ConsoleObserver::default(), config)
    }

    #[test]
    fn test_zero_count_runs_no_update() {
        let dummy = DummyTransport::new(DummyConfig::default());
        let mut session = session(&dummy);
        session.start();
        dummy.clear_log();

        run_monitor(&mut session, Some(0)).unwrap();
        assert!(dummy.transfer_log().is_empty());

        run_monitor(&mut session, Some(2)).unwrap();
        assert!(!dummy.transfer_log().is_empty());
    }

    #[test]
    fn test_reported_errors_fail_the_command() {
        let dummy = DummyTransport::new(DummyConfig::default());
        dummy.set_fail_transfers(true);
        let mut session = session(&dummy);
        session.start();
        dummy.set_fail_transfers(false);

        assert!(run_monitor(&mut session, Some(1)).is_err());
    }
}
