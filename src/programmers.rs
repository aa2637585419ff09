//! Programmer backend registration and dispatch
//!
//! Backends are feature-gated. Each one provides a [`Transport`] that the
//! session manager drives.

use pavr2_core::Transport;

/// Information about a programmer backend
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "usb")]
    programmers.push(ProgrammerInfo {
        name: "usb",
        aliases: &["pavr2"],
        description: "Pololu USB AVR Programmer v2/v2.1 over USB (VID:1ffb PID:00b0/00bb)",
    });

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &[],
        description: "Emulated programmer (present=,legacy=,firmware=,serial=,modification=,ports=,restore=)",
    });

    programmers
}

/// Generate help text listing all available backends
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");
    for p in &programmers {
        help.push_str(&format!("  {:8} - {}\n", p.name, p.description));
    }
    help
}

/// Resolve a backend name or alias
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:key=value,key=value"
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown programmer: {}\n\n", name);
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'pavr2 list-programmers' for more details");
    msg.into()
}

/// Create the transport for a programmer string
#[allow(unused_variables)]
pub fn open_transport(programmer: &str) -> Result<Box<dyn Transport>, Box<dyn std::error::Error>> {
    let (name, options) = parse_programmer_string(programmer);

    let canonical_name = match find_programmer(name) {
        Some(n) => n,
        None => return Err(unknown_programmer_error(name)),
    };

    match canonical_name {
        #[cfg(feature = "usb")]
        "usb" => {
            if !options.is_empty() {
                return Err("The usb programmer takes no options".into());
            }
            Ok(Box::new(pavr2_usb::UsbTransport::new()))
        }
        #[cfg(feature = "dummy")]
        "dummy" => {
            let config = pavr2_dummy::parse_options(&options)
                .map_err(|e| format!("Invalid dummy parameters: {}", e))?;
            log::debug!("Dummy programmer: {:?}", config);
            Ok(Box::new(pavr2_dummy::DummyTransport::new(config)))
        }
        _ => Err(unknown_programmer_error(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_programmer_string() {
        assert_eq!(parse_programmer_string("usb"), ("usb", vec![]));
        assert_eq!(
            parse_programmer_string("dummy:legacy=1,firmware=1.07"),
            ("dummy", vec![("legacy", "1"), ("firmware", "1.07")])
        );
    }

    #[test]
    fn test_unknown_programmer() {
        assert!(find_programmer("ch341a").is_none());
        assert!(open_transport("ch341a").is_err());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy() {
        let mut transport = open_transport("dummy:present=0").unwrap();
        assert!(transport.list_devices().unwrap().is_empty());
        assert!(open_transport("dummy:bogus=1").is_err());
    }
}
