//! Terminal presentation of session notifications

use pavr2_core::SessionObserver;

/// Prints session messages to the terminal and counts errors so commands
/// can exit with a failure status
#[derive(Debug, Default)]
pub struct ConsoleObserver {
    pub errors: usize,
}

impl SessionObserver for ConsoleObserver {
    fn device_changed(&mut self) {
        log::trace!("Device changed");
    }

    fn show_error(&mut self, message: &str) {
        self.errors += 1;
        eprintln!("Error: {}", message);
    }

    fn show_warning(&mut self, message: &str) {
        eprintln!("Warning: {}", message);
    }

    fn show_info(&mut self, message: &str) {
        println!("{}", message);
    }
}
