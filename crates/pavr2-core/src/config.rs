//! Session configuration

use std::time::Duration;

/// Index of the enumerated device a session connects to. There is no
/// device chooser; with several programmers plugged in the first one wins.
pub const FIRST_DEVICE_INDEX: usize = 0;

/// Polling parameters for restoring default settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreTiming {
    /// Delay before each read of the "not initialized" flag
    pub poll_interval: Duration,
    /// Give up once this much time has passed since the request
    pub timeout: Duration,
}

impl Default for RestoreTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            timeout: Duration::from_millis(300),
        }
    }
}

/// Session manager configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Interval between [`SessionManager::update`](crate::session::SessionManager::update) ticks
    pub update_interval: Duration,
    pub restore: RestoreTiming,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_millis(1000),
            restore: RestoreTiming::default(),
        }
    }
}
