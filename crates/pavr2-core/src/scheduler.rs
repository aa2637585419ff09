//! Fixed-interval driver for [`SessionManager::update`]

use std::thread;
use std::time::{Duration, Instant};

use crate::session::{SessionManager, SessionObserver};
use crate::transport::Transport;

/// Runs one update per interval on the calling thread
///
/// A tick that overruns its slot is not made up for; the next deadline is
/// measured from when the late tick finished.
#[derive(Debug)]
pub struct Scheduler {
    interval: Duration,
    next_tick: Option<Instant>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_tick: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until the next tick is due. The first call returns at once.
    pub fn wait_for_tick(&mut self) {
        let now = Instant::now();
        if let Some(deadline) = self.next_tick {
            if deadline > now {
                thread::sleep(deadline - now);
            }
        }

        let now = Instant::now();
        self.next_tick = Some(match self.next_tick {
            Some(deadline) if deadline + self.interval > now => deadline + self.interval,
            _ => now + self.interval,
        });
    }

    /// Call [`SessionManager::update`] once per tick until `keep_going`
    /// returns false. `keep_going` runs after each update.
    pub fn run<T, O, F>(&mut self, manager: &mut SessionManager<T, O>, mut keep_going: F)
    where
        T: Transport,
        O: SessionObserver,
        F: FnMut(&mut SessionManager<T, O>) -> bool,
    {
        loop {
            self.wait_for_tick();
            manager.update();
            if !keep_going(manager) {
                break;
            }
        }
    }
}
