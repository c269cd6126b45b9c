//! The kernel's monotonic tick counter, advanced once per timer
//! interrupt by the timekeeping core.

use spin::Mutex;

use crate::proc::WaitChannel;
use crate::trap::dispatch::Services;

/// Every core receives its own timer interrupt; only this core
/// advances the shared count, so one physical tick is never counted
/// twice.
pub const TIMEKEEPER_CORE: usize = 0;

pub struct TickClock {
    ticks: Mutex<u64>,
}

impl TickClock {
    pub const fn new() -> Self {
        Self {
            ticks: Mutex::new(0),
        }
    }

    /// Advance the count and wake sleepers. The wake happens while the
    /// lock is still held so a waiter that just checked the count
    /// cannot miss the advance.
    pub fn tick<S: Services>(&self, services: &S) {
        let mut ticks = self.ticks.lock();
        *ticks += 1;
        services.wake_all(self.channel());
    }

    pub fn ticks(&self) -> u64 {
        *self.ticks.lock()
    }

    /// The channel sleepers use to wait for time to advance.
    pub fn channel(&self) -> WaitChannel {
        WaitChannel::of(self)
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(TickClock::new().ticks(), 0);
    }

    #[test]
    fn each_clock_has_its_own_channel() {
        let a = TickClock::new();
        let b = TickClock::new();
        assert_eq!(a.channel(), a.channel());
        assert_ne!(a.channel(), b.channel());
    }
}
