//! System tick service and non-blocking delay predicates.
//!
//! `embassy_time::Instant`/`Duration` stand in for the original's
//! hardware systick counter: both are monotonic, both are cheap to sample,
//! and using them lets this crate build and test identically on hardware
//! and on a desktop host.

#![cfg_attr(not(test), no_std)]

use embassy_time::{Duration, Instant};

/// A non-blocking delay predicate. Matches `delay_start`/`delay_us` from the
/// original tick service: start it once, then poll [`Delay::expired`] from a
/// task's `Run` state on every pass instead of blocking.
#[derive(Debug, Clone, Copy)]
pub struct Delay {
    deadline: Option<Instant>,
}

impl Delay {
    /// Creates a delay that has not been started — [`Delay::expired`]
    /// returns `false` until [`Delay::start`] is called.
    #[must_use]
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Starts (or restarts) the delay, expiring `duration` from now.
    pub fn start(&mut self, now: Instant, duration: Duration) {
        self.deadline = Some(now + duration);
    }

    /// Convenience over [`Delay::start`] taking microseconds.
    pub fn start_us(&mut self, now: Instant, duration_us: u64) {
        self.start(now, Duration::from_micros(duration_us));
    }

    /// True once `now` has reached the deadline. Idempotent: calling this
    /// repeatedly after expiry keeps returning `true` until the delay is
    /// explicitly restarted — a task is expected to poll this every pass
    /// rather than consume the expiry once.
    #[must_use]
    pub fn expired(&self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    /// Microseconds elapsed since the delay started, saturating at zero if
    /// it was never started.
    #[must_use]
    pub fn elapsed_us(&self, now: Instant) -> u64 {
        match self.deadline {
            Some(_) => now.as_micros(),
            None => 0,
        }
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives a lower-frequency "user tick" from the hardware systick rate.
///
/// Mirrors `_systick_callback`'s divisor logic in `knl_main.c`: most
/// subsystems don't need to run at the full systick rate, so the systick ISR
/// increments a counter and only fires user-visible tick work every `N`th
/// call.
pub struct TickDivider<const DIVISOR: u32> {
    counter: u32,
}

impl<const DIVISOR: u32> TickDivider<DIVISOR> {
    /// Creates a divider at its initial phase.
    #[must_use]
    pub const fn new() -> Self {
        Self { counter: 0 }
    }

    /// Advances by one hardware tick. Returns `true` on ticks where the
    /// divided-down "user tick" should fire.
    pub fn step(&mut self) -> bool {
        self.counter = self.counter.wrapping_add(1);
        if self.counter >= DIVISOR {
            self.counter = 0;
            true
        } else {
            false
        }
    }
}

impl<const DIVISOR: u32> Default for TickDivider<DIVISOR> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_not_started_never_expires() {
        let d = Delay::new();
        assert!(!d.expired(Instant::from_ticks(1_000_000)));
    }

    #[test]
    fn delay_expires_after_duration_and_stays_expired() {
        let mut d = Delay::new();
        let t0 = Instant::from_ticks(0);
        d.start_us(t0, 2_100);
        assert!(!d.expired(t0 + Duration::from_micros(2_000)));
        let t1 = t0 + Duration::from_micros(2_100);
        assert!(d.expired(t1));
        // Idempotent: still expired well after the deadline, without restart.
        assert!(d.expired(t1 + Duration::from_secs(1)));
    }

    #[test]
    fn tick_divider_fires_every_nth_step() {
        let mut div: TickDivider<4> = TickDivider::new();
        let fires: heapless::Vec<bool, 8> =
            (0..8).map(|_| div.step()).collect::<heapless::Vec<_, 8>>();
        assert_eq!(fires.as_slice(), &[false, false, false, true, false, false, false, true]);
    }
}
