//! Outstanding-response bookkeeping.
//!
//! The CPU side only polls the DSP SPI device while a response is still
//! owed to it — every `GET_*` request and `CHECK_READY` increments this
//! counter, and every reply message decrements it. Mirrors
//! `g_pending_response` in `svc_dsp.c`.

use core::sync::atomic::{AtomicU32, Ordering};

/// Saturating count of responses the DSP still owes the CPU.
pub struct PendingResponses {
    count: AtomicU32,
}

impl PendingResponses {
    /// Creates a counter at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { count: AtomicU32::new(0) }
    }

    /// Records that a response is now owed.
    pub fn request_sent(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Records that a response was received.
    ///
    /// Saturates at zero rather than wrapping: an unexpected extra reply
    /// (e.g. a retransmit from a noisy link) must never turn into a huge
    /// pending count that blocks polling indefinitely.
    pub fn response_received(&self) {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some(c.saturating_sub(1)))
            .ok();
    }

    /// Current outstanding count.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// True while at least one response is still owed — the condition under
    /// which the CPU task should keep polling the DSP SPI device.
    pub fn should_poll(&self) -> bool {
        self.count() > 0
    }
}

impl Default for PendingResponses {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_outstanding_requests() {
        let p = PendingResponses::new();
        assert!(!p.should_poll());
        p.request_sent();
        p.request_sent();
        assert_eq!(p.count(), 2);
        assert!(p.should_poll());
        p.response_received();
        assert_eq!(p.count(), 1);
        p.response_received();
        assert!(!p.should_poll());
    }

    #[test]
    fn saturates_at_zero() {
        let p = PendingResponses::new();
        p.response_received();
        assert_eq!(p.count(), 0);
    }
}
