//! DSP cold-boot sequencer.
//!
//! Bringing the DSP up is a strict sequence — assert reset, hold it for a
//! minimum time, release it, wait again, then stream the boot image over a
//! dedicated SPI transfer mode — and getting the order wrong corrupts the
//! boot. `ft_dsp_boot::DspBoot` encodes each step as a distinct typestate so
//! the sequence can only be advanced in order; there is no runtime flag to
//! get out of sync, because a caller simply has no method to call that would
//! skip a step.
//!
//! This mirrors the zero-cost ordering tokens used for MPU/cache/FMC bring-up
//! elsewhere in this firmware, applied to `svc_dsp_task`'s
//! `STATE_INIT → STATE_ASSERT_RESET → STATE_RELEASE_RESET → STATE_BOOT →
//! STATE_RUN` state list.

#![cfg_attr(not(test), no_std)]

use embassy_time::{Duration, Instant};
use ft_device_io::BootTransport;
use ft_tick::Delay;

/// Minimum time the DSP must be held in reset, taken verbatim from
/// `svc_dsp.c`'s `delay_start` call in `STATE_ASSERT_RESET`.
pub const RESET_HOLD: Duration = Duration::from_micros(2_100);

/// Minimum time to wait after releasing reset before the boot transfer may
/// begin, taken verbatim from `svc_dsp.c`'s `STATE_RELEASE_RESET` wait.
pub const POST_RELEASE_WAIT: Duration = Duration::from_micros(1_000);

/// The DSP's hardware reset line.
pub trait ResetLine {
    /// Error type for line-level failures.
    type Error: core::fmt::Debug;

    /// Drives the line to hold the DSP in reset.
    fn assert(&mut self) -> Result<(), Self::Error>;

    /// Drives the line to release the DSP from reset.
    fn release(&mut self) -> Result<(), Self::Error>;
}

/// Outcome of attempting to advance a time-gated boot step before checking
/// whether enough time has actually elapsed.
pub enum Advance<Ready, Waiting> {
    /// The minimum wait has elapsed; the sequencer has moved to the next step.
    Ready(Ready),
    /// Still waiting; call again later with a more current `now`.
    Waiting(Waiting),
}

/// Not yet begun.
pub struct Init;
/// Reset asserted; waiting out [`RESET_HOLD`].
pub struct AssertReset {
    hold: Delay,
}
/// Reset released; waiting out [`POST_RELEASE_WAIT`].
pub struct ReleaseReset {
    wait: Delay,
}
/// Reset hold and post-release wait both satisfied; ready to stream the boot
/// image.
pub struct Boot;
/// Boot image has been transmitted. The runtime message protocol may now
/// begin; this crate does not itself wait for `SYSTEM_READY` — that is a
/// protocol-layer concern (`ft_protocol::PendingResponses` tracks it).
pub struct Run;

/// The DSP boot sequencer, parameterised by its current typestate and the
/// concrete reset line it drives.
pub struct DspBoot<S, R> {
    reset: R,
    state: S,
}

impl<R: ResetLine> DspBoot<Init, R> {
    /// Starts a boot sequence for a DSP whose reset line is currently in an
    /// unknown state.
    #[must_use]
    pub const fn new(reset: R) -> Self {
        Self { reset, state: Init }
    }

    /// Asserts reset and starts the [`RESET_HOLD`] timer.
    pub fn assert_reset(mut self, now: Instant) -> Result<DspBoot<AssertReset, R>, R::Error> {
        self.reset.assert()?;
        let mut hold = Delay::new();
        hold.start(now, RESET_HOLD);
        Ok(DspBoot { reset: self.reset, state: AssertReset { hold } })
    }
}

impl<R: ResetLine> DspBoot<AssertReset, R> {
    /// Releases reset once [`RESET_HOLD`] has elapsed, starting the
    /// [`POST_RELEASE_WAIT`] timer. Returns the sequencer unchanged (as
    /// [`Advance::Waiting`]) if called too early.
    pub fn try_release_reset(
        mut self,
        now: Instant,
    ) -> Result<Advance<DspBoot<ReleaseReset, R>, Self>, R::Error> {
        if !self.state.hold.expired(now) {
            return Ok(Advance::Waiting(self));
        }
        self.reset.release()?;
        let mut wait = Delay::new();
        wait.start(now, POST_RELEASE_WAIT);
        Ok(Advance::Ready(DspBoot { reset: self.reset, state: ReleaseReset { wait } }))
    }
}

impl<R> DspBoot<ReleaseReset, R> {
    /// Advances to [`Boot`] once [`POST_RELEASE_WAIT`] has elapsed. Returns
    /// the sequencer unchanged if called too early.
    pub fn try_begin_boot(self, now: Instant) -> Advance<DspBoot<Boot, R>, Self> {
        if !self.state.wait.expired(now) {
            return Advance::Waiting(self);
        }
        Advance::Ready(DspBoot { reset: self.reset, state: Boot })
    }
}

impl<R> DspBoot<Boot, R> {
    /// Streams `image` to the DSP over a bulk blocking transfer that bypasses
    /// the runtime transmit ring, matching `dev_dsp.c`'s distinct "boot" SPI
    /// chip format.
    pub async fn send_image<T: BootTransport>(
        self,
        transport: &mut T,
        image: &[u8],
    ) -> Result<DspBoot<Run, R>, T::Error> {
        transport.send_blob(image).await?;
        Ok(DspBoot { reset: self.reset, state: Run })
    }
}

impl<R> DspBoot<Run, R> {
    /// Releases the reset line back to the caller, e.g. to repurpose it for
    /// a later re-boot sequence.
    pub fn into_reset_line(self) -> R {
        self.reset
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct FakeResetLine {
        asserted: bool,
        released: bool,
    }

    impl ResetLine for FakeResetLine {
        type Error = core::convert::Infallible;

        fn assert(&mut self) -> Result<(), Self::Error> {
            self.asserted = true;
            Ok(())
        }

        fn release(&mut self) -> Result<(), Self::Error> {
            self.released = true;
            Ok(())
        }
    }

    struct FakeBootTransport {
        sent: heapless::Vec<u8, 64>,
    }

    impl BootTransport for FakeBootTransport {
        type Error = core::convert::Infallible;

        async fn send_blob(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            self.sent.extend_from_slice(data).ok();
            Ok(())
        }
    }

    #[test]
    fn release_reset_waits_until_hold_elapses() {
        let t0 = Instant::from_ticks(0);
        let boot = DspBoot::new(FakeResetLine::default()).assert_reset(t0).unwrap();
        let boot = match boot.try_release_reset(t0 + Duration::from_micros(1_000)).unwrap() {
            Advance::Waiting(b) => b,
            Advance::Ready(_) => panic!("must not release reset before RESET_HOLD elapses"),
        };
        match boot.try_release_reset(t0 + RESET_HOLD).unwrap() {
            Advance::Ready(_) => {}
            Advance::Waiting(_) => panic!("must release reset once RESET_HOLD has elapsed"),
        }
    }

    #[tokio::test]
    async fn full_sequence_transmits_the_boot_image() {
        let t0 = Instant::from_ticks(0);
        let boot = DspBoot::new(FakeResetLine::default()).assert_reset(t0).unwrap();

        let Advance::Ready(boot) = boot.try_release_reset(t0 + RESET_HOLD).unwrap() else {
            panic!("RESET_HOLD has elapsed");
        };
        let Advance::Ready(boot) = boot.try_begin_boot(t0 + RESET_HOLD + POST_RELEASE_WAIT) else {
            panic!("POST_RELEASE_WAIT has elapsed");
        };

        let mut transport = FakeBootTransport { sent: heapless::Vec::new() };
        let boot = boot.send_image(&mut transport, &[1, 2, 3, 4]).await.unwrap();
        assert_eq!(transport.sent.as_slice(), &[1, 2, 3, 4]);

        let reset = boot.into_reset_line();
        assert!(reset.asserted);
        assert!(reset.released);
    }
}
