//! DSP audio block loop: the double-buffered handoff between the audio ISR
//! and the main loop's call into [`ft_module_abi::Module::process`], plus
//! the cycle-accounting behind `GET_PROFILE`.
//!
//! Matches `dsp/src/kernel/main.c`'s RX-DMA-done ISR / main-loop split: the
//! ISR only ever touches the codec buffers and a flag, never calls into
//! module code itself, so the module's (unbounded, module-defined) compute
//! cost never runs at interrupt priority.

#![cfg_attr(not(test), no_std)]

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use ft_module_abi::Module;
use ft_protocol::message::ProfilePayload;

/// Double-buffered codec sample exchange between the audio ISR and the main
/// loop's module call, for a block of `N` samples (`N = 1` is a valid
/// instantiation: one stereo pair per DMA interrupt, as the hardware
/// delivers it; `N > 1` accumulates a multi-sample block, which the module
/// interface is agnostic to).
pub struct AudioBlock<const N: usize> {
    codec_in: UnsafeCell<[i32; N]>,
    codec_out: UnsafeCell<[i32; N]>,
    frame_received: AtomicBool,
}

// SAFETY: exactly one producer (the RX-DMA-done ISR, via `on_frame_complete`)
// and one consumer (the main loop, via `try_process`) ever touch the codec
// buffers, and `frame_received` is the handoff: the ISR writes the buffers
// and only then sets the flag (Release); the main loop only reads the
// buffers after observing the flag set (Acquire), so the two sides never
// access the buffers concurrently.
unsafe impl<const N: usize> Sync for AudioBlock<N> {}

impl<const N: usize> AudioBlock<N> {
    /// Creates a block with both buffers zeroed and no frame pending.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            codec_in: UnsafeCell::new([0; N]),
            codec_out: UnsafeCell::new([0; N]),
            frame_received: AtomicBool::new(false),
        }
    }

    /// Called from the RX-DMA-done ISR. Copies `rx` into the module-visible
    /// input buffer, copies the previously processed output buffer into
    /// `tx` for the hardware to ship on the next frame, and marks a frame
    /// ready for the main loop.
    ///
    /// Must not be called concurrently with itself (single ISR, one call per
    /// interrupt) or interleaved with [`AudioBlock::try_process`] in a way
    /// that would let both sides touch the buffers at once — the latter is
    /// guaranteed by `frame_received`'s Acquire/Release handoff, not by this
    /// function.
    pub fn on_frame_complete(&self, rx: &[i32; N], tx: &mut [i32; N]) {
        // SAFETY: see the `Sync` impl's safety comment — the ISR is the sole
        // writer of `codec_in` and sole reader of `codec_out` at this point,
        // because the main loop only touches either buffer between observing
        // `frame_received == true` and clearing it again.
        unsafe {
            (*self.codec_in.get()).copy_from_slice(rx);
            tx.copy_from_slice(&*self.codec_out.get());
        }
        self.frame_received.store(true, Ordering::Release);
    }

    /// Called from the main loop. If a frame is pending, clears the flag,
    /// calls `module.process`, and returns `true`. Returns `false` without
    /// touching the module if no frame is pending yet.
    pub fn try_process<M: Module>(&self, module: &mut M) -> bool {
        if !self.frame_received.swap(false, Ordering::AcqRel) {
            return false;
        }
        // SAFETY: the flag swap above observed `true` with Acquire ordering,
        // which synchronises with the ISR's Release store in
        // `on_frame_complete` — the buffer writes it made are visible here,
        // and the ISR will not touch either buffer again until it next sets
        // the flag.
        unsafe {
            module.process(&*self.codec_in.get(), &mut *self.codec_out.get());
        }
        true
    }
}

impl<const N: usize> Default for AudioBlock<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cycle-accounting behind `GET_PROFILE`.
///
/// `period` is the ISR-measured cycle count between consecutive frame
/// boundaries (inter-frame period); `cycles` is the main loop's measured
/// cost of the last `module.process` call. Both are free-running hardware
/// cycle counter snapshots, so both fields use wrapping subtraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Profiler {
    last_frame_end_cycles: Option<u32>,
    period: u32,
    cycles: u32,
}

impl Profiler {
    /// Creates a profiler with no measurements yet (`period` and `cycles`
    /// both report 0 until a full frame has been observed).
    #[must_use]
    pub const fn new() -> Self {
        Self { last_frame_end_cycles: None, period: 0, cycles: 0 }
    }

    /// Records a frame boundary, called from the ISR right after
    /// [`AudioBlock::on_frame_complete`] with the current cycle counter.
    /// Updates `period` to the gap since the previous boundary; the first
    /// call after construction only establishes the baseline.
    pub fn record_frame_boundary(&mut self, now_cycles: u32) {
        if let Some(last) = self.last_frame_end_cycles {
            self.period = now_cycles.wrapping_sub(last);
        }
        self.last_frame_end_cycles = Some(now_cycles);
    }

    /// Records the cycle cost of the main loop's last `module.process` call.
    pub fn record_process_cycles(&mut self, start_cycles: u32, stop_cycles: u32) {
        self.cycles = stop_cycles.wrapping_sub(start_cycles);
    }

    /// Snapshot suitable for a `SYSTEM_PROFILE` reply.
    #[must_use]
    pub const fn snapshot(&self) -> ProfilePayload {
        ProfilePayload { period: self.period, cycles: self.cycles }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct RecordingModule {
        last_input: heapless::Vec<i32, 4>,
    }

    impl Module for RecordingModule {
        fn init(&mut self) {}

        fn process(&mut self, input: &[i32], output: &mut [i32]) {
            self.last_input.clear();
            self.last_input.extend_from_slice(input).ok();
            for (out, &sample) in output.iter_mut().zip(input) {
                *out = sample;
            }
        }

        fn set_param(&mut self, _index: u32, _value: i32) {}
        fn get_param(&self, _index: u32) -> i32 {
            0
        }
        fn get_param_count(&self) -> u32 {
            0
        }
        fn get_param_name(&self, _index: u32, _buf: &mut [u8; 16]) -> usize {
            0
        }
    }

    #[test]
    fn try_process_is_a_no_op_until_a_frame_arrives() {
        let block: AudioBlock<2> = AudioBlock::new();
        let mut module = RecordingModule { last_input: heapless::Vec::new() };
        assert!(!block.try_process(&mut module));
    }

    #[test]
    fn on_frame_complete_hands_off_input_and_returns_prior_output() {
        let block: AudioBlock<2> = AudioBlock::new();
        let mut module = RecordingModule { last_input: heapless::Vec::new() };

        let mut tx = [0; 2];
        block.on_frame_complete(&[10, -10], &mut tx);
        assert_eq!(tx, [0, 0], "first frame's TX buffer reflects the still-zeroed codec_out");

        assert!(block.try_process(&mut module));
        assert_eq!(module.last_input.as_slice(), &[10, -10]);

        // Second frame: codec_out now holds what process() wrote.
        block.on_frame_complete(&[1, 2], &mut tx);
        assert_eq!(tx, [10, -10]);
    }

    #[test]
    fn try_process_consumes_the_flag_exactly_once() {
        let block: AudioBlock<2> = AudioBlock::new();
        let mut module = RecordingModule { last_input: heapless::Vec::new() };
        let mut tx = [0; 2];
        block.on_frame_complete(&[1, 1], &mut tx);
        assert!(block.try_process(&mut module));
        assert!(!block.try_process(&mut module), "a frame must only be processed once");
    }

    #[test]
    fn profiler_reports_zero_before_two_boundaries_observed() {
        let profiler = Profiler::new();
        assert_eq!(profiler.snapshot(), ProfilePayload { period: 0, cycles: 0 });
    }

    #[test]
    fn profiler_computes_period_between_boundaries() {
        let mut profiler = Profiler::new();
        profiler.record_frame_boundary(1_000);
        profiler.record_frame_boundary(1_500);
        profiler.record_process_cycles(1_000, 1_120);
        let snap = profiler.snapshot();
        assert_eq!(snap.period, 500);
        assert_eq!(snap.cycles, 120);
    }

    #[test]
    fn profiler_period_handles_cycle_counter_wraparound() {
        let mut profiler = Profiler::new();
        profiler.record_frame_boundary(u32::MAX - 10);
        profiler.record_frame_boundary(9);
        assert_eq!(profiler.snapshot().period, 20);
    }
}
