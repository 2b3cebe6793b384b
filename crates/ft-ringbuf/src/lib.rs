//! Single-producer/single-consumer ring buffers.
//!
//! Every byte-stream device driver and the central event queue are built on
//! top of [`RingBuffer`]. It is lock-free: the producer only ever touches the
//! write side, the consumer only the read side, and the two halves
//! synchronise through a pair of atomic cursors. No critical section, no
//! allocation.
//!
//! Capacity must be a power of two so the cursor-to-slot mapping is a mask
//! instead of a modulo. One slot is always kept empty: a ring with `N`
//! physical slots holds at most `N - 1` elements, the same reserved-slot
//! convention the original ring buffers use to tell "empty" and "full"
//! apart without a separate count field.

#![cfg_attr(not(test), no_std)]

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

/// A fixed-capacity, lock-free single-producer/single-consumer ring buffer.
///
/// `N` must be a power of two; this is checked at construction time.
/// `T` must be `Copy` — slots are overwritten in place rather than dropped,
/// which matches the only element types this crate ever stores (bytes and
/// small `Copy` protocol records).
pub struct RingBuffer<T, const N: usize> {
    buf: UnsafeCell<[MaybeUninit<T>; N]>,
    // Monotonically increasing cursors. The in-buffer slot is `cursor & MASK`;
    // the element count is `tail.wrapping_sub(head)`, which stays correct
    // under wraparound as long as the buffer never holds more than `usize::MAX`
    // elements in flight (it never does — `count <= N`).
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: `RingBuffer` hands out shared access to producer and consumer
// concurrently, but the algorithm only ever lets the producer write the slot
// at `tail & MASK` and the consumer read the slot at `head & MASK`; those
// indices never alias while the buffer invariants hold. `T: Send` is required
// because a value produced on one core is consumed on another.
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    // `new()` asserts N is a nonzero power of two before any instance exists,
    // so this never underflows in practice.
    #[allow(clippy::arithmetic_side_effects)]
    const MASK: usize = N - 1;
    // One slot is always kept empty so `len() == N` (indistinguishable from
    // `len() == 0` under wraparound with only two cursors) never occurs.
    #[allow(clippy::arithmetic_side_effects)]
    const USABLE: usize = N - 1;

    /// Creates an empty ring buffer.
    ///
    /// # Panics
    ///
    /// Panics if `N` is zero or not a power of two. This is a construction-time
    /// programmer error, not a runtime condition, so it is checked with a
    /// `const` assertion rather than a `Result`.
    #[must_use]
    pub const fn new() -> Self {
        const { assert!(N > 0 && N.is_power_of_two(), "RingBuffer capacity must be a power of two") };
        Self {
            buf: UnsafeCell::new([const { MaybeUninit::uninit() }; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Number of elements currently queued.
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    /// True if no elements are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the buffer holds as many elements as it can
    /// (`capacity() - 1`; one slot is always kept empty).
    pub fn is_full(&self) -> bool {
        self.len() == Self::USABLE
    }

    /// Total number of physical slots. One slot is always kept empty, so at
    /// most `capacity() - 1` elements are ever queued at once.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Pushes `item`. Returns `item` back if the buffer is already full.
    ///
    /// Producer-side only; do not call concurrently from more than one
    /// context.
    pub fn put(&self, item: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) == Self::USABLE {
            return Err(item);
        }
        // SAFETY: the producer is the sole writer of the slot at `tail & MASK`;
        // the occupancy check above guarantees the consumer is not still
        // reading it.
        unsafe {
            (*self.buf.get())
                .get_mut(tail & Self::MASK)
                .unwrap_or_else(|| unreachable!("mask keeps index in bounds"))
                .write(item);
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Pushes `item`, overwriting the oldest queued element if the buffer is
    /// full.
    ///
    /// Mirrors `ring_buffer_put_force` in the original device drivers: used
    /// where a stalled consumer must never block the producer (e.g. an ISR
    /// enqueuing into a transmit ring).
    pub fn put_force(&self, item: T) {
        if self.is_full() {
            // Drop the oldest element by advancing the read cursor past it.
            let head = self.head.load(Ordering::Relaxed);
            self.head.store(head.wrapping_add(1), Ordering::Release);
        }
        // `put` cannot fail now: we just freed a slot (or there already was one).
        let _ = self.put(item);
    }

    /// Pops the oldest queued element, or `None` if empty.
    ///
    /// Consumer-side only; do not call concurrently from more than one
    /// context.
    pub fn get(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if tail.wrapping_sub(head) == 0 {
            return None;
        }
        // SAFETY: the consumer is the sole reader of the slot at `head & MASK`;
        // the occupancy check above guarantees the producer already committed
        // a value there and will not touch it again until the cursor advances.
        let value = unsafe {
            (*self.buf.get())
                .get(head & Self::MASK)
                .unwrap_or_else(|| unreachable!("mask keeps index in bounds"))
                .assume_init()
        };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(value)
    }
}

impl<T: Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn put_get_roundtrip() {
        let rb: RingBuffer<u8, 4> = RingBuffer::new();
        assert!(rb.is_empty());
        assert_eq!(rb.put(1), Ok(()));
        assert_eq!(rb.put(2), Ok(()));
        assert_eq!(rb.len(), 2);
        assert_eq!(rb.get(), Some(1));
        assert_eq!(rb.get(), Some(2));
        assert_eq!(rb.get(), None);
    }

    #[test]
    fn put_fails_when_full() {
        let rb: RingBuffer<u8, 2> = RingBuffer::new();
        assert_eq!(rb.put(1), Ok(()));
        assert_eq!(rb.put(2), Err(2));
        assert!(rb.is_full());
    }

    #[test]
    fn put_force_overwrites_oldest() {
        let rb: RingBuffer<u8, 2> = RingBuffer::new();
        rb.put(1).unwrap();
        rb.put_force(2);
        assert_eq!(rb.get(), Some(2));
        assert_eq!(rb.get(), None);
    }

    #[test]
    fn only_capacity_minus_one_elements_are_usable() {
        let rb: RingBuffer<u8, 16> = RingBuffer::new();
        for n in 0..15u8 {
            assert_eq!(rb.put(n), Ok(()));
        }
        assert!(rb.is_full());
        assert_eq!(rb.put(15), Err(15));
        assert_eq!(rb.len(), 15);
        assert!(rb.len() <= rb.capacity() - 1);
    }

    #[test]
    fn put_force_past_full_keeps_one_slot_reserved() {
        let rb: RingBuffer<u8, 16> = RingBuffer::new();
        for n in 0..15u8 {
            rb.put(n).unwrap();
        }
        for n in 15..19u8 {
            rb.put_force(n);
        }
        let mut remaining = std::vec::Vec::new();
        while let Some(v) = rb.get() {
            remaining.push(v);
        }
        assert_eq!(remaining, std::vec![4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18]);
    }

    #[test]
    fn wraps_past_capacity_boundary() {
        let rb: RingBuffer<u8, 4> = RingBuffer::new();
        for round in 0..10u8 {
            rb.put(round).unwrap();
            assert_eq!(rb.get(), Some(round));
        }
    }

    #[test]
    fn capacity_reports_n() {
        let rb: RingBuffer<u32, 8> = RingBuffer::new();
        assert_eq!(rb.capacity(), 8);
    }
}
