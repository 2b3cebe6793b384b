//! Central publish/subscribe event queue.
//!
//! Every producer (device ISRs, the protocol dispatcher, the panel
//! handshake) publishes into one shared queue; one task dequeues and
//! synchronously dispatches to every listener subscribed to that event's id.
//! Grounded on `svc_event.c`, with one correction: the original's listener
//! table reuses a freed slot using whatever pointer the scan loop last
//! happened to leave behind when it didn't `break` on the first free slot —
//! harmless with at most one free slot, silently wrong with more than one.
//! This implementation stops at the first free slot, which is what the
//! original's own doc comment says it intends to do.

#![cfg_attr(not(test), no_std)]

/// Identifies an event's listener row and queue slot.
///
/// A newtype over `u8` rather than an enum: this crate doesn't know the
/// application's event catalog, only that ids are small and dense (the
/// listener table is a fixed `[_; EVENT_COUNT]` array indexed directly by
/// this value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventId(pub u8);

/// A subscribed callback. Plain function pointers only (no closures): every
/// listener in this firmware is a free function, and function pointers are
/// `Copy` and fit in a `const`-initialised array without heap allocation.
pub type Listener = fn(EventId, &[u8]);

/// Errors from queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventError {
    /// `EventId` is outside the configured `EVENT_COUNT`.
    UnknownEvent,
    /// The listener table for this event is full.
    TooManyListeners,
    /// The index queue or data ring is full; the event was dropped.
    QueueFull,
}

#[derive(Clone, Copy)]
struct IndexEntry {
    id: u8,
    len: u8,
}

/// Fixed-capacity publish/subscribe event queue.
///
/// - `EVENT_COUNT`: number of distinct event ids (listener rows).
/// - `MAX_LISTENERS`: listeners per event id.
/// - `INDEX_CAP`: queued-but-undispatched event capacity (power of two).
/// - `DATA_CAP`: total bytes of in-flight event payload (power of two).
/// - `EVENT_DATA_MAX`: largest single event payload.
pub struct EventQueue<
    const EVENT_COUNT: usize,
    const MAX_LISTENERS: usize,
    const INDEX_CAP: usize,
    const DATA_CAP: usize,
    const EVENT_DATA_MAX: usize,
> {
    index: ft_ringbuf::RingBuffer<IndexEntry, INDEX_CAP>,
    data: ft_ringbuf::RingBuffer<u8, DATA_CAP>,
    listeners: [[Option<Listener>; MAX_LISTENERS]; EVENT_COUNT],
    // Count of populated slots in each row, mirroring `t_listener_row::top`.
    // Unlike the original, this never needs to be an index into the array
    // past a hole: `subscribe` always fills the first `None` it finds.
    top: [u8; EVENT_COUNT],
}

impl<
        const EVENT_COUNT: usize,
        const MAX_LISTENERS: usize,
        const INDEX_CAP: usize,
        const DATA_CAP: usize,
        const EVENT_DATA_MAX: usize,
    > EventQueue<EVENT_COUNT, MAX_LISTENERS, INDEX_CAP, DATA_CAP, EVENT_DATA_MAX>
{
    /// Creates an empty queue with no subscribers.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            index: ft_ringbuf::RingBuffer::new(),
            data: ft_ringbuf::RingBuffer::new(),
            listeners: [[None; MAX_LISTENERS]; EVENT_COUNT],
            top: [0; EVENT_COUNT],
        }
    }

    /// Registers `listener` for `id`, reusing the first unsubscribed slot in
    /// that event's row if one exists.
    pub fn subscribe(&mut self, id: EventId, listener: Listener) -> Result<(), EventError> {
        let row = self.listeners.get_mut(id.0 as usize).ok_or(EventError::UnknownEvent)?;
        let top = self.top.get_mut(id.0 as usize).ok_or(EventError::UnknownEvent)?;

        for slot in row.iter_mut().take(*top as usize) {
            if slot.is_none() {
                *slot = Some(listener);
                return Ok(());
            }
        }

        let next = *top as usize;
        let slot = row.get_mut(next).ok_or(EventError::TooManyListeners)?;
        *slot = Some(listener);
        *top = top.saturating_add(1);
        Ok(())
    }

    /// Removes `listener` from `id`'s row, if subscribed. The slot is left
    /// `None` and will be reused by a later `subscribe`.
    pub fn unsubscribe(&mut self, id: EventId, listener: Listener) {
        if let Some(row) = self.listeners.get_mut(id.0 as usize) {
            for slot in row.iter_mut() {
                if *slot == Some(listener) {
                    *slot = None;
                }
            }
        }
    }

    /// Publishes an event. Enqueues the id and payload atomically with
    /// respect to other publishers (the one documented critical section in
    /// this system — publishers may run from interrupt context).
    pub fn publish(&self, id: EventId, payload: &[u8]) -> Result<(), EventError> {
        if id.0 as usize >= EVENT_COUNT {
            return Err(EventError::UnknownEvent);
        }
        if payload.len() > EVENT_DATA_MAX || payload.len() > u8::MAX as usize {
            return Err(EventError::QueueFull);
        }

        critical_section::with(|_| {
            #[allow(clippy::cast_possible_truncation)]
            let entry = IndexEntry { id: id.0, len: payload.len() as u8 };
            self.index.put(entry).map_err(|_| EventError::QueueFull)?;
            for &byte in payload {
                self.data.put(byte).map_err(|_| EventError::QueueFull)?;
            }
            Ok(())
        })
    }

    /// Dequeues and synchronously dispatches the next queued event to every
    /// subscribed listener, in subscription order. Returns `true` if an
    /// event was dispatched, `false` if the queue was empty.
    pub fn dispatch_next(&mut self) -> bool {
        let Some(entry) = self.index.get() else {
            return false;
        };

        let mut buf = [0u8; EVENT_DATA_MAX];
        let len = (entry.len as usize).min(EVENT_DATA_MAX);
        for slot in buf.iter_mut().take(len) {
            *slot = self.data.get().unwrap_or(0);
        }

        let id = EventId(entry.id);
        if let Some(row) = self.listeners.get(id.0 as usize) {
            let top = self.top.get(id.0 as usize).copied().unwrap_or(0);
            for listener in row.iter().take(top as usize).flatten() {
                listener(id, &buf[..len]);
            }
        }
        true
    }
}

impl<
        const EVENT_COUNT: usize,
        const MAX_LISTENERS: usize,
        const INDEX_CAP: usize,
        const DATA_CAP: usize,
        const EVENT_DATA_MAX: usize,
    > Default for EventQueue<EVENT_COUNT, MAX_LISTENERS, INDEX_CAP, DATA_CAP, EVENT_DATA_MAX>
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    type TestQueue = EventQueue<4, 4, 16, 64, 8>;

    static CALL_COUNT: AtomicU32 = AtomicU32::new(0);
    static LAST_PAYLOAD_LEN: AtomicU32 = AtomicU32::new(0);

    fn recording_listener(_id: EventId, payload: &[u8]) {
        CALL_COUNT.fetch_add(1, Ordering::SeqCst);
        LAST_PAYLOAD_LEN.store(payload.len() as u32, Ordering::SeqCst);
    }

    fn other_listener(_id: EventId, _payload: &[u8]) {}

    #[test]
    fn publish_then_dispatch_calls_subscriber() {
        CALL_COUNT.store(0, Ordering::SeqCst);
        let mut q = TestQueue::new();
        q.subscribe(EventId(1), recording_listener).unwrap();
        q.publish(EventId(1), &[1, 2, 3]).unwrap();
        assert!(q.dispatch_next());
        assert_eq!(CALL_COUNT.load(Ordering::SeqCst), 1);
        assert_eq!(LAST_PAYLOAD_LEN.load(Ordering::SeqCst), 3);
        assert!(!q.dispatch_next());
    }

    #[test]
    fn unsubscribed_event_id_is_rejected() {
        let q = TestQueue::new();
        assert_eq!(q.publish(EventId(200), &[]), Err(EventError::UnknownEvent));
    }

    #[test]
    fn unsubscribe_then_resubscribe_reuses_first_free_slot() {
        let mut q = TestQueue::new();
        q.subscribe(EventId(0), recording_listener).unwrap();
        q.subscribe(EventId(0), other_listener).unwrap();
        q.unsubscribe(EventId(0), recording_listener);
        // A third, distinct listener should land in the slot just freed,
        // not grow the row — this is the bug the original's comment flags.
        q.subscribe(EventId(0), recording_listener).unwrap();
        assert_eq!(q.top[0], 2);
    }

    #[test]
    fn listener_row_full_rejects_further_subscribes() {
        let mut q = TestQueue::new();
        for _ in 0..4 {
            q.subscribe(EventId(2), other_listener).unwrap();
        }
        assert_eq!(q.subscribe(EventId(2), recording_listener), Err(EventError::TooManyListeners));
    }
}
