//! Byte-stream device drivers.
//!
//! Every physical link in this firmware (DSP SPI, panel UART, MIDI UART) is a
//! full-duplex byte stream sitting behind a transmit ring and a receive ring.
//! The ring buffers absorb the rate mismatch between the producing task and
//! the interrupt-driven transport; the transport itself is a small async
//! trait so [`DeviceIo`] stays generic over whatever peripheral a given
//! firmware binary wires in.
//!
//! This mirrors `dev_dsp.c`/`dev_panel.c`'s split between a device's queueing
//! behaviour (shared by every byte-stream device in the system) and its
//! peripheral-specific transfer mechanics (one implementation per physical
//! link).

#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{AtomicBool, Ordering};

use ft_ringbuf::RingBuffer;

/// A single byte in flight over a half-duplex or full-duplex transport.
///
/// Implemented once per physical peripheral (SPI, UART) by the firmware
/// binary that owns the hardware; [`DeviceIo`] drives it without knowing
/// which concrete peripheral it is.
pub trait ByteTransport {
    /// Error type for transfer failures.
    type Error: core::fmt::Debug;

    /// Sends a single byte, returning once the transfer has been accepted by
    /// the peripheral (not necessarily until it is fully clocked out).
    fn send(&mut self, byte: u8) -> impl core::future::Future<Output = Result<(), Self::Error>>;
}

/// A bulk, blocking transfer path that bypasses the transmit ring entirely.
///
/// Used exactly once in this system: streaming the DSP boot image. The boot
/// loader image is tens of kilobytes, sent before the runtime message
/// protocol exists, over a distinct SPI configuration — queueing it
/// byte-by-byte through [`DeviceIo`] would serve no purpose.
pub trait BootTransport {
    /// Error type for the bulk transfer.
    type Error: core::fmt::Debug;

    /// Sends `data` to completion before returning.
    fn send_blob(
        &mut self,
        data: &[u8],
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;
}

/// Queued full-duplex byte-stream device.
///
/// `TXN`/`RXN` are the transmit/receive ring capacities (power of two).
/// The transmit side is "self-clocking": enqueuing a byte while the
/// transport is idle immediately kicks a send; enqueuing while a send is in
/// flight just queues, and the next completion drains the ring.
pub struct DeviceIo<const TXN: usize, const RXN: usize> {
    tx: RingBuffer<u8, TXN>,
    rx: RingBuffer<u8, RXN>,
    tx_complete: AtomicBool,
}

impl<const TXN: usize, const RXN: usize> DeviceIo<TXN, RXN> {
    /// Creates a device with both rings empty and the transport considered idle.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tx: RingBuffer::new(),
            rx: RingBuffer::new(),
            tx_complete: AtomicBool::new(true),
        }
    }

    /// Queues `byte` for transmission, overwriting the oldest unsent byte if
    /// the transmit ring is full.
    ///
    /// Matches `dev_dsp_spi_tx_enqueue`'s use of `ring_buffer_put_force`: a
    /// full transmit ring means the consumer (the transport) has stalled, and
    /// losing the oldest queued byte is preferable to blocking the caller.
    pub fn tx_enqueue(&self, byte: u8) {
        self.tx.put_force(byte);
    }

    /// Queues a whole slice for transmission, in order.
    pub fn tx_enqueue_slice(&self, data: &[u8]) {
        for &byte in data {
            self.tx_enqueue(byte);
        }
    }

    /// Pops the oldest received byte, if any.
    pub fn rx_dequeue(&self) -> Option<u8> {
        self.rx.get()
    }

    /// Feeds one byte received from the transport into the receive ring.
    ///
    /// Called from the transport's receive-complete path (an ISR on
    /// hardware, a callback in host-side tests).
    pub fn on_rx_byte(&self, byte: u8) {
        self.rx.put_force(byte);
    }

    /// Drives one step of the transmit pump: if the transport is idle and a
    /// byte is queued, sends it and marks the transport busy until the
    /// caller reports completion with [`DeviceIo::on_tx_complete`].
    pub async fn pump<T: ByteTransport>(&self, transport: &mut T) -> Result<(), T::Error> {
        if !self.tx_complete.load(Ordering::Acquire) {
            return Ok(());
        }
        if let Some(byte) = self.tx.get() {
            self.tx_complete.store(false, Ordering::Release);
            transport.send(byte).await?;
        }
        Ok(())
    }

    /// Reports that the in-flight transmit byte has been fully clocked out.
    ///
    /// Called from the transport's transmit-complete path. Leaves the
    /// transport idle so the next [`DeviceIo::pump`] can send the next
    /// queued byte.
    pub fn on_tx_complete(&self) {
        self.tx_complete.store(true, Ordering::Release);
    }

    /// True if no bytes are queued for transmission.
    pub fn tx_is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// True if no bytes are queued for reception.
    pub fn rx_is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<const TXN: usize, const RXN: usize> Default for DeviceIo<TXN, RXN> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    struct FakeTransport {
        sent: heapless::Vec<u8, 16>,
    }

    impl ByteTransport for FakeTransport {
        type Error = core::convert::Infallible;

        async fn send(&mut self, byte: u8) -> Result<(), Self::Error> {
            self.sent.push(byte).ok();
            Ok(())
        }
    }

    #[test]
    fn rx_enqueue_dequeue() {
        let dev: DeviceIo<8, 8> = DeviceIo::new();
        assert!(dev.rx_is_empty());
        dev.on_rx_byte(0x42);
        assert_eq!(dev.rx_dequeue(), Some(0x42));
        assert_eq!(dev.rx_dequeue(), None);
    }

    #[tokio::test]
    async fn pump_sends_one_queued_byte_then_waits_for_completion() {
        let dev: DeviceIo<8, 8> = DeviceIo::new();
        let mut transport = FakeTransport { sent: heapless::Vec::new() };

        dev.tx_enqueue_slice(&[1, 2, 3]);
        dev.pump(&mut transport).await.unwrap();
        assert_eq!(transport.sent.as_slice(), &[1]);

        // Transport still busy: a second pump before completion sends nothing.
        dev.pump(&mut transport).await.unwrap();
        assert_eq!(transport.sent.as_slice(), &[1]);

        dev.on_tx_complete();
        dev.pump(&mut transport).await.unwrap();
        assert_eq!(transport.sent.as_slice(), &[1, 2]);
    }
}
