//! CPU-side task wiring: the DSP message link, the panel MCU link, and the
//! central event queue, composed as [`ft_kernel`] tasks.
//!
//! Mirrors `knl_main.c`'s fixed task registration order (event dispatch
//! first, then the DSP link, then the panel link) and `svc_dsp.c`'s split
//! between the one-shot boot sequence ([`boot_dsp`], built on
//! [`ft_dsp_boot`]) and the steady-state message protocol driven every pass
//! by [`DspLinkTask`]. The MIDI UART is deliberately absent from this task
//! set: it is raw byte enqueue/dequeue over [`ft_device_io::DeviceIo`] only,
//! with no frame parser or task logic of its own.

#![cfg_attr(not(test), no_std)]

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_time::{Duration, Instant, Timer};
use ft_device_io::{BootTransport, DeviceIo};
use ft_dsp_boot::{Advance, DspBoot, ResetLine};
use ft_events::{EventId, EventQueue};
use ft_kernel::{TaskLogic, TaskResult};
use ft_panel_protocol::{PanelRecord, PANEL_INIT_RECORD};
use ft_protocol::frame::{encode_frame, FrameParser, MAX_PAYLOAD_LEN};
use ft_protocol::message::Message;
use ft_protocol::pending::PendingResponses;

/// Published whenever a complete DSP-link message is decoded.
pub const EVENT_DSP_MESSAGE: EventId = EventId(0);
/// Published whenever the panel MCU sends a complete input record.
pub const EVENT_PANEL_INPUT: EventId = EventId(1);
/// Number of distinct event ids this firmware's queue is sized for.
pub const EVENT_COUNT: usize = 2;

/// Shared event queue type, sized for this firmware's event catalog.
///
/// Every producer reaches it through a [`Mutex`]: [`EventQueue::publish`]
/// only needs `&self` internally, but [`EventQueue::dispatch_next`] needs
/// exclusive access to the listener table, so the queue as a whole is kept
/// behind the same critical section either way.
pub type Events = EventQueue<EVENT_COUNT, 4, 16, 256, 32>;

/// A statically allocated, zero-initialised event queue suitable for a
/// `static EVENTS: SharedEvents = SharedEvents::new();` declaration.
pub type SharedEvents = Mutex<RefCell<Events>>;

/// Creates the `const` initialiser for a [`SharedEvents`] static.
#[must_use]
pub const fn new_shared_events() -> SharedEvents {
    Mutex::new(RefCell::new(Events::new()))
}

fn publish(events: &SharedEvents, id: EventId, payload: &[u8]) {
    critical_section::with(|cs| {
        events.borrow(cs).borrow_mut().publish(id, payload).ok();
    });
}

/// Errors from [`boot_dsp`].
#[derive(Debug)]
pub enum BootError<RE, TE> {
    /// The reset line failed to assert or release.
    Reset(RE),
    /// The bulk boot-image transfer failed.
    Transport(TE),
}

/// Drives the DSP from an unknown reset state through
/// [`ft_dsp_boot::Run`], sending `image` once both timed waits have
/// elapsed. Runs once at startup, before [`DspLinkTask`] begins polling the
/// runtime message link.
pub async fn boot_dsp<R: ResetLine, T: BootTransport>(
    reset: R,
    transport: &mut T,
    image: &[u8],
) -> Result<R, BootError<R::Error, T::Error>> {
    const POLL_INTERVAL: Duration = Duration::from_micros(100);

    let boot = DspBoot::new(reset).assert_reset(Instant::now()).map_err(BootError::Reset)?;

    let mut boot = boot;
    let boot = loop {
        match boot.try_release_reset(Instant::now()).map_err(BootError::Reset)? {
            Advance::Ready(next) => break next,
            Advance::Waiting(same) => {
                boot = same;
                Timer::after(POLL_INTERVAL).await;
            }
        }
    };

    let mut boot = boot;
    let boot = loop {
        match boot.try_begin_boot(Instant::now()) {
            Advance::Ready(next) => break next,
            Advance::Waiting(same) => {
                boot = same;
                Timer::after(POLL_INTERVAL).await;
            }
        }
    };

    let boot = boot.send_image(transport, image).await.map_err(BootError::Transport)?;
    Ok(boot.into_reset_line())
}

/// Steady-state CPU-DSP message link: drains received bytes through the
/// frame parser, decodes completed frames, publishes each to [`Events`],
/// and keeps [`PendingResponses`] in sync so the caller knows when to keep
/// polling the DSP SPI device.
pub struct DspLinkTask<const TXN: usize, const RXN: usize> {
    io: &'static DeviceIo<TXN, RXN>,
    events: &'static SharedEvents,
    parser: FrameParser,
    pending: PendingResponses,
    decode_errors: u32,
}

impl<const TXN: usize, const RXN: usize> DspLinkTask<TXN, RXN> {
    /// Creates a task bound to `io` and publishing decoded messages to `events`.
    #[must_use]
    pub const fn new(io: &'static DeviceIo<TXN, RXN>, events: &'static SharedEvents) -> Self {
        Self {
            io,
            events,
            parser: FrameParser::new(),
            pending: PendingResponses::new(),
            decode_errors: 0,
        }
    }

    /// Encodes and enqueues `message`, recording that a response is owed if
    /// it expects one.
    pub fn send(&self, message: &Message) {
        let (msg_type, msg_id, payload) = message.encode();
        let mut frame = [0u8; 4 + MAX_PAYLOAD_LEN];
        if let Some(n) = encode_frame(msg_type, msg_id, &payload, &mut frame) {
            if let Some(bytes) = frame.get(..n) {
                self.io.tx_enqueue_slice(bytes);
            }
        }
        if message.expects_response() {
            self.pending.request_sent();
        }
    }

    /// True while the DSP SPI device should keep being polled for a reply.
    #[must_use]
    pub fn should_poll(&self) -> bool {
        self.pending.should_poll()
    }

    /// Count of frames that parsed but failed to decode into a known
    /// message, for diagnostics.
    #[must_use]
    pub fn decode_errors(&self) -> u32 {
        self.decode_errors
    }

    fn drain_rx(&mut self) {
        while let Some(byte) = self.io.rx_dequeue() {
            let Some(frame) = self.parser.feed(byte) else { continue };
            match Message::decode(frame.msg_type, frame.msg_id, frame.payload) {
                Ok(message) => {
                    if message.is_response() {
                        self.pending.response_received();
                    }
                    let mut buf = [0u8; 2 + MAX_PAYLOAD_LEN];
                    if let Some(slot) = buf.first_mut() {
                        *slot = frame.msg_type;
                    }
                    if let Some(slot) = buf.get_mut(1) {
                        *slot = frame.msg_id;
                    }
                    let len = 2usize.saturating_add(frame.payload.len());
                    if let Some(dst) = buf.get_mut(2..len) {
                        dst.copy_from_slice(frame.payload);
                    }
                    let payload_bytes = buf.get(..len).unwrap_or(&[]);
                    publish(self.events, EVENT_DSP_MESSAGE, payload_bytes);
                }
                Err(_) => self.decode_errors = self.decode_errors.saturating_add(1),
            }
        }
    }
}

impl<const TXN: usize, const RXN: usize> TaskLogic for DspLinkTask<TXN, RXN> {
    fn init(&mut self) -> TaskResult {
        TaskResult::Success
    }

    fn run(&mut self) -> TaskResult {
        self.drain_rx();
        TaskResult::Success
    }
}

/// CPU-panel MCU link: sends [`PANEL_INIT_RECORD`] once, then assembles
/// fixed 5-byte records out of the receive ring, tracking the init
/// handshake and publishing each parsed record to [`Events`].
pub struct PanelLinkTask<const TXN: usize, const RXN: usize> {
    io: &'static DeviceIo<TXN, RXN>,
    events: &'static SharedEvents,
    handshake: ft_panel_protocol::PanelHandshake,
    assembling: [u8; 5],
    assembled: usize,
}

impl<const TXN: usize, const RXN: usize> PanelLinkTask<TXN, RXN> {
    /// Creates a task bound to `io` and publishing parsed records to `events`.
    #[must_use]
    pub const fn new(io: &'static DeviceIo<TXN, RXN>, events: &'static SharedEvents) -> Self {
        Self {
            io,
            events,
            handshake: ft_panel_protocol::PanelHandshake::new(),
            assembling: [0; 5],
            assembled: 0,
        }
    }

    /// True once the panel MCU has acknowledged the init handshake.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.handshake.is_ready()
    }

    fn drain_rx(&mut self) {
        while let Some(byte) = self.io.rx_dequeue() {
            if let Some(slot) = self.assembling.get_mut(self.assembled) {
                *slot = byte;
            }
            self.assembled = self.assembled.saturating_add(1);
            if self.assembled < self.assembling.len() {
                continue;
            }
            self.assembled = 0;
            let Some(record) = PanelRecord::from_bytes(self.assembling) else { continue };
            self.handshake.on_record(&record);
            publish(self.events, EVENT_PANEL_INPUT, &record.to_bytes());
        }
    }
}

impl<const TXN: usize, const RXN: usize> TaskLogic for PanelLinkTask<TXN, RXN> {
    fn init(&mut self) -> TaskResult {
        self.io.tx_enqueue_slice(&PANEL_INIT_RECORD);
        TaskResult::Success
    }

    fn run(&mut self) -> TaskResult {
        self.drain_rx();
        TaskResult::Success
    }
}

/// Drains every queued event, dispatching each to its subscribed listeners.
///
/// Registered first in the scheduler's run order, matching `knl_main.c`:
/// events published by the previous pass's link tasks are dispatched before
/// those tasks run again.
pub struct EventDispatchTask {
    events: &'static SharedEvents,
}

impl EventDispatchTask {
    /// Creates a task that drains `events` once per pass.
    #[must_use]
    pub const fn new(events: &'static SharedEvents) -> Self {
        Self { events }
    }
}

impl TaskLogic for EventDispatchTask {
    fn init(&mut self) -> TaskResult {
        TaskResult::Success
    }

    fn run(&mut self) -> TaskResult {
        critical_section::with(|cs| {
            let mut events = self.events.borrow(cs).borrow_mut();
            while events.dispatch_next() {}
        });
        TaskResult::Success
    }
}
