//! DSP-side task wiring: the per-frame module call and the CPU-DSP message
//! responder, composed as [`ft_kernel`] tasks.
//!
//! Mirrors `dsp/src/kernel/main.c`'s main loop exactly: check for a
//! completed audio frame, call into the module with cycle accounting around
//! it, then service the CPU link (`svc_cpu_task`). Unlike the CPU-side
//! firmware, the DSP side never initiates a request — every reply here is
//! in response to something the CPU sent, which is why [`DspMessageTask`]
//! has no outbound "poll" state of its own.

#![cfg_attr(not(test), no_std)]

use core::cell::RefCell;

use critical_section::Mutex;
use ft_audio_block::{AudioBlock, Profiler};
use ft_device_io::DeviceIo;
use ft_kernel::{TaskLogic, TaskResult};
use ft_module_abi::Module;
use ft_protocol::frame::{encode_frame, FrameParser, MAX_PAYLOAD_LEN};
use ft_protocol::message::{
    GetParamNamePayload, GetParamValuePayload, Message, ModuleMessage, ParamNamePayload,
    ParamValuePayload, PortStatePayload, SystemMessage, MAX_PARAM_NAME_LENGTH,
};

/// Free-running hardware cycle counter. Abstracted behind a trait so
/// [`AudioTask`] and [`on_frame_complete`] build and test the same way on
/// hardware (reading a real cycle-count register) and on a desktop host
/// (a fake counter).
pub trait CycleCounter {
    /// Current counter value. Wraps; callers always difference two
    /// readings with wrapping subtraction.
    fn now(&self) -> u32;
}

/// A module instance shared between [`AudioTask`] (which calls `process`
/// every frame) and [`DspMessageTask`] (which serves `GET_PARAM_VALUE` /
/// `SET_PARAM_VALUE` / `GET_PARAM_NAME` on its behalf).
pub type SharedModule<M> = Mutex<RefCell<M>>;

/// Cycle-accounting state shared between the audio ISR (which records frame
/// boundaries) and [`DspMessageTask`] (which reads a snapshot for
/// `GET_PROFILE`).
pub type SharedProfiler = Mutex<RefCell<Profiler>>;

/// Creates the `const` initialiser for a [`SharedModule`] static.
#[must_use]
pub const fn new_shared_module<M>(module: M) -> SharedModule<M> {
    Mutex::new(RefCell::new(module))
}

/// Creates the `const` initialiser for a [`SharedProfiler`] static.
#[must_use]
pub const fn new_shared_profiler() -> SharedProfiler {
    Mutex::new(RefCell::new(Profiler::new()))
}

/// Called from the audio DMA-complete ISR for one finished frame: hands the
/// codec buffers off to [`AudioTask`] and records the inter-frame period.
pub fn on_frame_complete<const N: usize>(
    block: &AudioBlock<N>,
    profiler: &SharedProfiler,
    rx: &[i32; N],
    tx: &mut [i32; N],
    now_cycles: u32,
) {
    block.on_frame_complete(rx, tx);
    critical_section::with(|cs| {
        profiler.borrow(cs).borrow_mut().record_frame_boundary(now_cycles);
    });
}

/// Main-loop task: calls into the installed module once a frame is pending
/// and records its cycle cost.
pub struct AudioTask<const N: usize, M: Module + 'static, C: CycleCounter> {
    block: &'static AudioBlock<N>,
    module: &'static SharedModule<M>,
    profiler: &'static SharedProfiler,
    counter: C,
}

impl<const N: usize, M: Module + 'static, C: CycleCounter> AudioTask<N, M, C> {
    /// Creates a task that processes frames from `block` through `module`,
    /// timed with `counter`.
    pub const fn new(
        block: &'static AudioBlock<N>,
        module: &'static SharedModule<M>,
        profiler: &'static SharedProfiler,
        counter: C,
    ) -> Self {
        Self { block, module, profiler, counter }
    }
}

impl<const N: usize, M: Module + 'static, C: CycleCounter> TaskLogic for AudioTask<N, M, C> {
    fn init(&mut self) -> TaskResult {
        critical_section::with(|cs| self.module.borrow(cs).borrow_mut().init());
        TaskResult::Success
    }

    fn run(&mut self) -> TaskResult {
        let start = self.counter.now();
        let processed = critical_section::with(|cs| {
            let mut module = self.module.borrow(cs).borrow_mut();
            self.block.try_process(&mut *module)
        });
        if processed {
            let stop = self.counter.now();
            critical_section::with(|cs| {
                self.profiler.borrow(cs).borrow_mut().record_process_cycles(start, stop);
            });
        }
        TaskResult::Success
    }
}

/// CPU-DSP message responder. Every message handled here is either a
/// `GET_*`/`SET_*` request from the CPU or `CHECK_READY`; this task only
/// ever replies, it never sends unsolicited messages.
///
/// `GET_PORT_STATE`/`SET_PORT_STATE` name the three GPIO port registers
/// (`port_f`, `port_g`, `port_h`) the reference firmware reads with
/// `per_gpio_get_port`; this firmware has no GPIO peripheral wired in yet
/// (see the hardware bring-up TODOs in `main.rs`), so the values are plain
/// in-memory bookkeeping the CPU can read back and overwrite.
pub struct DspMessageTask<const TXN: usize, const RXN: usize, M: Module + 'static> {
    io: &'static DeviceIo<TXN, RXN>,
    module: &'static SharedModule<M>,
    profiler: &'static SharedProfiler,
    parser: FrameParser,
    port_state: PortStatePayload,
    decode_errors: u32,
}

impl<const TXN: usize, const RXN: usize, M: Module + 'static> DspMessageTask<TXN, RXN, M> {
    /// Creates a responder bound to `io`, serving `module`'s parameters and
    /// `profiler`'s cycle-accounting snapshot.
    #[must_use]
    pub const fn new(
        io: &'static DeviceIo<TXN, RXN>,
        module: &'static SharedModule<M>,
        profiler: &'static SharedProfiler,
    ) -> Self {
        Self {
            io,
            module,
            profiler,
            parser: FrameParser::new(),
            port_state: PortStatePayload { port_f: 0, port_g: 0, port_h: 0 },
            decode_errors: 0,
        }
    }

    /// Count of frames that parsed but failed to decode into a known
    /// message, for diagnostics.
    #[must_use]
    pub fn decode_errors(&self) -> u32 {
        self.decode_errors
    }

    fn reply(&self, msg_type: u8, msg_id: u8, payload: &[u8]) {
        let mut frame = [0u8; 4 + MAX_PAYLOAD_LEN];
        if let Some(n) = encode_frame(msg_type, msg_id, payload, &mut frame) {
            if let Some(bytes) = frame.get(..n) {
                self.io.tx_enqueue_slice(bytes);
            }
        }
    }

    fn send(&self, message: &Message) {
        let (msg_type, msg_id, payload) = message.encode();
        self.reply(msg_type, msg_id, &payload);
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::System(SystemMessage::CheckReady) => {
                self.send(&Message::System(SystemMessage::Ready));
            }
            Message::System(SystemMessage::GetPortState) => {
                self.send(&Message::System(SystemMessage::PortState(self.port_state)));
            }
            Message::System(SystemMessage::SetPortState(state)) => {
                self.port_state = state;
            }
            Message::System(SystemMessage::GetProfile) => {
                let snapshot = critical_section::with(|cs| self.profiler.borrow(cs).borrow().snapshot());
                self.send(&Message::System(SystemMessage::Profile(snapshot)));
            }
            Message::Module(ModuleMessage::GetParamValue(GetParamValuePayload { module_id, param_index })) => {
                let value = critical_section::with(|cs| {
                    self.module.borrow(cs).borrow().get_param(u32::from(param_index))
                });
                self.send(&Message::Module(ModuleMessage::ParamValue(ParamValuePayload {
                    module_id,
                    param_index,
                    value,
                })));
            }
            Message::Module(ModuleMessage::SetParamValue(ParamValuePayload { param_index, value, .. })) => {
                critical_section::with(|cs| {
                    self.module.borrow(cs).borrow_mut().set_param(u32::from(param_index), value);
                });
            }
            Message::Module(ModuleMessage::GetParamName(GetParamNamePayload { module_id, param_index })) => {
                let mut name = [0u8; MAX_PARAM_NAME_LENGTH];
                critical_section::with(|cs| {
                    self.module.borrow(cs).borrow().get_param_name(u32::from(param_index), &mut name);
                });
                self.send(&Message::Module(ModuleMessage::ParamName(ParamNamePayload {
                    module_id,
                    param_index,
                    name,
                })));
            }
            // Replies are never sent to us; a well-formed CPU link never
            // produces these on this side of the wire.
            Message::Module(ModuleMessage::ParamValue(_) | ModuleMessage::ParamName(_))
            | Message::System(
                SystemMessage::Ready | SystemMessage::Profile(_) | SystemMessage::PortState(_),
            ) => {}
        }
    }

    fn drain_rx(&mut self) {
        while let Some(byte) = self.io.rx_dequeue() {
            let Some(frame) = self.parser.feed(byte) else { continue };
            match Message::decode(frame.msg_type, frame.msg_id, frame.payload) {
                Ok(message) => self.handle(message),
                Err(_) => self.decode_errors = self.decode_errors.saturating_add(1),
            }
        }
    }
}

impl<const TXN: usize, const RXN: usize, M: Module + 'static> TaskLogic for DspMessageTask<TXN, RXN, M> {
    fn init(&mut self) -> TaskResult {
        TaskResult::Success
    }

    fn run(&mut self) -> TaskResult {
        self.drain_rx();
        TaskResult::Success
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use ft_module_abi::GainModule;
    use ft_protocol::message::{MSG_TYPE_SYSTEM, SYSTEM_READY};

    struct FakeCounter {
        value: core::cell::Cell<u32>,
    }

    impl CycleCounter for FakeCounter {
        fn now(&self) -> u32 {
            let v = self.value.get();
            self.value.set(v.wrapping_add(10));
            v
        }
    }

    static MODULE: SharedModule<GainModule> = new_shared_module(GainModule::new());
    static PROFILER: SharedProfiler = new_shared_profiler();
    static BLOCK: AudioBlock<2> = AudioBlock::new();
    static DSP_IO_READY: DeviceIo<64, 64> = DeviceIo::new();
    static DSP_IO_BAD_FRAME: DeviceIo<64, 64> = DeviceIo::new();
    static DSP_IO_PORT_STATE: DeviceIo<64, 64> = DeviceIo::new();

    struct FakeTransport {
        sent: heapless::Vec<u8, 64>,
    }

    impl ft_device_io::ByteTransport for FakeTransport {
        type Error = core::convert::Infallible;

        async fn send(&mut self, byte: u8) -> Result<(), Self::Error> {
            self.sent.push(byte).ok();
            Ok(())
        }
    }

    fn feed_frame(io: &DeviceIo<64, 64>, msg_type: u8, msg_id: u8, payload: &[u8]) {
        let mut buf = [0u8; 32];
        let n = encode_frame(msg_type, msg_id, payload, &mut buf).unwrap();
        for &b in &buf[..n] {
            io.on_rx_byte(b);
        }
    }

    async fn drain_tx(io: &DeviceIo<64, 64>) -> heapless::Vec<u8, 64> {
        let mut transport = FakeTransport { sent: heapless::Vec::new() };
        while !io.tx_is_empty() {
            io.pump(&mut transport).await.unwrap();
            io.on_tx_complete();
        }
        transport.sent
    }

    #[tokio::test]
    async fn check_ready_gets_a_ready_reply() {
        let mut task: DspMessageTask<64, 64, GainModule> =
            DspMessageTask::new(&DSP_IO_READY, &MODULE, &PROFILER);
        feed_frame(&DSP_IO_READY, ft_protocol::message::MSG_TYPE_SYSTEM, ft_protocol::message::SYSTEM_CHECK_READY, &[]);
        task.run();

        let tx_bytes = drain_tx(&DSP_IO_READY).await;
        assert_eq!(tx_bytes.as_slice(), &[ft_protocol::frame::START_BYTE, MSG_TYPE_SYSTEM, SYSTEM_READY, 0]);
    }

    #[test]
    fn get_param_value_reads_the_shared_module() {
        critical_section::with(|cs| MODULE.borrow(cs).borrow_mut().set_param(0, 42));
        let value = critical_section::with(|cs| MODULE.borrow(cs).borrow().get_param(0));
        assert_eq!(value, 42);
    }

    #[test]
    fn audio_task_processes_a_pending_frame_and_records_cycles() {
        let mut task = AudioTask::new(&BLOCK, &MODULE, &PROFILER, FakeCounter { value: core::cell::Cell::new(0) });
        assert!(matches!(task.init(), TaskResult::Success));

        let mut tx = [0; 2];
        on_frame_complete(&BLOCK, &PROFILER, &[4, -4], &mut tx, 1_000);
        assert!(matches!(task.run(), TaskResult::Success));

        let snapshot = critical_section::with(|cs| PROFILER.borrow(cs).borrow().snapshot());
        assert_eq!(snapshot.cycles, 10);
    }

    #[test]
    fn unknown_payload_length_is_counted_as_a_decode_error() {
        let mut task: DspMessageTask<64, 64, GainModule> =
            DspMessageTask::new(&DSP_IO_BAD_FRAME, &MODULE, &PROFILER);
        feed_frame(
            &DSP_IO_BAD_FRAME,
            ft_protocol::message::MSG_TYPE_SYSTEM,
            ft_protocol::message::SYSTEM_SET_PORT_STATE,
            &[1, 2, 3],
        );
        task.run();
        assert_eq!(task.decode_errors(), 1);
    }

    #[tokio::test]
    async fn get_port_state_replies_with_the_three_port_values() {
        let mut task: DspMessageTask<64, 64, GainModule> =
            DspMessageTask::new(&DSP_IO_PORT_STATE, &MODULE, &PROFILER);

        let set = Message::System(SystemMessage::SetPortState(PortStatePayload {
            port_f: 0x1234,
            port_g: 0xabcd,
            port_h: 0x00ff,
        }));
        let (msg_type, msg_id, payload) = set.encode();
        feed_frame(&DSP_IO_PORT_STATE, msg_type, msg_id, &payload);
        task.run();

        feed_frame(
            &DSP_IO_PORT_STATE,
            ft_protocol::message::MSG_TYPE_SYSTEM,
            ft_protocol::message::SYSTEM_GET_PORT_STATE,
            &[],
        );
        task.run();

        let tx_bytes = drain_tx(&DSP_IO_PORT_STATE).await;
        let mut parser = FrameParser::new();
        let mut reply = None;
        for &b in tx_bytes.as_slice() {
            if let Some(frame) = parser.feed(b) {
                reply = Some(Message::decode(frame.msg_type, frame.msg_id, frame.payload).unwrap());
            }
        }
        assert_eq!(
            reply,
            Some(Message::System(SystemMessage::PortState(PortStatePayload {
                port_f: 0x1234,
                port_g: 0xabcd,
                port_h: 0x00ff,
            })))
        );
    }
}
