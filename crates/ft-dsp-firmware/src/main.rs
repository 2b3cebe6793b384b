//! Freetribe DSP firmware — hardware-only entry point.
//!
//! No async executor here: the reference main loop is a bare `while(true)`
//! checking for a completed audio frame and then servicing the CPU link on
//! every pass, with no blocking point in between. An executor would only
//! add scheduling latency this loop doesn't need.

#![no_std]
#![no_main]

use ft_dsp_firmware::{new_shared_module, new_shared_profiler, AudioTask, CycleCounter, DspMessageTask, SharedModule, SharedProfiler};
use ft_device_io::DeviceIo;
use ft_kernel::{Scheduler, StatefulTask};
use ft_module_abi::GainModule;
use ft_audio_block::AudioBlock;
use static_cell::StaticCell;

use panic_probe as _;

/// Samples per audio block: one stereo pair per DMA interrupt.
const BLOCK_LEN: usize = 1;
/// DSP SPI transmit/receive ring capacities.
const MSG_RING_LEN: usize = 128;
/// Maximum tasks the scheduler registers: audio processing, message link.
const TASK_COUNT: usize = 2;

static MODULE: SharedModule<GainModule> = new_shared_module(GainModule::new());
static PROFILER: SharedProfiler = new_shared_profiler();
static AUDIO_BLOCK: AudioBlock<BLOCK_LEN> = AudioBlock::new();
static MSG_IO: DeviceIo<MSG_RING_LEN, MSG_RING_LEN> = DeviceIo::new();

static AUDIO_TASK: StaticCell<StatefulTask<AudioTask<BLOCK_LEN, GainModule, HardwareCycleCounter>>> =
    StaticCell::new();
static MESSAGE_TASK: StaticCell<StatefulTask<DspMessageTask<MSG_RING_LEN, MSG_RING_LEN, GainModule>>> =
    StaticCell::new();

/// Reads the core cycle counter.
///
/// TODO(hardware bring-up): back this with the Blackfin core cycle-count
/// register (`CYCLES`/`CYCLES2`) the reference firmware reads in
/// `cycles()`; this placeholder always reads zero.
struct HardwareCycleCounter;

impl CycleCounter for HardwareCycleCounter {
    fn now(&self) -> u32 {
        0
    }
}

#[cortex_m_rt::entry]
fn main() -> ! {
    // TODO(hardware bring-up): PLL, EBIU, GPIO, system interrupt, and DMA
    // peripheral init belong here, matching `pll_init`/`ebiu_init`/
    // `per_gpio_init`/`sysint_init`/`dma_init` in the reference main(). Also
    // configure SPORT0 for the audio codec and the SPI peripheral backing
    // `MSG_IO` before the task kernel starts pulling frames off it.

    defmt::info!("ft-dsp-firmware: task kernel starting");

    let audio_task = AUDIO_TASK.init(StatefulTask::new(AudioTask::new(
        &AUDIO_BLOCK,
        &MODULE,
        &PROFILER,
        HardwareCycleCounter,
    )));
    let message_task = MESSAGE_TASK.init(StatefulTask::new(DspMessageTask::new(&MSG_IO, &MODULE, &PROFILER)));

    let mut scheduler: Scheduler<TASK_COUNT> = Scheduler::new();
    scheduler.add(audio_task).ok();
    scheduler.add(message_task).ok();

    defmt::info!("Entering main loop");
    loop {
        scheduler.run_once();
        // TODO(hardware bring-up): drive `MSG_IO.pump` from the SPI
        // transport's own ISR, and `AUDIO_BLOCK`'s producer side from the
        // SPORT0 RX-DMA-done ISR via `ft_dsp_firmware::on_frame_complete`,
        // rather than this loop touching either directly.
    }
}
