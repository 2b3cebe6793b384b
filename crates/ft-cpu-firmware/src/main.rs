//! Freetribe CPU firmware — hardware-only entry point.

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use ft_cpu_firmware::{new_shared_events, DspLinkTask, EventDispatchTask, PanelLinkTask, SharedEvents};
use ft_device_io::DeviceIo;
use ft_kernel::{Scheduler, StatefulTask};
use static_cell::StaticCell;

use panic_probe as _;

/// DSP SPI transmit/receive ring capacities.
const DSP_RING_LEN: usize = 128;
/// Panel UART transmit/receive ring capacities.
const PANEL_RING_LEN: usize = 32;
/// Maximum tasks the scheduler registers: event dispatch, DSP link, panel link.
const TASK_COUNT: usize = 3;

static EVENTS: SharedEvents = new_shared_events();
static DSP_IO: DeviceIo<DSP_RING_LEN, DSP_RING_LEN> = DeviceIo::new();
static PANEL_IO: DeviceIo<PANEL_RING_LEN, PANEL_RING_LEN> = DeviceIo::new();

static DISPATCH_TASK: StaticCell<StatefulTask<EventDispatchTask>> = StaticCell::new();
static DSP_TASK: StaticCell<StatefulTask<DspLinkTask<DSP_RING_LEN, DSP_RING_LEN>>> = StaticCell::new();
static PANEL_TASK: StaticCell<StatefulTask<PanelLinkTask<PANEL_RING_LEN, PANEL_RING_LEN>>> = StaticCell::new();

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    // TODO(hardware bring-up): configure the DSP SPI peripheral, the DSP
    // reset GPIO, the panel UART, and the MIDI UART here, the way
    // `firmware::boot::hardware::apply_mpu_config_from_peripherals` and the
    // SPI/UART setup in the reference main loop do for their peripherals.
    // Board-specific bring-up bytes are out of scope for this firmware; the
    // task wiring below is exercised against the fakes in
    // `ft_cpu_firmware`'s test suite and `ft_dsp_boot`'s own tests.

    defmt::info!("ft-cpu-firmware: task kernel starting");

    // TODO(hardware bring-up): call `ft_cpu_firmware::boot_dsp` with the real
    // reset line and boot SPI transport before registering the runtime
    // message-link task, matching `svc_dsp_task`'s boot-then-run ordering.

    let dispatch_task = DISPATCH_TASK.init(StatefulTask::new(EventDispatchTask::new(&EVENTS)));
    let dsp_task = DSP_TASK.init(StatefulTask::new(DspLinkTask::new(&DSP_IO, &EVENTS)));
    let panel_task = PANEL_TASK.init(StatefulTask::new(PanelLinkTask::new(&PANEL_IO, &EVENTS)));

    let mut scheduler: Scheduler<TASK_COUNT> = Scheduler::new();
    scheduler.add(dispatch_task).ok();
    scheduler.add(dsp_task).ok();
    scheduler.add(panel_task).ok();

    // TODO(hardware bring-up): once an IWDG-equivalent watchdog peripheral is
    // wired in, pet it here behind the same per-task heartbeat-flag guard
    // the DSP firmware's own main loop uses, so a stalled task is caught
    // instead of silently blocking the scheduler.
    defmt::info!("Entering main loop");
    loop {
        scheduler.run_once();

        // TODO(hardware bring-up): drive `DSP_IO.pump`/`PANEL_IO.pump` from
        // their transport ISRs rather than gating them on a fixed tick —
        // the tick here only paces the cooperative scheduler pass.
        Timer::after(Duration::from_millis(1)).await;
    }
}
