//! Detection runtime: the single thread that owns all detection state.
//!
//! Runs in a dedicated thread using `edge-executor` for cooperative
//! multi-task scheduling and `async-io-mini` for reactor-driven timers.
//! Five concurrent futures share one [`Controller`]:
//!
//! 1. **Dispatch**: drains `COMPLETION_CHANNEL`, `COMMAND_CHANNEL` and
//!    `ADV_CHANNEL`, in that priority, into the detection service.
//!    Returns on the first fatal error.
//! 2. **Loss check**: parked until the presence engine asks for it, then
//!    re-arms itself with the engine's interval until it parks again.
//! 3. **Power save**: pauses the servo PWM once the hold time elapses
//!    without a newer drive command.
//! 4. **Supply**: samples the supply voltage on a fixed period.
//! 5. **Status**: plays the red LED blink pattern every 2 s.
//!
//! ```text
//!  ┌────────────────────────────────────────────────────────────┐
//!  │  Detection Thread                                          │
//!  │  ┌──────────────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor                        │  │
//!  │  │                                                      │  │
//!  │  │  ┌──────────┐ ┌────────────┐ ┌────────────┐          │  │
//!  │  │  │ Dispatch │ │ Loss check │ │ Power save │          │  │
//!  │  │  │ channels │ │ signal + ⏱ │ │ signal + ⏱ │          │  │
//!  │  │  └──────────┘ └────────────┘ └────────────┘          │  │
//!  │  │  ┌──────────┐ ┌────────────┐                         │  │
//!  │  │  │ Supply ⏱ │ │ Status ⏱   │                         │  │
//!  │  │  └──────────┘ └────────────┘                         │  │
//!  │  └──────────────────────────────────────────────────────┘  │
//!  └────────────────────────────────────────────────────────────┘
//! ```

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;

use async_io_mini::Timer;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{debug, error, info, warn};

use crate::adapters::hardware::FeederHardware;
use crate::adapters::log_sink::LogEventSink;
use crate::adapters::nvs::NvsAdapter;
use crate::adapters::radio::BleScanner;
use crate::adapters::restart::restart_after;
use crate::app::commands::AppCommand;
use crate::app::ports::{RadioPort, ServoPort, StatusPort, TimerPort};
use crate::app::service::DetectionService;
use crate::beacon::AdvRecord;
use crate::drivers::status_led::{Led, StatusLeds};
use crate::drivers::task_pin::{spawn_on_core, Core};
use crate::error::Error;
use crate::events::{push_command, ADV_CHANNEL, COMMAND_CHANNEL, COMPLETION_CHANNEL};
use crate::fsm::ScanCompletion;
use crate::sensors::vcc::VccMonitor;
use crate::status::{BlinkPattern, StatusBoard, STATUS_PERIOD_MS};

const DETECT_PRIORITY: u8 = 10;
const DETECT_STACK_KB: usize = 8;

// ── Timer signals ────────────────────────────────────────────

type WakeSignal = Signal<CriticalSectionRawMutex, ()>;
type ArmSignal = Signal<CriticalSectionRawMutex, Duration>;

/// Raised when a qualifying sighting arrives while the loss check is parked.
static LOSS_CHECK_WAKE: WakeSignal = Signal::new();

/// Carries the hold time of the most recent servo drive.
static POWER_SAVE_ARM: ArmSignal = Signal::new();

/// [`TimerPort`] backed by the runtime's signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalTimers;

impl TimerPort for SignalTimers {
    fn wake_loss_check(&mut self) {
        LOSS_CHECK_WAKE.signal(());
    }

    fn arm_power_save(&mut self, hold: Duration) {
        POWER_SAVE_ARM.signal(hold);
    }
}

// ── Shared state ─────────────────────────────────────────────

/// Everything the detection thread owns.
pub struct Controller<R = BleScanner, H = FeederHardware<SignalTimers>> {
    pub service: DetectionService,
    pub radio: R,
    pub hw: H,
    pub store: NvsAdapter,
    pub sink: LogEventSink,
}

type Shared<R, H> = Rc<RefCell<Controller<R, H>>>;

enum Inbound {
    Completion(ScanCompletion),
    Command(AppCommand),
    Advertisement(AdvRecord),
}

// ── Async loops ──────────────────────────────────────────────

/// Feed every inbound message to the service. Returns the first fatal
/// error; recoverable ones are logged.
async fn dispatch_loop<R, H>(ctl: Shared<R, H>) -> Error
where
    R: RadioPort,
    H: ServoPort + StatusPort + TimerPort,
{
    loop {
        // `or` polls left first: completions, then commands, then scan
        // results.
        let inbound = future::or(
            async { Inbound::Completion(COMPLETION_CHANNEL.receive().await) },
            future::or(
                async { Inbound::Command(COMMAND_CHANNEL.receive().await) },
                async { Inbound::Advertisement(ADV_CHANNEL.receive().await) },
            ),
        )
        .await;

        let mut guard = ctl.borrow_mut();
        let c = &mut *guard;
        let result = match inbound {
            Inbound::Completion(done) => {
                debug!("dispatch: completion {:?}", done);
                c.service.handle_completion(done, &mut c.radio, &mut c.sink)
            }
            Inbound::Command(cmd) => {
                debug!("dispatch: command {:?}", cmd);
                c.service
                    .handle_command(cmd, &mut c.radio, &mut c.store, &mut c.sink)
            }
            Inbound::Advertisement(record) => {
                c.service
                    .handle_advertisement(&record, &mut c.hw, &mut c.sink)
            }
        };

        match result {
            Err(e) if e.is_fatal() => return e,
            Err(e) => warn!("dispatch: {}", e),
            Ok(()) => {}
        }
    }
}

/// Wait for a wake, then keep checking for loss until the engine parks.
async fn loss_check_loop<R, H>(ctl: Shared<R, H>, wake: &'static WakeSignal)
where
    H: ServoPort + TimerPort,
{
    loop {
        wake.wait().await;
        debug!("loss check: woken");

        loop {
            let wait_ms = ctl.borrow_mut().service.arm_loss_check();
            Timer::after(Duration::from_millis(u64::from(wait_ms))).await;

            let mut guard = ctl.borrow_mut();
            let c = &mut *guard;
            match c.service.finish_loss_check(&mut c.hw, &mut c.sink) {
                Ok(check) => {
                    debug!("loss check: {:?}", check);
                    if check.parks() {
                        break;
                    }
                }
                Err(e) => {
                    // Only a failed close reaches here, and losing the pet parks.
                    warn!("loss check: {}", e);
                    break;
                }
            }
        }
    }
}

/// Pause the servo once a drive's hold time elapses. A newer drive
/// restarts the countdown.
async fn power_save_loop<R, H>(ctl: Shared<R, H>, arm: &'static ArmSignal)
where
    H: ServoPort,
{
    let mut hold = arm.wait().await;
    loop {
        let rearmed = future::or(
            async {
                Timer::after(hold).await;
                None
            },
            async { Some(arm.wait().await) },
        )
        .await;

        match rearmed {
            Some(next) => hold = next,
            None => {
                let mut guard = ctl.borrow_mut();
                let c = &mut *guard;
                if let Err(e) = c.service.power_save_elapsed(&mut c.hw) {
                    warn!("power save: {}", e);
                }
                drop(guard);
                hold = arm.wait().await;
            }
        }
    }
}

/// Sample the supply voltage every `period`; act on each block average.
async fn supply_loop<R, H>(ctl: Shared<R, H>, mut vcc: VccMonitor, period: Duration)
where
    H: StatusPort,
{
    loop {
        if let Some(avg_mv) = vcc.sample() {
            let mut guard = ctl.borrow_mut();
            let c = &mut *guard;
            c.service.on_supply_average(avg_mv, &mut c.hw, &mut c.sink);
        }
        Timer::after(period).await;
    }
}

/// Play the blink schedule selected by the battery flags, then rest.
async fn status_loop(mut leds: StatusLeds, board: &'static StatusBoard) {
    loop {
        let pattern = board.pattern();
        match pattern {
            BlinkPattern::Dark => debug!("status: all batteries ok"),
            BlinkPattern::SupplyLow => warn!("status: feeder battery low"),
            BlinkPattern::BeaconBatteryLow => warn!("status: beacon battery low"),
            BlinkPattern::BothLow => warn!("status: all batteries low"),
        }
        for step in pattern.steps() {
            leds.set(Led::Red, step.red_on);
            if step.ms > 0 {
                Timer::after(Duration::from_millis(u64::from(step.ms))).await;
            }
        }
        Timer::after(Duration::from_millis(STATUS_PERIOD_MS)).await;
    }
}

// ── Entry point ──────────────────────────────────────────────

/// Run every loop on one executor until dispatch reports a fatal error.
fn run_detection_loop(mut ctl: Controller, leds: StatusLeds, vcc: VccMonitor) -> Error {
    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();

    let c = &mut ctl;
    if let Err(e) = c.service.power_on(&mut c.radio, &mut c.hw, &mut c.sink) {
        warn!("power-on: {}", e);
    }

    let supply_period =
        Duration::from_secs(u64::from(ctl.service.config().supply_sample_interval_secs));
    let board = ctl.hw.status();
    let ctl = Rc::new(RefCell::new(ctl));

    executor
        .spawn(loss_check_loop(ctl.clone(), &LOSS_CHECK_WAKE))
        .detach();
    executor
        .spawn(power_save_loop(ctl.clone(), &POWER_SAVE_ARM))
        .detach();
    executor
        .spawn(supply_loop(ctl.clone(), vcc, supply_period))
        .detach();
    executor.spawn(status_loop(leds, board)).detach();

    info!("Detection task started (async, reactor-driven)");

    future::block_on(executor.run(dispatch_loop(ctl)))
}

/// Spawn the detection thread pinned to Core 1 (APP_CPU).
///
/// A fatal error ends the loops; the thread then logs it and restarts
/// the device after the configured delay.
pub fn spawn(
    ctl: Controller,
    leds: StatusLeds,
    vcc: VccMonitor,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    let restart_delay = Duration::from_secs(u64::from(ctl.service.config().restart_delay_secs));
    spawn_on_core(
        Core::App,
        DETECT_PRIORITY,
        DETECT_STACK_KB,
        "detect\0",
        move || {
            let fatal = run_detection_loop(ctl, leds, vcc);
            error!("Detection stopped: {}", fatal);
            restart_after(&fatal, restart_delay);
        },
    )
}

/// Queue a command for the detection thread. Safe from any thread.
pub fn send_command(cmd: AppCommand) {
    if !push_command(cmd) {
        warn!("Command channel full, dropping {:?}", cmd);
    }
}
