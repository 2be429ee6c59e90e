//! Charger actor and INT pin task.
//!
//! The board wraps these in `#[embassy_executor::task]` functions with its concrete types:
//!
//! ```ignore
//! #[embassy_executor::task]
//! async fn charger_task(chg: Charger<I2cDev, Delay, Pmic, EventPublisher<'static, ..>, NoSecondary>) {
//!     bq2560x_charger::task::run_charger(chg).await
//! }
//!
//! #[embassy_executor::task]
//! async fn charger_int_task(pin: ExtiInput<'static>) {
//!     bq2560x_charger::task::run_irq_pin(pin).await
//! }
//! ```
//!
//! `EventPublisher::global()` is the host for boards that use the crate-wide channels.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::pubsub::ImmediatePublisher;
use embassy_time::{Duration, Instant, Timer};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::i2c::I2c;

use crate::charger::Charger;
use crate::host::{ChargerHost, Pmic, SecondaryCharger};
use crate::shared_state::{ChargerCommand, ChargerStatus, CHARGER_COMMANDS, CHARGER_STATUS};

const ATTACH_BACKOFF_START_MS: u64 = 250;
const ATTACH_BACKOFF_MAX_MS: u64 = 4000;

fn next_backoff_ms(ms: u64) -> u64 {
    (ms * 2).min(ATTACH_BACKOFF_MAX_MS)
}

/// Own the charger: bring it up, then serve commands and deferred work forever.
///
/// Responsibilities:
/// - Probe and initialize the IC, retrying with backoff until it answers.
/// - Take commands from `CHARGER_COMMANDS` and apply them in order.
/// - Run deferred AICR / charge-current jobs when their deadline passes.
/// - Publish a `ChargerStatus` snapshot after every iteration.
pub async fn run_charger<I2C, D, P, H, S>(mut charger: Charger<I2C, D, P, H, S>) -> !
where
    I2C: I2c,
    D: DelayNs + Clone,
    P: Pmic,
    H: ChargerHost,
    S: SecondaryCharger,
{
    let status = CHARGER_STATUS.immediate_publisher();
    info!("charger task starting");

    let mut backoff_ms = ATTACH_BACKOFF_START_MS;
    while let Err(e) = charger.attach().await {
        warn!("charger: attach failed: {:?}; retry in {} ms", e, backoff_ms);
        Timer::after(Duration::from_millis(backoff_ms)).await;
        backoff_ms = next_backoff_ms(backoff_ms);
    }
    info!("charger online");

    // An adapter present at boot raised no edge.
    step(&mut charger, Some(ChargerCommand::Irq), Instant::now(), &status).await;

    loop {
        let cmd = match charger.next_deadline() {
            Some(at) => match select(CHARGER_COMMANDS.receive(), Timer::at(at)).await {
                Either::First(cmd) => Some(cmd),
                Either::Second(()) => None,
            },
            None => Some(CHARGER_COMMANDS.receive().await),
        };
        step(&mut charger, cmd, Instant::now(), &status).await;
    }
}

/// One actor iteration: apply `cmd`, run whatever deferred work is due at `now`, publish status.
pub async fn step<I2C, D, P, H, S, M, const CAP: usize, const SUBS: usize, const PUBS: usize>(
    charger: &mut Charger<I2C, D, P, H, S>,
    cmd: Option<ChargerCommand>,
    now: Instant,
    status: &ImmediatePublisher<'_, M, ChargerStatus, CAP, SUBS, PUBS>,
) where
    I2C: I2c,
    D: DelayNs + Clone,
    P: Pmic,
    H: ChargerHost,
    S: SecondaryCharger,
    M: RawMutex,
{
    if let Some(cmd) = cmd {
        debug!("charger: {:?}", cmd);
        charger.handle(cmd, now).await;
    }
    charger.run_due(now).await;
    status.publish_immediate(charger.status().await);
}

/// Forward falling edges of the INT line (open-drain, active-low) to the charger actor.
pub async fn run_irq_pin<W: Wait>(mut int_pin: W) -> ! {
    loop {
        if int_pin.wait_for_falling_edge().await.is_err() {
            warn!("charger INT: wait failed");
            Timer::after(Duration::from_millis(10)).await;
            continue;
        }
        CHARGER_COMMANDS.send(ChargerCommand::Irq).await;
    }
}
