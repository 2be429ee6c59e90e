//! Software AICL: ramp the input current limit through the USB current steps and
//! stop where VBUS sags below the stage floor.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::bq2560x::Bq2560x;
use crate::host::{Pmic, SecondaryCharger};

/// Canonical USB input current steps (mA). Index 0 is the unprobed floor.
pub const USB_ICL: [u32; 8] = [100, 500, 900, 1200, 1500, 1750, 2000, 3000];

/// VBUS floor for the ramp (mV).
pub const SW_AICL_POINT_MV: u32 = 4500;

/// Steps at or below this are never split between two chargers.
pub const SPLIT_THRESHOLD_MA: u32 = 1000;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stage {
    pub step_ma: u32,
    pub settle_ms: u32,
    pub floor_mv: u32,
    /// Steps to fall back when this stage sags.
    pub backoff: usize,
}

const fn stage(step_ma: u32, settle_ms: u32, margin_mv: u32, backoff: usize) -> Stage {
    Stage { step_ma, settle_ms, floor_mv: SW_AICL_POINT_MV + margin_mv, backoff }
}

/// Probed stages, `STAGES[i]` is `USB_ICL[i + 1]`.
pub const STAGES: [Stage; 7] = [
    stage(500, 90, 0, 1),
    stage(900, 90, 0, 1),
    stage(1200, 90, 0, 1),
    stage(1500, 120, 50, 2),
    stage(1750, 120, 50, 2),
    stage(2000, 90, 0, 2),
    stage(3000, 90, 0, 1),
];

/// Input current ceiling for a battery temperature in 0.1 °C.
pub fn thermal_ceiling_ma(temp_decidegc: i32) -> u32 {
    if temp_decidegc > 370 {
        1200
    } else if temp_decidegc >= 340 {
        1500
    } else if temp_decidegc > 0 {
        2000
    } else {
        1000
    }
}

/// Clamp a requested input current to the thermal band.
pub fn input_current_limit_protection(ma: u32, temp_decidegc: i32) -> u32 {
    let ceiling = thermal_ceiling_ma(temp_decidegc);
    if ma > ceiling {
        debug!("AICL: thermal clamp {} -> {} mA at {} dC", ma, ceiling, temp_decidegc);
    }
    ma.min(ceiling)
}

/// (primary, secondary) share of `step_ma`.
pub fn split_current(step_ma: u32, percent: u32, dual: bool) -> (u32, Option<u32>) {
    if !dual || step_ma <= SPLIT_THRESHOLD_MA {
        return (step_ma, None);
    }
    let p = percent.min(100);
    (step_ma * p / 100, Some(step_ma * (100 - p) / 100))
}

/// Walk the stages up to `target_ma` on the primary charger and return the step to commit.
///
/// A VBUS read failure counts as a sag. Register write failures are logged and the walk goes on.
pub async fn walk<I2C, D, P, DL>(
    bq: &mut Bq2560x<I2C, D>,
    pmic: &mut P,
    delay: &mut DL,
    target_ma: u32,
) -> u32
where
    I2C: I2c,
    D: DelayNs,
    P: Pmic,
    DL: DelayNs,
{
    let mut commit = USB_ICL[0];
    for (i, st) in STAGES.iter().enumerate() {
        if st.step_ma > target_ma {
            break;
        }
        if bq.set_input_current_limit(st.step_ma).await.is_err() {
            warn!("AICL: IINLIM {} mA write failed", st.step_ma);
        }
        delay.delay_ms(st.settle_ms).await;

        let sag = match pmic.vbus_mv().await {
            Ok(mv) => {
                trace!("AICL: {} mA -> VBUS {} mV (floor {})", st.step_ma, mv, st.floor_mv);
                mv < st.floor_mv
            }
            Err(_) => {
                warn!("AICL: VBUS read failed at {} mA", st.step_ma);
                true
            }
        };
        if sag {
            commit = USB_ICL[i + 1 - st.backoff];
            info!("AICL: sag at {} mA, backing off to {} mA", st.step_ma, commit);
            return commit;
        }
        commit = st.step_ma;
    }
    info!("AICL: target {} mA, settled at {} mA", target_ma, commit);
    commit
}

/// Program the committed step, split between chargers when a secondary is fitted.
pub async fn commit<I2C, D, S>(
    bq: &mut Bq2560x<I2C, D>,
    secondary: Option<&mut S>,
    step_ma: u32,
    percent: u32,
)
where
    I2C: I2c,
    D: DelayNs,
    S: SecondaryCharger,
{
    let (primary, share) = split_current(step_ma, percent, secondary.is_some());
    if bq.set_input_current_limit(primary).await.is_err() {
        warn!("AICL: commit {} mA failed", primary);
    }
    if let (Some(sec), Some(ma)) = (secondary, share) {
        if sec.set_input_current(ma).await.is_err() {
            warn!("AICL: secondary {} mA failed", ma);
        }
        debug!("AICL: split {} mA -> {} + {} mA", step_ma, primary, ma);
    }
}
