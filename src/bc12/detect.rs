//! BC1.2 charger-type detection over the PMIC BC1.1 front-end.
//!
//! Init -> DCD -> A1 (Apple / nonstandard) or A2 -> B2 -> Done. Every stage
//! programs the front-end, waits for the comparator to settle and samples
//! CMP_OUT once. The front-end is always returned to its idle state.

use embedded_hal_async::delay::DelayNs;

use super::regs::*;
use super::types::ChargerType;
use crate::host::{ChargerHost, Pmic};

/// Settle time before the detector is powered.
pub const INIT_SETTLE_MS: u32 = 200;
/// Settle time after the front-end is reset.
pub const RESET_SETTLE_MS: u32 = 50;
/// Comparator settle time for DCD/A1/A2/B2.
pub const STAGE_SETTLE_MS: u32 = 80;
pub const USB_READY_POLL_MS: u32 = 100;
pub const USB_READY_MAX_POLLS: u32 = 200;

/// Charger-type detector. Holds only the once-per-attach USB readiness gate;
/// the classification cache belongs to the caller.
#[derive(Debug, Default)]
pub struct Detector {
    usb_ready_checked: bool,
}

async fn set<P: Pmic>(pmic: &mut P, f: Field, val: u16) {
    if pmic.update_bits(f.addr, f.mask, f.encode(val)).await.is_err() {
        warn!("BC1.2: write 0x{:04X} mask 0x{:04X} failed", f.addr, f.mask);
    }
}

/// A failed read samples as 0.
async fn sample<P: Pmic>(pmic: &mut P) -> bool {
    match pmic.read_reg(CMP_OUT.addr).await {
        Ok(v) => CMP_OUT.decode(v) != 0,
        Err(_) => {
            warn!("BC1.2: CMP_OUT read failed, treating as 0");
            false
        }
    }
}

impl Detector {
    pub fn new() -> Self { Self::default() }

    /// Classify the port. A known `cached` type is returned without touching hardware.
    pub async fn detect<P, H, D>(
        &mut self,
        cached: ChargerType,
        pmic: &mut P,
        host: &mut H,
        delay: &mut D,
    ) -> ChargerType
    where
        P: Pmic,
        H: ChargerHost,
        D: DelayNs,
    {
        if cached != ChargerType::Unknown {
            return cached;
        }

        self.init(pmic, host, delay).await;
        let ty = if self.dcd(pmic, delay).await {
            if self.stage_a1(pmic, delay).await { ChargerType::Apple2_1A } else { ChargerType::Nonstandard }
        } else if self.stage_a2(pmic, delay).await {
            if self.stage_b2(pmic, delay).await { ChargerType::StandardCharger } else { ChargerType::ChargingHost }
        } else {
            ChargerType::StandardHost
        };
        self.done(pmic, host).await;

        info!("BC1.2: charger type {:?}", ty);
        ty
    }

    async fn init<P: Pmic, H: ChargerHost, D: DelayNs>(&mut self, pmic: &mut P, host: &mut H, delay: &mut D) {
        delay.delay_ms(INIT_SETTLE_MS).await;

        if !self.usb_ready_checked {
            self.usb_ready_checked = true;
            let mut polls = 0;
            while !host.usb_ready() {
                if polls == 0 {
                    info!("BC1.2: USB not ready, blocking detection");
                }
                polls += 1;
                if polls >= USB_READY_MAX_POLLS {
                    warn!("BC1.2: USB ready timeout after {} ms", polls * USB_READY_POLL_MS);
                    break;
                }
                delay.delay_ms(USB_READY_POLL_MS).await;
            }
            if polls < USB_READY_MAX_POLLS {
                info!("BC1.2: USB ready, detection free to run");
            }
        }

        set(pmic, BIAS_EN, 1).await;
        set(pmic, VSRC_EN, 0).await;
        set(pmic, VREF_VTH, 0).await;
        set(pmic, CMP_EN, 0).await;
        set(pmic, IPU_EN, 0).await;
        set(pmic, IPD_EN, 0).await;
        set(pmic, RST, 1).await;
        set(pmic, BB_CTRL, 1).await;
        // DP pull-down keeps leakage from looking like a data contact.
        set(pmic, IPD_EN, 1).await;
        delay.delay_ms(RESET_SETTLE_MS).await;

        host.charger_detect_acquire();
    }

    /// Data contact detect. 1 means D+ stayed high (no data contact).
    async fn dcd<P: Pmic, D: DelayNs>(&mut self, pmic: &mut P, delay: &mut D) -> bool {
        set(pmic, IPU_EN, 2).await;
        set(pmic, IPD_EN, 1).await;
        set(pmic, VREF_VTH, 1).await;
        set(pmic, CMP_EN, 2).await;
        delay.delay_ms(STAGE_SETTLE_MS).await;
        let hit = sample(pmic).await;
        set(pmic, IPU_EN, 0).await;
        set(pmic, IPD_EN, 0).await;
        set(pmic, CMP_EN, 0).await;
        set(pmic, VREF_VTH, 0).await;
        debug!("BC1.2: DCD -> {}", hit);
        hit
    }

    async fn stage_a1<P: Pmic, D: DelayNs>(&mut self, pmic: &mut P, delay: &mut D) -> bool {
        set(pmic, IPD_EN, 1).await;
        set(pmic, VREF_VTH, 0).await;
        set(pmic, CMP_EN, 1).await;
        delay.delay_ms(STAGE_SETTLE_MS).await;
        let hit = sample(pmic).await;
        set(pmic, IPD_EN, 0).await;
        set(pmic, CMP_EN, 0).await;
        debug!("BC1.2: A1 -> {}", hit);
        hit
    }

    /// Primary detection: source on D+, compare D+.
    async fn stage_a2<P: Pmic, D: DelayNs>(&mut self, pmic: &mut P, delay: &mut D) -> bool {
        set(pmic, VSRC_EN, 2).await;
        set(pmic, IPD_EN, 1).await;
        set(pmic, VREF_VTH, 0).await;
        set(pmic, CMP_EN, 1).await;
        delay.delay_ms(STAGE_SETTLE_MS).await;
        let hit = sample(pmic).await;
        set(pmic, VSRC_EN, 0).await;
        set(pmic, IPD_EN, 0).await;
        set(pmic, CMP_EN, 0).await;
        debug!("BC1.2: A2 -> {}", hit);
        hit
    }

    /// Secondary detection: source on D-, compare D-.
    async fn stage_b2<P: Pmic, D: DelayNs>(&mut self, pmic: &mut P, delay: &mut D) -> bool {
        set(pmic, IPD_EN, 2).await;
        set(pmic, VREF_VTH, 0).await;
        set(pmic, VSRC_EN, 1).await;
        set(pmic, CMP_EN, 2).await;
        delay.delay_ms(STAGE_SETTLE_MS).await;
        let hit = sample(pmic).await;
        set(pmic, VSRC_EN, 0).await;
        set(pmic, IPD_EN, 0).await;
        set(pmic, CMP_EN, 0).await;
        if hit {
            // Keep the DM voltage source up for the DCP.
            set(pmic, VSRC_EN, 2).await;
        }
        debug!("BC1.2: B2 -> {}", hit);
        hit
    }

    async fn done<P: Pmic, H: ChargerHost>(&mut self, pmic: &mut P, host: &mut H) {
        set(pmic, VSRC_EN, 0).await;
        set(pmic, VREF_VTH, 0).await;
        set(pmic, CMP_EN, 0).await;
        set(pmic, IPU_EN, 0).await;
        set(pmic, IPD_EN, 0).await;
        set(pmic, BIAS_EN, 0).await;
        host.charger_detect_release();
    }
}
