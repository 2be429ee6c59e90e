//! Driver context: charger IC, PMIC front-end, upstream host and the plug/IRQ state machine.
//!
//! One `Charger` is owned by the charger actor (`task::run_charger`), so every hardware
//! sequence (detection, AICL walk, deferred re-application) runs to completion before
//! the next one starts.

use core::result::Result as CoreResult;

use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::aicl;
use crate::bc12::{ChargerType, Detector};
use crate::bq2560x::device::Result;
use crate::bq2560x::regs::{PG_STAT, REG08};
use crate::bq2560x::{Bq2560x, Error, WdtTimer};
use crate::config::*;
use crate::deferred::{self, Deferred};
use crate::host::{ChargerHost, Pmic, SecondaryCharger};
use crate::shared_state::{ChargerCommand, ChargerStatus};

/// Latest gauge reading.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryStatus {
    pub voltage_mv: u32,
    /// 0.1 °C.
    pub temp_decidegc: i32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargerState {
    pub power_good: bool,
    /// `Unknown` until detection completed since the last plug event.
    pub charger_type: ChargerType,
    pub otg_enabled: bool,
    /// The first `Nonstandard` result is retried once.
    pub nonstandard_retry_pending: bool,
    /// Last AICL target; `None` until AICL ran since the last plug event.
    pub pre_input_current_ma: Option<u32>,
    pub aicl_voltage_point_mv: u32,
    pub plug_in_at: Option<Instant>,
    /// Last applied input-current change.
    pub last_aicr_at: Option<Instant>,
    /// Target the pending `aicr_apply` feeds to AICL.
    pub requested_aicr_ma: u32,
    /// Value the pending `chg_current_apply` writes.
    pub charge_current_ma: u32,
    pub charge_enabled: bool,
    /// `None` until the gauge reported once.
    pub battery: Option<BatteryStatus>,
    /// Input-current request that arrived before the first gauge reading.
    pub held_aicr_ma: Option<u32>,
}

impl Default for ChargerState {
    fn default() -> Self {
        Self {
            power_good: false,
            charger_type: ChargerType::Unknown,
            otg_enabled: false,
            nonstandard_retry_pending: false,
            pre_input_current_ma: None,
            aicl_voltage_point_mv: AICL_POINT_LOW_MV,
            plug_in_at: None,
            last_aicr_at: None,
            requested_aicr_ma: 0,
            charge_current_ma: 0,
            charge_enabled: false,
            battery: None,
            held_aicr_ma: None,
        }
    }
}

impl ChargerState {
    /// Forget everything learned about the source. OTG and battery data survive.
    fn reset_on_removal(&mut self) {
        self.charger_type = ChargerType::Unknown;
        self.pre_input_current_ma = None;
        self.nonstandard_retry_pending = false;
        self.plug_in_at = None;
        self.last_aicr_at = None;
        self.held_aicr_ma = None;
    }
}

/// VINDPM target for a battery voltage: VBAT + 400/300/200 mV, at least the low AICL point.
pub fn mivr_for_battery(vbat_mv: u32) -> u32 {
    let mv = if vbat_mv > 4300 {
        vbat_mv + 400
    } else if vbat_mv > 4200 {
        vbat_mv + 300
    } else {
        vbat_mv + 200
    };
    mv.max(AICL_POINT_LOW_MV)
}

/// Next AICL point given the current one and a battery voltage.
pub fn next_aicl_point(current_mv: u32, vbat_mv: u32) -> u32 {
    if current_mv == AICL_POINT_LOW_MV && vbat_mv > AICL_POINT_UP_VBAT_MV {
        AICL_POINT_HIGH_MV
    } else if current_mv == AICL_POINT_HIGH_MV && vbat_mv < AICL_POINT_DOWN_VBAT_MV {
        AICL_POINT_LOW_MV
    } else {
        current_mv
    }
}

pub struct Charger<I2C, D, P, H, S> {
    bq: Bq2560x<I2C, D>,
    delay: D,
    pmic: P,
    host: H,
    secondary: Option<S>,
    detector: Detector,
    config: ChargerConfig,
    pdata: PlatformData,
    state: ChargerState,
    aicr_apply: Deferred,
    chg_current_apply: Deferred,
}

impl<I2C, D, P, H, S> Charger<I2C, D, P, H, S>
where
    I2C: I2c,
    D: DelayNs + Clone,
    P: Pmic,
    H: ChargerHost,
    S: SecondaryCharger,
{
    /// Build the driver context. No bus traffic until `attach`.
    pub fn new(
        i2c: I2C,
        delay: D,
        pmic: P,
        host: H,
        secondary: Option<S>,
        config: ChargerConfig,
        pdata: PlatformData,
    ) -> Self {
        Self {
            bq: Bq2560x::new(i2c, delay.clone()),
            delay,
            pmic,
            host,
            secondary,
            detector: Detector::new(),
            config,
            pdata,
            state: ChargerState::default(),
            aicr_apply: Deferred::new(),
            chg_current_apply: Deferred::new(),
        }
    }

    /// Probe and program the IC. Only a failed probe is fatal.
    pub async fn attach(&mut self) -> Result<I2C::Error> {
        let id = self.bq.probe().await?;
        info!("{}: BQ2560x rev {} on {}", self.pdata.charger_name, id.revision, self.pdata.eint_name);
        self.bq.init_device(&self.pdata).await;
        if self.bq.enable_hiz(false).await.is_err() {
            error!("Failed to exit hiz mode");
        }
        if self.bq.enable_batfet_reset(false).await.is_err() {
            error!("Failed to disable batfet reset");
        }
        self.state = ChargerState::default();
        self.state.charge_enabled = self.bq.charger_enabled().await.unwrap_or(false);
        self.state.charge_current_ma = self.pdata.usb_ichg_ma;
        // Gate the next detection on USB readiness again.
        self.detector = Detector::new();
        Ok(())
    }

    /// Cancel pending work and hand back the bus and collaborators.
    pub fn release(mut self) -> (I2C, P, H, Option<S>) {
        self.aicr_apply.cancel();
        self.chg_current_apply.cancel();
        let (i2c, _) = self.bq.release();
        (i2c, self.pmic, self.host, self.secondary)
    }

    pub fn state(&self) -> &ChargerState { &self.state }

    pub fn config(&self) -> &ChargerConfig { &self.config }

    pub async fn status(&mut self) -> ChargerStatus {
        ChargerStatus {
            power_good: self.state.power_good,
            vbus_present: self.pmic.vbus_present().await,
            charger_type: self.state.charger_type,
            supply_type: self.state.charger_type.power_supply_type(),
            otg_enabled: self.state.otg_enabled,
            charge_enabled: self.state.charge_enabled,
            input_current_ma: self.state.pre_input_current_ma,
            charge_current_ma: self.state.charge_current_ma,
            aicl_point_mv: self.state.aicl_voltage_point_mv,
        }
    }

    // ------------------ Interrupt ------------------

    /// One pass per INT edge. Never fails outward.
    pub async fn handle_irq(&mut self, now: Instant) {
        let reg08 = match self.bq.read_byte(REG08).await {
            Ok(v) => v,
            Err(_) => {
                error!("irq: REG08 read failed");
                return;
            }
        };

        let prev_pg = self.state.power_good;
        self.state.power_good = reg08 & PG_STAT != 0;
        info!("irq: power good {} -> {}", prev_pg, self.state.power_good);

        self.set_mivr_by_battery_vol().await;
        if self.config.dump_on_irq && self.bq.dump_regs().await.is_err() {
            warn!("irq: register dump failed");
        }

        match (prev_pg, self.state.power_good) {
            (false, true) => {
                if self.config.typec_managed && !self.config.charge_detect_enable {
                    return;
                }
                self.state.plug_in_at = Some(now);
                info!("adapter/usb inserted");
            }
            (true, false) => {
                if self.config.typec_managed && self.config.charge_detect_enable {
                    return;
                }
                self.on_removal();
                return;
            }
            (false, false) => {
                debug!("irq: still no power");
                return;
            }
            (true, true) => {}
        }

        if self.state.otg_enabled {
            return;
        }
        self.classify().await;
    }

    fn on_removal(&mut self) {
        self.state.reset_on_removal();
        self.inform_charger_type();
        self.host.charger_detect_release();
        self.aicr_apply.cancel();
        self.chg_current_apply.cancel();
        info!("adapter/usb removed");
    }

    async fn classify(&mut self) {
        let prev = self.state.charger_type;
        let ty = self
            .detector
            .detect(prev, &mut self.pmic, &mut self.host, &mut self.delay)
            .await;
        self.state.charger_type = ty;

        if ty == prev || !self.config.charge_detect_enable {
            return;
        }

        if ty == ChargerType::Nonstandard && !self.state.nonstandard_retry_pending {
            self.state.nonstandard_retry_pending = true;
            self.state.charger_type = ChargerType::Unknown;
            info!("nonstandard charger, detecting again on the next interrupt");
            return;
        }
        if ty != ChargerType::StandardCharger {
            self.host.charger_detect_release();
        }
        if ty == ChargerType::Unknown {
            self.state.plug_in_at = None;
            self.state.last_aicr_at = None;
            self.aicr_apply.cancel();
            self.chg_current_apply.cancel();
        }
        self.inform_charger_type();
    }

    fn inform_charger_type(&mut self) {
        let ty = self.state.charger_type;
        self.host.online_changed(ty != ChargerType::Unknown);
        self.host.charger_type_changed(ty);
        if ty.is_usb_host() {
            self.host.usb_connect();
        } else if ty == ChargerType::Unknown {
            self.host.usb_disconnect();
        }
    }

    // ------------------ Input current ------------------

    /// Thermal clamp, then defer the AICL run until the settle window since plug-in
    /// or since the last applied change has passed. Replaces any pending request.
    ///
    /// Without a battery temperature the request is held and replayed by `update_battery`.
    pub fn set_input_current_limit(&mut self, ma: u32, now: Instant) {
        let Some(battery) = self.state.battery else {
            info!("AICR {} mA held until the first gauge reading", ma);
            self.state.held_aicr_ma = Some(ma);
            return;
        };
        self.state.held_aicr_ma = None;
        let ma = aicl::input_current_limit_protection(ma, battery.temp_decidegc);
        self.state.requested_aicr_ma = ma;

        let anchor = self.state.plug_in_at.max(self.state.last_aicr_at);
        let at = match anchor {
            Some(a) if ma != 0 && now < a + AICR_SETTLE_WINDOW => a + AICR_SETTLE_WINDOW,
            _ => now,
        };
        if at > now {
            info!("AICR {} mA deferred {} ms", ma, (at - now).as_millis());
        }
        self.aicr_apply.schedule(at);
    }

    /// Walk the AICL steps to `target_ma`. Returns false when skipped.
    pub async fn run_aicl(&mut self, target_ma: u32) -> bool {
        if self.state.otg_enabled {
            debug!("AICL skipped while OTG is on");
            return false;
        }
        if self.state.pre_input_current_ma == Some(target_ma) {
            return false;
        }
        self.state.pre_input_current_ma = Some(target_ma);
        info!("usb input max current limit={}", target_ma);

        let step = aicl::walk(&mut self.bq, &mut self.pmic, &mut self.delay, target_ma).await;
        aicl::commit(&mut self.bq, self.secondary.as_mut(), step, self.config.current_percent).await;
        true
    }

    /// Current AICL result as programmed in IINLIM.
    pub async fn input_current_limit(&mut self) -> CoreResult<u32, Error<I2C::Error>> {
        self.bq.input_current_limit().await
    }

    // ------------------ Charge current ------------------

    /// Write ICHG now and again (capped) once the deferral elapses.
    pub async fn set_charge_current(&mut self, ma: u32, now: Instant) -> Result<I2C::Error> {
        let res = self.bq.set_charge_current(ma).await;
        self.state.charge_current_ma = ma;
        self.chg_current_apply.schedule(now + CHG_CURRENT_APPLY_DELAY);
        res
    }

    // ------------------ Deferred work ------------------

    pub fn next_deadline(&self) -> Option<Instant> {
        deferred::earliest(&[&self.aicr_apply, &self.chg_current_apply])
    }

    pub fn aicr_pending(&self) -> bool { self.aicr_apply.is_pending() }

    pub fn chg_current_pending(&self) -> bool { self.chg_current_apply.is_pending() }

    /// Run every deferred job whose deadline has passed.
    pub async fn run_due(&mut self, now: Instant) {
        if self.aicr_apply.take_due(now) && self.run_aicl(self.state.requested_aicr_ma).await {
            self.state.last_aicr_at = Some(now);
        }
        if self.chg_current_apply.take_due(now) {
            let ma = self.state.charge_current_ma.min(CHARGE_CURRENT_MAX_MA);
            if self.bq.set_charge_current(ma).await.is_err() {
                warn!("set charge current {} mA failed", ma);
            }
        }
    }

    // ------------------ VINDPM ------------------

    /// Move the AICL point through its hysteresis and program VINDPM.
    pub async fn set_aicl_point(&mut self, vbat_mv: u32) -> Result<I2C::Error> {
        self.state.aicl_voltage_point_mv = next_aicl_point(self.state.aicl_voltage_point_mv, vbat_mv);
        self.bq.set_input_voltage_limit(self.state.aicl_voltage_point_mv).await
    }

    async fn set_mivr_by_battery_vol(&mut self) {
        let mv = mivr_for_battery(self.state.battery.map_or(0, |b| b.voltage_mv));
        if self.bq.set_input_voltage_limit(mv).await.is_err() {
            warn!("VINDPM {} mV failed", mv);
        }
    }

    async fn reset_aicl_point(&mut self) {
        self.state.aicl_voltage_point_mv = AICL_POINT_LOW_MV;
        if self.bq.set_input_voltage_limit(AICL_POINT_LOW_MV).await.is_err() {
            warn!("VINDPM {} mV failed", AICL_POINT_LOW_MV);
        }
    }

    pub fn update_battery(&mut self, battery: BatteryStatus, now: Instant) {
        self.state.battery = Some(battery);
        if let Some(ma) = self.state.held_aicr_ma.take() {
            self.set_input_current_limit(ma, now);
        }
    }

    // ------------------ Charging control ------------------

    /// Program the charging session defaults after a source was classified.
    pub async fn hardware_init(&mut self) -> Result<I2C::Error> {
        info!("hardware_init");
        self.reset_aicl_point().await;
        if self.bq.set_watchdog_timer(WdtTimer::S80).await.is_err() {
            warn!("hardware_init: en wdt fail");
        }

        let mut res = Ok(());
        if self.config.is_primary {
            res = self.charging_enable().await;
            if res.is_err() {
                warn!("hardware_init: en chg fail");
            }
        }

        let sdp = self.state.charger_type == ChargerType::StandardHost;
        if let Some(sec) = self.secondary.as_mut() {
            let r = if sdp { sec.charging_disable().await } else { sec.hardware_init().await };
            if r.is_err() {
                warn!("hardware_init: secondary charger failed");
            }
        }
        res
    }

    pub async fn charging_enable(&mut self) -> Result<I2C::Error> {
        self.bq.enable_charger(true).await?;
        self.state.charge_enabled = true;
        Ok(())
    }

    pub async fn charging_disable(&mut self) -> Result<I2C::Error> {
        if self.bq.set_watchdog_timer(WdtTimer::Disable).await.is_err() {
            warn!("charging_disable: disable wdt fail");
        }
        self.state.pre_input_current_ma = None;
        self.reset_aicl_point().await;
        self.bq.enable_charger(false).await?;
        self.state.charge_enabled = false;
        Ok(())
    }

    pub async fn set_charge_voltage(&mut self, mv: u32) -> Result<I2C::Error> {
        self.bq.set_charge_voltage(mv).await
    }

    pub async fn set_termination_current(&mut self, ma: u32) -> Result<I2C::Error> {
        self.bq.set_termination_current(ma).await
    }

    /// Stop the IC from ending the charge cycle on its own.
    pub async fn disable_termination(&mut self) -> Result<I2C::Error> {
        self.bq.enable_termination(false).await
    }

    pub async fn kick_watchdog(&mut self) -> Result<I2C::Error> {
        self.bq.reset_watchdog_timer().await
    }

    pub async fn is_charging_done(&mut self) -> CoreResult<bool, Error<I2C::Error>> {
        self.bq.is_charge_done().await
    }

    pub async fn set_hiz(&mut self, enable: bool) -> Result<I2C::Error> {
        self.bq.enable_hiz(enable).await
    }

    pub async fn enter_ship_mode(&mut self) -> Result<I2C::Error> {
        self.bq.enter_ship_mode(true).await
    }

    pub async fn dump_registers(&mut self) -> Result<I2C::Error> {
        self.bq.dump_regs().await
    }

    // ------------------ OTG ------------------

    /// `otg_enabled` follows only successful register writes.
    pub async fn enable_otg(&mut self, enable: bool) -> Result<I2C::Error> {
        if enable {
            self.bq.set_boost_current(self.pdata.boosti_ma).await?;
        }
        self.bq.enable_otg(enable).await?;
        self.state.otg_enabled = enable;
        info!("OTG {}", enable);
        Ok(())
    }

    // ------------------ Secondary charger ------------------

    pub async fn suspend_secondary(&mut self, suspend: bool) -> Result<I2C::Error> {
        let Some(sec) = self.secondary.as_mut() else {
            return Ok(());
        };
        let r = if suspend { sec.suspend().await } else { sec.unsuspend().await };
        r.map_err(|_| Error::Secondary)
    }

    // ------------------ Command dispatch ------------------

    pub async fn handle(&mut self, cmd: ChargerCommand, now: Instant) {
        let res = match cmd {
            ChargerCommand::Irq => {
                self.handle_irq(now).await;
                Ok(())
            }
            ChargerCommand::SetInputCurrentLimit(ma) => {
                self.set_input_current_limit(ma, now);
                Ok(())
            }
            ChargerCommand::SetChargeCurrent(ma) => self.set_charge_current(ma, now).await,
            ChargerCommand::SetChargeVoltage(mv) => self.set_charge_voltage(mv).await,
            ChargerCommand::SetTerminationCurrent(ma) => self.set_termination_current(ma).await,
            ChargerCommand::DisableTermination => self.disable_termination().await,
            ChargerCommand::BatteryUpdate { voltage_mv, temp_decidegc } => {
                self.update_battery(BatteryStatus { voltage_mv, temp_decidegc }, now);
                Ok(())
            }
            ChargerCommand::SetAiclPoint(vbat) => self.set_aicl_point(vbat).await,
            ChargerCommand::HardwareInit => self.hardware_init().await,
            ChargerCommand::EnableCharging(true) => self.charging_enable().await,
            ChargerCommand::EnableCharging(false) => self.charging_disable().await,
            ChargerCommand::EnableOtg(enable) => self.enable_otg(enable).await,
            ChargerCommand::EnableHiz(enable) => self.set_hiz(enable).await,
            ChargerCommand::EnterShipMode => self.enter_ship_mode().await,
            ChargerCommand::SuspendSecondary(suspend) => self.suspend_secondary(suspend).await,
            ChargerCommand::KickWatchdog => self.kick_watchdog().await,
            ChargerCommand::DumpRegisters => self.dump_registers().await,
        };
        if let Err(e) = res {
            warn!("charger: {:?} failed: {:?}", cmd, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bc12::regs::{BIAS_EN, CMP_EN};
    use crate::bq2560x::regs::*;
    use crate::host::NoSecondary;
    use crate::testing::{FakeDelay, FakeI2c, FakePmic, FakeSecondary, HostCall, RecordingHost};
    use embassy_futures::block_on;
    use embassy_time::Duration;

    type TestCharger<S> = Charger<FakeI2c, FakeDelay, FakePmic, RecordingHost, S>;

    struct Rig<S = NoSecondary> {
        chg: TestCharger<S>,
        i2c: FakeI2c,
        pmic: FakePmic,
        host: RecordingHost,
        delay: FakeDelay,
    }

    fn at(ms: u64) -> Instant { Instant::from_millis(ms) }

    fn rig_with<S: SecondaryCharger>(config: ChargerConfig, secondary: Option<S>) -> Rig<S> {
        let (i2c, pmic, host, delay) = (FakeI2c::new(), FakePmic::new(), RecordingHost::new(), FakeDelay::new());
        i2c.set_reg(REG0B, 0x02 << PN_SHIFT);
        let mut chg = Charger::new(
            i2c.clone(),
            delay.clone(),
            pmic.clone(),
            host.clone(),
            secondary,
            config,
            PlatformData::default(),
        );
        block_on(chg.attach()).unwrap();
        Rig { chg, i2c, pmic, host, delay }
    }

    fn rig() -> Rig { rig_with::<NoSecondary>(ChargerConfig::default(), None) }

    impl<S: SecondaryCharger> Rig<S> {
        fn irq(&mut self, pg: bool, now: Instant) {
            self.i2c.set_reg(REG08, if pg { PG_STAT } else { 0 });
            block_on(self.chg.handle_irq(now));
        }

        /// Plug in a source that classifies as `cmp`.
        fn plug(&mut self, cmp: &[core::result::Result<bool, ()>], now: Instant) {
            self.pmic.script_cmp(cmp);
            self.irq(true, now);
        }

        fn iinlim(&self) -> u32 {
            100 + (self.i2c.reg(REG00) & IINLIM_MASK) as u32 * 100
        }
    }

    const SDP: &[core::result::Result<bool, ()>] = &[Ok(false), Ok(false)];
    const CDP: &[core::result::Result<bool, ()>] = &[Ok(false), Ok(true), Ok(false)];
    const DCP: &[core::result::Result<bool, ()>] = &[Ok(false), Ok(true), Ok(true)];
    const NONSTANDARD: &[core::result::Result<bool, ()>] = &[Ok(true), Ok(false)];

    #[test]
    fn attach_rejects_unknown_part() {
        let i2c = FakeI2c::new();
        i2c.set_reg(REG0B, 0x05 << PN_SHIFT);
        let mut chg: TestCharger<NoSecondary> = Charger::new(
            i2c,
            FakeDelay::new(),
            FakePmic::new(),
            RecordingHost::new(),
            None,
            ChargerConfig::default(),
            PlatformData::default(),
        );
        assert_eq!(block_on(chg.attach()), Err(Error::InvalidDevice(0x05)));
    }

    #[test]
    fn insertion_classifies_in_the_same_pass() {
        let mut r = rig();
        r.plug(CDP, at(1_000));
        assert_eq!(r.chg.state().charger_type, ChargerType::ChargingHost);
        assert_eq!(r.chg.state().plug_in_at, Some(at(1_000)));
        let calls = r.host.calls();
        let tail = &calls[calls.len() - 4..];
        assert_eq!(
            tail,
            [HostCall::Release, HostCall::Online(true), HostCall::Type(ChargerType::ChargingHost), HostCall::UsbConnect]
        );
    }

    #[test]
    fn dcp_keeps_detection_resource() {
        let mut r = rig();
        r.plug(DCP, at(0));
        assert_eq!(r.chg.state().charger_type, ChargerType::StandardCharger);
        // Only the release at the end of detection.
        assert_eq!(r.host.count(HostCall::Release), 1);
        assert_eq!(r.host.count(HostCall::UsbConnect), 0);
    }

    #[test]
    fn classified_source_is_not_detected_again() {
        let mut r = rig();
        r.plug(SDP, at(0));
        let writes = r.pmic.writes().len();
        r.host.clear();
        r.irq(true, at(500));
        assert_eq!(r.pmic.writes().len(), writes);
        assert!(r.host.calls().is_empty());
    }

    #[test]
    fn first_nonstandard_result_is_retried_once() {
        let mut r = rig();
        r.plug(NONSTANDARD, at(0));
        assert_eq!(r.chg.state().charger_type, ChargerType::Unknown);
        assert!(r.chg.state().nonstandard_retry_pending);
        assert_eq!(r.host.count(HostCall::Online(true)), 0);

        r.pmic.script_cmp(NONSTANDARD);
        r.irq(true, at(100));
        assert_eq!(r.chg.state().charger_type, ChargerType::Nonstandard);
        assert_eq!(r.host.count(HostCall::Type(ChargerType::Nonstandard)), 1);
    }

    #[test]
    fn removal_resets_state_and_cancels_work() {
        let mut r = rig();
        r.plug(DCP, at(0));
        r.chg.set_input_current_limit(1500, at(1_000));
        block_on(r.chg.set_charge_current(1000, at(1_000))).unwrap();
        assert!(block_on(r.chg.run_aicl(900)));
        assert!(r.chg.aicr_pending() && r.chg.chg_current_pending());

        r.host.clear();
        r.irq(false, at(2_000));
        let s = r.chg.state();
        assert_eq!(s.charger_type, ChargerType::Unknown);
        assert_eq!(s.pre_input_current_ma, None);
        assert_eq!((s.plug_in_at, s.last_aicr_at), (None, None));
        assert!(!s.nonstandard_retry_pending);
        assert!(!r.chg.aicr_pending() && !r.chg.chg_current_pending());
        assert_eq!(r.chg.next_deadline(), None);
        assert_eq!(
            r.host.calls(),
            vec![HostCall::Online(false), HostCall::Type(ChargerType::Unknown), HostCall::UsbDisconnect, HostCall::Release]
        );

        // Next insertion starts over from Init.
        r.delay.clear();
        r.plug(SDP, at(3_000));
        assert_eq!(r.delay.waits()[..2], [200, 50]);
        assert_eq!(r.chg.state().charger_type, ChargerType::StandardHost);
    }

    #[test]
    fn no_power_to_no_power_does_nothing() {
        let mut r = rig();
        r.irq(false, at(0));
        assert!(r.host.calls().is_empty());
        assert!(r.pmic.writes().is_empty());
    }

    #[test]
    fn bus_error_on_status_read_is_absorbed() {
        let mut r = rig();
        r.i2c.set_reg(REG08, PG_STAT);
        r.i2c.fail_next(10);
        block_on(r.chg.handle_irq(at(0)));
        assert!(!r.chg.state().power_good);
    }

    #[test]
    fn otg_suppresses_detection() {
        let mut r = rig();
        block_on(r.chg.enable_otg(true)).unwrap();
        assert_ne!(r.i2c.reg(REG01) & OTG_CONFIG, 0);
        assert_ne!(r.i2c.reg(REG02) & BOOST_LIM, 0);
        r.irq(true, at(0));
        assert!(r.pmic.writes().is_empty());
        assert_eq!(r.chg.state().charger_type, ChargerType::Unknown);
        assert!(!block_on(r.chg.run_aicl(1500)));
    }

    #[test]
    fn failed_otg_write_keeps_previous_state() {
        let mut r = rig();
        r.i2c.fail_next(8);
        assert!(block_on(r.chg.enable_otg(true)).is_err());
        assert!(!r.chg.state().otg_enabled);
        assert_eq!(r.i2c.reg(REG01) & OTG_CONFIG, 0);
    }

    #[test]
    fn typec_managed_insertion_is_left_to_port_controller() {
        let cfg = ChargerConfig { typec_managed: true, charge_detect_enable: false, ..ChargerConfig::default() };
        let mut r = rig_with::<NoSecondary>(cfg, None);
        r.plug(SDP, at(0));
        assert!(r.chg.state().power_good);
        assert_eq!(r.chg.state().plug_in_at, None);
        assert_eq!(r.pmic.field_writes(BIAS_EN).len(), 0);
    }

    #[test]
    fn typec_managed_removal_with_detection_keeps_state() {
        let cfg = ChargerConfig { typec_managed: true, ..ChargerConfig::default() };
        let mut r = rig_with::<NoSecondary>(cfg, None);
        r.plug(SDP, at(0));
        r.irq(false, at(1_000));
        assert_eq!(r.chg.state().charger_type, ChargerType::StandardHost);
    }

    #[test]
    fn irq_programs_vindpm_from_battery_voltage() {
        let mut r = rig();
        r.chg.update_battery(BatteryStatus { voltage_mv: 4350, temp_decidegc: 250 }, at(0));
        r.irq(false, at(0));
        // 4750 mV floors to code 8.
        assert_eq!(r.i2c.reg(REG06) & VINDPM_MASK, 8);
        assert_eq!(mivr_for_battery(3800), 4400);
        assert_eq!(mivr_for_battery(4250), 4550);
    }

    #[test]
    fn aicl_runs_once_per_target() {
        let mut r = rig();
        assert!(block_on(r.chg.run_aicl(1200)));
        let writes = r.i2c.writes().len();
        assert!(!block_on(r.chg.run_aicl(1200)));
        assert_eq!(r.i2c.writes().len(), writes);
        assert_eq!(r.iinlim(), 1200);
    }

    #[test]
    fn input_current_request_waits_for_settle_window() {
        let mut r = rig();
        r.plug(DCP, at(10_000));
        r.chg.update_battery(BatteryStatus { voltage_mv: 3900, temp_decidegc: 250 }, at(0));
        r.chg.set_input_current_limit(2000, at(11_000));
        assert_eq!(r.chg.next_deadline(), Some(at(13_000)));
        block_on(r.chg.run_due(at(12_999)));
        assert_eq!(r.chg.state().pre_input_current_ma, None);
        block_on(r.chg.run_due(at(13_000)));
        assert_eq!(r.chg.state().pre_input_current_ma, Some(2000));
        assert_eq!(r.iinlim(), 2000);
        assert_eq!(r.chg.state().last_aicr_at, Some(at(13_000)));
    }

    #[test]
    fn later_request_supersedes_pending_one() {
        let mut r = rig();
        r.plug(DCP, at(0));
        r.chg.update_battery(BatteryStatus { voltage_mv: 3900, temp_decidegc: 250 }, at(0));
        r.chg.set_input_current_limit(2000, at(500));
        r.chg.set_input_current_limit(900, at(1_500));
        block_on(r.chg.run_due(at(3_000)));
        assert_eq!(r.chg.state().pre_input_current_ma, Some(900));
        assert_eq!(r.iinlim(), 900);
        // Ramp never probed above 900.
        assert_eq!(r.pmic.vbus_reads(), 2);
    }

    #[test]
    fn request_outside_window_applies_immediately() {
        let mut r = rig();
        r.plug(DCP, at(0));
        r.chg.update_battery(BatteryStatus { voltage_mv: 3900, temp_decidegc: 250 }, at(0));
        r.chg.set_input_current_limit(1500, at(5_000));
        assert_eq!(r.chg.next_deadline(), Some(at(5_000)));
        block_on(r.chg.run_due(at(5_000)));
        // A follow-up within 3 s of the applied change is deferred again.
        r.chg.set_input_current_limit(1200, at(6_000));
        assert_eq!(r.chg.next_deadline(), Some(at(8_000)));
    }

    #[test]
    fn zero_request_is_not_deferred() {
        let mut r = rig();
        r.plug(DCP, at(0));
        r.chg.update_battery(BatteryStatus { voltage_mv: 3900, temp_decidegc: 250 }, at(0));
        r.chg.set_input_current_limit(0, at(100));
        assert_eq!(r.chg.next_deadline(), Some(at(100)));
    }

    #[test]
    fn request_before_first_gauge_reading_is_held() {
        let mut r = rig();
        r.plug(DCP, at(0));
        r.chg.set_input_current_limit(2000, at(500));
        assert_eq!(r.chg.state().held_aicr_ma, Some(2000));
        assert_eq!(r.chg.next_deadline(), None);

        // Warm battery: the held request is clamped by the real band, not the cold one.
        r.chg.update_battery(BatteryStatus { voltage_mv: 3900, temp_decidegc: 250 }, at(1_000));
        assert_eq!(r.chg.state().held_aicr_ma, None);
        assert_eq!(r.chg.state().requested_aicr_ma, 2000);
        assert_eq!(r.chg.next_deadline(), Some(at(3_000)));
        block_on(r.chg.run_due(at(3_000)));
        assert_eq!(r.iinlim(), 2000);
    }

    #[test]
    fn held_request_is_dropped_on_removal() {
        let mut r = rig();
        r.plug(DCP, at(0));
        r.chg.set_input_current_limit(1500, at(500));
        r.irq(false, at(1_000));
        r.chg.update_battery(BatteryStatus { voltage_mv: 3900, temp_decidegc: 250 }, at(2_000));
        assert_eq!(r.chg.next_deadline(), None);
    }

    #[test]
    fn thermal_band_caps_applied_current() {
        for (temp, ceiling) in [(-20, 1000), (250, 2000), (350, 1500), (400, 1200)] {
            let mut r = rig();
            r.plug(DCP, at(0));
            r.chg.update_battery(BatteryStatus { voltage_mv: 3900, temp_decidegc: temp }, at(0));
            r.chg.set_input_current_limit(3000, at(10_000));
            block_on(r.chg.run_due(at(10_000)));
            assert!(r.iinlim() <= ceiling, "{} dC: {} mA", temp, r.iinlim());
            assert_eq!(r.chg.state().pre_input_current_ma, Some(ceiling));
        }
    }

    #[test]
    fn dual_charger_split_above_1a() {
        let sec = FakeSecondary::new();
        let mut r = rig_with(ChargerConfig::default(), Some(sec.clone()));
        block_on(r.chg.run_aicl(2000));
        assert_eq!(r.iinlim(), 1400);
        assert_eq!(sec.currents(), vec![600]);
        block_on(r.chg.run_aicl(900));
        assert_eq!(r.iinlim(), 900);
        assert_eq!(sec.currents(), vec![600]);
    }

    #[test]
    fn charge_current_is_reapplied_with_cap() {
        let mut r = rig();
        block_on(r.chg.set_charge_current(3600, at(0))).unwrap();
        assert_eq!(r.chg.next_deadline(), Some(at(0) + Duration::from_secs(3)));
        r.i2c.set_reg(REG02, 0);
        block_on(r.chg.run_due(at(3_000)));
        // 3400 mA saturates the 3000 mA ICHG field.
        assert_eq!(r.i2c.reg(REG02) & ICHG_MASK, 50);
        assert!(!r.chg.chg_current_pending());
    }

    #[test]
    fn aicl_point_hysteresis() {
        let mut r = rig();
        block_on(r.chg.set_aicl_point(4260)).unwrap();
        assert_eq!(r.chg.state().aicl_voltage_point_mv, 4500);
        block_on(r.chg.set_aicl_point(4200)).unwrap();
        assert_eq!(r.chg.state().aicl_voltage_point_mv, 4500);
        block_on(r.chg.set_aicl_point(4100)).unwrap();
        assert_eq!(r.chg.state().aicl_voltage_point_mv, 4400);
        assert_eq!(r.i2c.reg(REG06) & VINDPM_MASK, 5);
    }

    #[test]
    fn charging_disable_forgets_aicl_request() {
        let mut r = rig();
        block_on(r.chg.run_aicl(900));
        block_on(r.chg.set_aicl_point(4300)).unwrap();
        block_on(r.chg.charging_disable()).unwrap();
        assert_eq!(r.chg.state().pre_input_current_ma, None);
        assert_eq!(r.chg.state().aicl_voltage_point_mv, 4400);
        assert_eq!(r.i2c.reg(REG01) & CHG_CONFIG, 0);
        assert!(!r.chg.state().charge_enabled);
        assert!(block_on(r.chg.run_aicl(900)));
    }

    #[test]
    fn hardware_init_enables_primary_charging() {
        let mut r = rig();
        block_on(r.chg.hardware_init()).unwrap();
        assert_ne!(r.i2c.reg(REG01) & CHG_CONFIG, 0);
        assert_eq!((r.i2c.reg(REG05) & WATCHDOG_MASK) >> WATCHDOG_SHIFT, WdtTimer::S80 as u8);

        let cfg = ChargerConfig { is_primary: false, ..ChargerConfig::default() };
        let mut r = rig_with::<NoSecondary>(cfg, None);
        block_on(r.chg.hardware_init()).unwrap();
        assert_eq!(r.i2c.reg(REG01) & CHG_CONFIG, 0);
    }

    #[test]
    fn commands_are_dispatched() {
        let mut r = rig();
        block_on(r.chg.handle(ChargerCommand::BatteryUpdate { voltage_mv: 4000, temp_decidegc: 400 }, at(0)));
        assert_eq!(r.chg.state().battery.map(|b| b.temp_decidegc), Some(400));
        block_on(r.chg.handle(ChargerCommand::SetInputCurrentLimit(3000), at(0)));
        assert_eq!(r.chg.state().requested_aicr_ma, 1200);
        block_on(r.chg.handle(ChargerCommand::EnableHiz(true), at(0)));
        assert_ne!(r.i2c.reg(REG00) & EN_HIZ, 0);
        block_on(r.chg.handle(ChargerCommand::EnterShipMode, at(0)));
        assert_ne!(r.i2c.reg(REG07) & BATFET_DIS, 0);
        r.i2c.set_reg(REG08, 3 << CHRG_STAT_SHIFT);
        assert!(block_on(r.chg.is_charging_done()).unwrap());
    }

    #[test]
    fn secondary_follows_suspend_commands() {
        let sec = FakeSecondary::new();
        let mut r = rig_with(ChargerConfig::default(), Some(sec.clone()));
        block_on(r.chg.handle(ChargerCommand::SuspendSecondary(true), at(0)));
        assert!(sec.suspended());
        block_on(r.chg.handle(ChargerCommand::SuspendSecondary(false), at(0)));
        assert!(!sec.suspended());

        // Nothing to suspend on a single-charger board.
        let mut r = rig();
        assert!(block_on(r.chg.suspend_secondary(true)).is_ok());
    }

    #[test]
    fn voltage_and_termination_commands_reach_the_ic() {
        let mut r = rig();
        r.i2c.set_reg(REG05, r.i2c.reg(REG05) | EN_TERM);
        block_on(r.chg.handle(ChargerCommand::DisableTermination, at(0)));
        assert_eq!(r.i2c.reg(REG05) & EN_TERM, 0);
        block_on(r.chg.handle(ChargerCommand::SetChargeVoltage(4208), at(0)));
        assert_eq!((r.i2c.reg(REG04) & VREG_MASK) >> VREG_SHIFT, 11);
        block_on(r.chg.handle(ChargerCommand::SetTerminationCurrent(240), at(0)));
        assert_eq!((r.i2c.reg(REG03) & ITERM_MASK) >> ITERM_SHIFT, 3);
    }

    #[test]
    fn status_snapshot_reflects_state() {
        let mut r = rig();
        r.pmic.set_vbus_present(true);
        r.plug(CDP, at(0));
        let st = block_on(r.chg.status());
        assert!(st.power_good && st.vbus_present);
        assert_eq!(st.supply_type, crate::bc12::PowerSupplyType::UsbCdp);
        assert_eq!(r.pmic.field(CMP_EN), 0);
    }

    #[test]
    fn release_returns_collaborators() {
        let sec = FakeSecondary::new();
        let r = rig_with(ChargerConfig::default(), Some(sec));
        let (_i2c, _pmic, _host, secondary) = r.chg.release();
        assert!(secondary.is_some());
    }
}
