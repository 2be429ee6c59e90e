//! High-level driver API (async, owns the I²C device so it can live inside the charger actor).

use core::result::Result as CoreResult;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::bq2560x::regs::*;
use crate::bq2560x::types::*;
use crate::config::PlatformData;

pub type Result<E> = CoreResult<(), Error<E>>;

/// Retries after the first failed transfer.
pub const BUS_RETRIES: u8 = 3;
/// Pause between retries.
pub const BUS_RETRY_PAUSE_MS: u32 = 5;

/// BQ2560x async driver over I²C.
pub struct Bq2560x<I2C, D> {
    i2c: I2C,
    delay: D,
    addr: u8,
}

/// Encode `val` into a register field with `base + code * lsb` semantics.
///
/// Values below `base` encode as zero, values above the field width saturate.
#[inline]
fn enc_step(val: u32, base: u32, lsb: u32, mask: u8, shift: u8) -> u8 {
    let max_code = (mask >> shift) as u32;
    let code = (val.max(base) - base) / lsb;
    (code.min(max_code) as u8) << shift
}

#[inline]
fn dec_step(reg: u8, base: u32, lsb: u32, mask: u8, shift: u8) -> u32 {
    base + ((reg & mask) >> shift) as u32 * lsb
}

impl<I2C, D> Bq2560x<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Create a driver at the default 7-bit address.
    pub fn new(i2c: I2C, delay: D) -> Self { Self { i2c, delay, addr: I2C_ADDR } }

    /// Consume the driver and return the bus and delay.
    pub fn release(self) -> (I2C, D) { (self.i2c, self.delay) }

    // ------------------ Register access ------------------

    /// Read one register, retrying transport errors.
    pub async fn read_byte(&mut self, reg: u8) -> CoreResult<u8, Error<I2C::Error>> {
        let mut buf = [0u8; 1];
        let mut retries = BUS_RETRIES;
        loop {
            match self.i2c.write_read(self.addr, &[reg], &mut buf).await {
                Ok(()) => return Ok(buf[0]),
                Err(e) if retries == 0 => {
                    error!("i2c read fail: can't read from reg 0x{:02X}", reg);
                    return Err(Error::I2c(e));
                }
                Err(_) => {
                    retries -= 1;
                    self.delay.delay_ms(BUS_RETRY_PAUSE_MS).await;
                }
            }
        }
    }

    /// Write one register, retrying transport errors.
    pub async fn write_byte(&mut self, reg: u8, val: u8) -> Result<I2C::Error> {
        let mut retries = BUS_RETRIES;
        loop {
            match self.i2c.write(self.addr, &[reg, val]).await {
                Ok(()) => return Ok(()),
                Err(e) if retries == 0 => {
                    error!("i2c write fail: can't write 0x{:02X} to reg 0x{:02X}", val, reg);
                    return Err(Error::I2c(e));
                }
                Err(_) => {
                    retries -= 1;
                    self.delay.delay_ms(BUS_RETRY_PAUSE_MS).await;
                }
            }
        }
    }

    /// Read-modify-write of the bits selected by `mask`.
    pub async fn update_bits(&mut self, reg: u8, mask: u8, val: u8) -> Result<I2C::Error> {
        let cur = self.read_byte(reg).await?;
        self.write_byte(reg, (cur & !mask) | (val & mask)).await
    }

    async fn set_flag(&mut self, reg: u8, bit: u8, on: bool) -> Result<I2C::Error> {
        self.update_bits(reg, bit, if on { bit } else { 0 }).await
    }

    // ------------------ Identity ------------------

    pub async fn device_id(&mut self) -> CoreResult<DeviceId, Error<I2C::Error>> {
        let v = self.read_byte(REG0B).await?;
        let pn = (v & PN_MASK) >> PN_SHIFT;
        let part = PartNumber::from_code(pn).ok_or(Error::InvalidDevice(pn))?;
        Ok(DeviceId { part, revision: v & DEV_REV_MASK })
    }

    /// Probe the bus and validate the part number.
    pub async fn probe(&mut self) -> CoreResult<DeviceId, Error<I2C::Error>> {
        let id = self.device_id().await?;
        info!("BQ2560x: part {:?} rev {}", id.part, id.revision);
        Ok(id)
    }

    // ------------------ Input path ------------------

    /// IINLIM: 100..3200 mA in 100 mA steps (floored).
    pub async fn set_input_current_limit(&mut self, ma: u32) -> Result<I2C::Error> {
        let v = enc_step(ma, IINLIM_BASE_MA, IINLIM_LSB_MA, IINLIM_MASK, IINLIM_SHIFT);
        self.update_bits(REG00, IINLIM_MASK, v).await
    }

    pub async fn input_current_limit(&mut self) -> CoreResult<u32, Error<I2C::Error>> {
        let v = self.read_byte(REG00).await?;
        Ok(dec_step(v, IINLIM_BASE_MA, IINLIM_LSB_MA, IINLIM_MASK, IINLIM_SHIFT))
    }

    /// VINDPM: 3900..5400 mV in 100 mV steps.
    pub async fn set_input_voltage_limit(&mut self, mv: u32) -> Result<I2C::Error> {
        let v = enc_step(mv, VINDPM_BASE_MV, VINDPM_LSB_MV, VINDPM_MASK, VINDPM_SHIFT);
        self.update_bits(REG06, VINDPM_MASK, v).await
    }

    pub async fn input_voltage_limit(&mut self) -> CoreResult<u32, Error<I2C::Error>> {
        let v = self.read_byte(REG06).await?;
        Ok(dec_step(v, VINDPM_BASE_MV, VINDPM_LSB_MV, VINDPM_MASK, VINDPM_SHIFT))
    }

    pub async fn enable_hiz(&mut self, enable: bool) -> Result<I2C::Error> {
        self.set_flag(REG00, EN_HIZ, enable).await
    }

    pub async fn hiz(&mut self) -> CoreResult<bool, Error<I2C::Error>> {
        Ok(self.read_byte(REG00).await? & EN_HIZ != 0)
    }

    pub async fn set_acovp_threshold(&mut self, ovp: VacOvp) -> Result<I2C::Error> {
        self.update_bits(REG06, OVP_MASK, (ovp as u8) << OVP_SHIFT).await
    }

    // ------------------ Charge parameters ------------------

    /// ICHG: 0..3000 mA in 60 mA steps.
    pub async fn set_charge_current(&mut self, ma: u32) -> Result<I2C::Error> {
        let v = enc_step(ma.min(ICHG_MAX_MA), ICHG_BASE_MA, ICHG_LSB_MA, ICHG_MASK, ICHG_SHIFT);
        self.update_bits(REG02, ICHG_MASK, v).await
    }

    pub async fn charge_current(&mut self) -> CoreResult<u32, Error<I2C::Error>> {
        let v = self.read_byte(REG02).await?;
        Ok(dec_step(v, ICHG_BASE_MA, ICHG_LSB_MA, ICHG_MASK, ICHG_SHIFT))
    }

    pub async fn set_precharge_current(&mut self, ma: u32) -> Result<I2C::Error> {
        let v = enc_step(ma, IPRECHG_BASE_MA, ITERM_LSB_MA, IPRECHG_MASK, IPRECHG_SHIFT);
        self.update_bits(REG03, IPRECHG_MASK, v).await
    }

    pub async fn set_termination_current(&mut self, ma: u32) -> Result<I2C::Error> {
        let v = enc_step(ma, ITERM_BASE_MA, ITERM_LSB_MA, ITERM_MASK, ITERM_SHIFT);
        self.update_bits(REG03, ITERM_MASK, v).await
    }

    pub async fn enable_termination(&mut self, enable: bool) -> Result<I2C::Error> {
        self.set_flag(REG05, EN_TERM, enable).await
    }

    /// VREG: 3856..4624 mV in 32 mV steps.
    pub async fn set_charge_voltage(&mut self, mv: u32) -> Result<I2C::Error> {
        let v = enc_step(mv, VREG_BASE_MV, VREG_LSB_MV, VREG_MASK, VREG_SHIFT);
        self.update_bits(REG04, VREG_MASK, v).await
    }

    pub async fn charge_voltage(&mut self) -> CoreResult<u32, Error<I2C::Error>> {
        let v = self.read_byte(REG04).await?;
        Ok(dec_step(v, VREG_BASE_MV, VREG_LSB_MV, VREG_MASK, VREG_SHIFT))
    }

    pub async fn enable_charger(&mut self, enable: bool) -> Result<I2C::Error> {
        self.set_flag(REG01, CHG_CONFIG, enable).await
    }

    pub async fn charger_enabled(&mut self) -> CoreResult<bool, Error<I2C::Error>> {
        Ok(self.read_byte(REG01).await? & CHG_CONFIG != 0)
    }

    // ------------------ Timers ------------------

    pub async fn set_watchdog_timer(&mut self, wdt: WdtTimer) -> Result<I2C::Error> {
        self.update_bits(REG05, WATCHDOG_MASK, (wdt as u8) << WATCHDOG_SHIFT).await
    }

    /// Kick the watchdog (self-clearing WD_RST pulse).
    pub async fn reset_watchdog_timer(&mut self) -> Result<I2C::Error> {
        self.set_flag(REG01, WD_RST, true).await
    }

    pub async fn enable_safety_timer(&mut self, enable: bool) -> Result<I2C::Error> {
        self.set_flag(REG05, EN_TIMER, enable).await
    }

    pub async fn safety_timer_enabled(&mut self) -> CoreResult<bool, Error<I2C::Error>> {
        Ok(self.read_byte(REG05).await? & EN_TIMER != 0)
    }

    // ------------------ OTG / boost ------------------

    pub async fn enable_otg(&mut self, enable: bool) -> Result<I2C::Error> {
        self.set_flag(REG01, OTG_CONFIG, enable).await
    }

    /// Boost current limit: 0.5 A, or 1.2 A for requests of 1200 mA and above.
    pub async fn set_boost_current(&mut self, ma: u32) -> Result<I2C::Error> {
        self.set_flag(REG02, BOOST_LIM, ma >= 1200).await
    }

    pub async fn set_boost_voltage(&mut self, v: BoostVoltage) -> Result<I2C::Error> {
        self.update_bits(REG06, BOOSTV_MASK, (v as u8) << BOOSTV_SHIFT).await
    }

    // ------------------ BATFET / misc ------------------

    /// Ship mode turns the BATFET off.
    pub async fn enter_ship_mode(&mut self, enable: bool) -> Result<I2C::Error> {
        self.set_flag(REG07, BATFET_DIS, enable).await
    }

    pub async fn enable_batfet_reset(&mut self, enable: bool) -> Result<I2C::Error> {
        self.set_flag(REG07, BATFET_RST_EN, enable).await
    }

    pub async fn set_vdpm_bat_track(&mut self) -> Result<I2C::Error> {
        self.update_bits(REG07, VDPM_BAT_TRACK_MASK, VDPM_BAT_TRACK_200MV).await
    }

    pub async fn set_stat_ctrl(&mut self, ctrl: u8) -> Result<I2C::Error> {
        self.update_bits(REG00, STAT_CTRL_MASK, ctrl << STAT_CTRL_SHIFT).await
    }

    /// Mask bits are REG0A[1:0] (VINDPM, IINDPM).
    pub async fn set_int_mask(&mut self, mask: u8) -> Result<I2C::Error> {
        self.update_bits(REG0A, VINDPM_INT_MASK | IINDPM_INT_MASK, mask).await
    }

    // ------------------ Status ------------------

    pub async fn power_good(&mut self) -> CoreResult<bool, Error<I2C::Error>> {
        Ok(self.read_byte(REG08).await? & PG_STAT != 0)
    }

    pub async fn charge_stat(&mut self) -> CoreResult<ChargeStat, Error<I2C::Error>> {
        let v = self.read_byte(REG08).await?;
        Ok(ChargeStat::from_code((v & CHRG_STAT_MASK) >> CHRG_STAT_SHIFT))
    }

    pub async fn is_charge_done(&mut self) -> CoreResult<bool, Error<I2C::Error>> {
        Ok(self.charge_stat().await? == ChargeStat::Done)
    }

    /// Log every register, then decode status and faults.
    pub async fn dump_regs(&mut self) -> Result<I2C::Error> {
        let mut regs = [0u8; REG_COUNT as usize];
        for (addr, slot) in regs.iter_mut().enumerate() {
            *slot = self.read_byte(addr as u8).await?;
        }
        info!("BQ2560x regs: {:02X}", &regs[..]);
        crate::bq2560x::decode::log_snapshot(regs[REG08 as usize], regs[REG09 as usize], regs[REG0A as usize]);
        Ok(())
    }

    // ------------------ Bring-up ------------------

    /// Program the static configuration. Individual failures are logged, not fatal.
    pub async fn init_device(&mut self, pdata: &PlatformData) {
        if self.set_watchdog_timer(WdtTimer::Disable).await.is_err() {
            warn!("BQ2560x: disable watchdog failed");
        }
        if self.set_vdpm_bat_track().await.is_err() {
            warn!("BQ2560x: VDPM_BAT_TRACK failed");
        }
        if self.enable_safety_timer(false).await.is_err() {
            warn!("BQ2560x: disable safety timer failed");
        }
        if self.set_stat_ctrl(pdata.stat_ctrl).await.is_err() {
            error!("Failed to set stat pin control mode");
        }
        if self.set_precharge_current(pdata.iprechg_ma).await.is_err() {
            error!("Failed to set prechg current");
        }
        if self.set_termination_current(pdata.iterm_ma).await.is_err() {
            error!("Failed to set termination current");
        }
        if self.set_boost_voltage(BoostVoltage::from_mv(pdata.boostv_mv)).await.is_err() {
            error!("Failed to set boost voltage");
        }
        if self.set_boost_current(pdata.boosti_ma).await.is_err() {
            error!("Failed to set boost current");
        }
        if self.set_acovp_threshold(VacOvp::from_mv(pdata.vac_ovp_mv)).await.is_err() {
            error!("Failed to set acovp threshold");
        }
        if self.set_int_mask(VINDPM_INT_MASK | IINDPM_INT_MASK).await.is_err() {
            error!("Failed to set vindpm and iindpm int mask");
        }
        if self.set_input_voltage_limit(crate::config::AICL_POINT_LOW_MV).await.is_err() {
            error!("Failed to set input volt limit");
        }
        if self.set_charge_voltage(pdata.usb_vreg_mv).await.is_err() {
            error!("Failed to set charge voltage");
        }
        if self.set_charge_current(pdata.usb_ichg_ma).await.is_err() {
            error!("Failed to set charge current");
        }
        if self.set_input_current_limit(pdata.usb_ilim_ma).await.is_err() {
            error!("Failed to set input current limit");
        }
    }
}
