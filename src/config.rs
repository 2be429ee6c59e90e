//! Compile-time knobs for the charger driver, plus the runtime board configuration.
//! Edit the constants and rebuild; board-specific values go through `PlatformData`.
use embassy_time::Duration;

/// Share of the input current the primary charger takes when a secondary is fitted (percent).
pub const CURRENT_PERCENT_DEFAULT: u32 = 70;

/// Dump and decode all registers on every charger interrupt.
pub const DUMP_REGS_ON_IRQ: bool = false;

/// VINDPM tracking point, low and high side of the hysteresis.
pub const AICL_POINT_LOW_MV: u32 = 4400;
pub const AICL_POINT_HIGH_MV: u32 = 4500;
/// Battery voltage that moves the AICL point up / back down.
pub const AICL_POINT_UP_VBAT_MV: u32 = 4250;
pub const AICL_POINT_DOWN_VBAT_MV: u32 = 4150;

/// Input-current changes closer than this to plug-in (or to the last change) are deferred.
pub const AICR_SETTLE_WINDOW: Duration = Duration::from_secs(3);
/// Delay before the charge current is re-applied after a request.
pub const CHG_CURRENT_APPLY_DELAY: Duration = Duration::from_secs(3);
/// Ceiling for the deferred charge-current write.
pub const CHARGE_CURRENT_MAX_MA: u32 = 3400;

/// Commands the charger actor can have queued.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

/// Runtime behaviour switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargerConfig {
    /// Primary share when a secondary charger takes part in AICL, 0..=100.
    pub current_percent: u32,
    pub dump_on_irq: bool,
    /// BC1.2 detection runs on this charger (otherwise the Type-C stack classifies).
    pub charge_detect_enable: bool,
    /// Plug events are owned by a Type-C port controller.
    pub typec_managed: bool,
    /// This IC charges the battery (as opposed to only supplying the system).
    pub is_primary: bool,
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            current_percent: CURRENT_PERCENT_DEFAULT,
            dump_on_irq: DUMP_REGS_ON_IRQ,
            charge_detect_enable: true,
            typec_managed: false,
            is_primary: true,
        }
    }
}

impl ChargerConfig {
    /// Build from board properties. Boolean properties are true when present and non-zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<u32>) -> Self {
        let d = Self::default();
        let flag = |name: &str, default: bool| lookup_or(&lookup, name, default as u32) != 0;
        Self {
            current_percent: lookup_or(&lookup, "current-percent", d.current_percent).min(100),
            dump_on_irq: flag("dump-on-irq", d.dump_on_irq),
            charge_detect_enable: flag("charge-detect-enable", d.charge_detect_enable),
            typec_managed: flag("typec-managed", d.typec_managed),
            is_primary: flag("primary-charger", d.is_primary),
        }
    }
}

/// Property value, or `default` with a warning when the board does not define it.
fn lookup_or(lookup: &impl Fn(&str) -> Option<u32>, name: &str, default: u32) -> u32 {
    match lookup(name) {
        Some(v) => v,
        None => {
            warn!("Failed to read property {}, using {}", name, default);
            default
        }
    }
}

/// Per-board charger parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlatformData {
    pub charger_name: &'static str,
    pub eint_name: &'static str,
    pub usb_ilim_ma: u32,
    pub usb_vreg_mv: u32,
    pub usb_ichg_ma: u32,
    /// REG00 STAT_SET, 0 = charge status on the STAT pin.
    pub stat_ctrl: u8,
    pub iprechg_ma: u32,
    pub iterm_ma: u32,
    pub boostv_mv: u32,
    pub boosti_ma: u32,
    pub vac_ovp_mv: u32,
}

impl Default for PlatformData {
    fn default() -> Self {
        Self {
            charger_name: "primary_chg",
            eint_name: "chr_stat",
            usb_ilim_ma: 2000,
            usb_vreg_mv: 4400,
            usb_ichg_ma: 2000,
            stat_ctrl: 0,
            iprechg_ma: 180,
            iterm_ma: 180,
            boostv_mv: 5000,
            boosti_ma: 1200,
            vac_ovp_mv: 6500,
        }
    }
}

impl PlatformData {
    /// Read every numeric property through `lookup`; missing ones keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<u32>) -> Self {
        let d = Self::default();
        let prop = |name: &str, default: u32| lookup_or(&lookup, name, default);
        Self {
            usb_ilim_ma: prop("usb-ilim", d.usb_ilim_ma),
            usb_vreg_mv: prop("usb-vreg", d.usb_vreg_mv),
            usb_ichg_ma: prop("usb-ichg", d.usb_ichg_ma),
            stat_ctrl: prop("stat-pin-ctrl", d.stat_ctrl as u32).min(3) as u8,
            iprechg_ma: prop("precharge-current", d.iprechg_ma),
            iterm_ma: prop("termination-current", d.iterm_ma),
            boostv_mv: prop("boost-voltage", d.boostv_mv),
            boosti_ma: prop("boost-current", d.boosti_ma),
            vac_ovp_mv: prop("vac-ovp-threshold", d.vac_ovp_mv),
            ..d
        }
    }

    pub fn with_names(self, charger_name: &'static str, eint_name: &'static str) -> Self {
        Self { charger_name, eint_name, ..self }
    }
}
