//! Human-readable decoders for status/fault registers (BQ2560x).

use super::regs::*;
use super::types::ChargeStat;

fn log_named_bits(tag: &str, val: u8, map: &[(&'static str, u8)]) {
    let mut set = map.iter().filter(|(_, m)| val & m != 0).peekable();
    if set.peek().is_none() {
        info!("{}: (none set, 0x{:02X})", tag, val);
        return;
    }
    info!("{}:", tag);
    for (name, _) in set {
        info!("  - {}", *name);
    }
}

/// Names of the REG08 bits that are set, VBUS_STAT and CHRG_STAT excluded.
pub fn status_flags(s: u8) -> impl Iterator<Item = &'static str> {
    const MAP: &[(&str, u8)] = &[
        ("PG_STAT",    PG_STAT),
        ("THERM_STAT", THERM_STAT),
        ("VSYS_STAT",  VSYS_STAT),
    ];
    MAP.iter().filter(move |(_, m)| s & m != 0).map(|(n, _)| *n)
}

pub fn log_status(s: u8) {
    info!("REG08 = 0x{:02X}", s);
    let cs = ChargeStat::from_code((s & CHRG_STAT_MASK) >> CHRG_STAT_SHIFT);
    info!("  - CHRG_STAT: {:?}", cs);
    info!("  - VBUS_STAT: {}", (s & VBUS_STAT_MASK) >> 5);
    for name in status_flags(s) {
        info!("  - {}", name);
    }
}

pub fn log_faults(f: u8) {
    // REG09 is latched; the second read after a fault returns the live state.
    const MAP: &[(&str, u8)] = &[
        ("WATCHDOG_FAULT", WATCHDOG_FAULT),
        ("BOOST_FAULT",    BOOST_FAULT),
        ("BAT_FAULT",      BAT_FAULT),
    ];
    info!("REG09 = 0x{:02X}", f);
    log_named_bits("REG09 bits", f, MAP);
    match (f & CHRG_FAULT_MASK) >> 4 {
        0b00 => {}
        0b01 => info!("  - CHRG_FAULT: input fault (VBUS OVP or VBAT < VBUS < 3.8 V)"),
        0b10 => info!("  - CHRG_FAULT: thermal shutdown"),
        _    => info!("  - CHRG_FAULT: safety timer expired"),
    }
    if f & NTC_FAULT_MASK != 0 {
        info!("  - NTC_FAULT: 0b{:b}", f & NTC_FAULT_MASK);
    }
}

pub fn log_dpm(m: u8) {
    const MAP: &[(&str, u8)] = &[
        ("VBUS_GD",       VBUS_GD),
        ("VINDPM_STAT",   VINDPM_STAT),
        ("IINDPM_STAT",   IINDPM_STAT),
        ("TOPOFF_ACTIVE", TOPOFF_ACTIVE),
        ("ACOV_STAT",     ACOV_STAT),
    ];
    info!("REG0A = 0x{:02X}", m);
    log_named_bits("REG0A bits", m, MAP);
}

/// Convenience: decode everything read on the IRQ dump path.
pub fn log_snapshot(status: u8, faults: u8, dpm: u8) {
    log_status(status);
    log_faults(faults);
    log_dpm(dpm);
}
