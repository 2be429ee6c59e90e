//! Register addresses and bit masks for the BQ2560x (BQ25600/BQ25601).
//! All registers are 8 bit. Field values are given unshifted; use the `*_SHIFT`.

pub const I2C_ADDR: u8 = 0x6B;

// --- REG00: input source control
pub const REG00: u8 = 0x00;
pub const   EN_HIZ: u8          = 1 << 7;
pub const   STAT_CTRL_MASK: u8  = 0b0110_0000; // <<5
pub const   STAT_CTRL_SHIFT: u8 = 5;
pub const   IINLIM_MASK: u8     = 0b0001_1111; // 100 mA + 100 mA/LSB
pub const   IINLIM_SHIFT: u8    = 0;
pub const   IINLIM_BASE_MA: u32 = 100;
pub const   IINLIM_LSB_MA: u32  = 100;

// --- REG01: power-on configuration
pub const REG01: u8 = 0x01;
pub const   PFM_DIS: u8         = 1 << 7;
pub const   WD_RST: u8          = 1 << 6; // self-clearing
pub const   OTG_CONFIG: u8      = 1 << 5;
pub const   CHG_CONFIG: u8      = 1 << 4;
pub const   SYS_MIN_MASK: u8    = 0b0000_1110; // <<1
pub const   MIN_VBAT_SEL: u8    = 1 << 0;

// --- REG02: charge current control
pub const REG02: u8 = 0x02;
pub const   BOOST_LIM: u8       = 1 << 7; // 0 = 0.5 A, 1 = 1.2 A
pub const   Q1_FULLON: u8       = 1 << 6;
pub const   ICHG_MASK: u8       = 0b0011_1111; // 60 mA/LSB
pub const   ICHG_SHIFT: u8      = 0;
pub const   ICHG_BASE_MA: u32   = 0;
pub const   ICHG_LSB_MA: u32    = 60;
pub const   ICHG_MAX_MA: u32    = 3000;

// --- REG03: pre-charge / termination current
pub const REG03: u8 = 0x03;
pub const   IPRECHG_MASK: u8    = 0b1111_0000; // <<4, 60 mA + 60 mA/LSB
pub const   IPRECHG_SHIFT: u8   = 4;
pub const   ITERM_MASK: u8      = 0b0000_1111; // 60 mA + 60 mA/LSB
pub const   ITERM_SHIFT: u8     = 0;
pub const   IPRECHG_BASE_MA: u32 = 60;
pub const   ITERM_BASE_MA: u32   = 60;
pub const   ITERM_LSB_MA: u32    = 60;

// --- REG04: charge voltage
pub const REG04: u8 = 0x04;
pub const   VREG_MASK: u8       = 0b1111_1000; // <<3, 3856 mV + 32 mV/LSB
pub const   VREG_SHIFT: u8      = 3;
pub const   VREG_BASE_MV: u32   = 3856;
pub const   VREG_LSB_MV: u32    = 32;
pub const   TOPOFF_TIMER_MASK: u8 = 0b0000_0110; // <<1
pub const   VRECHG: u8          = 1 << 0;

// --- REG05: termination / timer control
pub const REG05: u8 = 0x05;
pub const   EN_TERM: u8         = 1 << 7;
pub const   WATCHDOG_MASK: u8   = 0b0011_0000; // <<4
pub const   WATCHDOG_SHIFT: u8  = 4;
pub const   EN_TIMER: u8        = 1 << 3;
pub const   CHG_TIMER: u8       = 1 << 2;
pub const   TREG: u8            = 1 << 1;
pub const   JEITA_ISET: u8      = 1 << 0;

// --- REG06: OVP / boost voltage / VINDPM
pub const REG06: u8 = 0x06;
pub const   OVP_MASK: u8        = 0b1100_0000; // <<6
pub const   OVP_SHIFT: u8       = 6;
pub const   BOOSTV_MASK: u8     = 0b0011_0000; // <<4
pub const   BOOSTV_SHIFT: u8    = 4;
pub const   VINDPM_MASK: u8     = 0b0000_1111; // 3900 mV + 100 mV/LSB
pub const   VINDPM_SHIFT: u8    = 0;
pub const   VINDPM_BASE_MV: u32 = 3900;
pub const   VINDPM_LSB_MV: u32  = 100;

// --- REG07: misc operation control
pub const REG07: u8 = 0x07;
pub const   IINDET_EN: u8       = 1 << 7;
pub const   TMR2X_EN: u8        = 1 << 6;
pub const   BATFET_DIS: u8      = 1 << 5;
pub const   JEITA_VSET: u8      = 1 << 4;
pub const   BATFET_DLY: u8      = 1 << 3; // 0 = 0 s, 1 = 10 s
pub const   BATFET_RST_EN: u8   = 1 << 2;
pub const   VDPM_BAT_TRACK_MASK: u8 = 0b0000_0011;
pub const   VDPM_BAT_TRACK_200MV: u8 = 0b01;

// --- REG08: system status (read-only)
pub const REG08: u8 = 0x08;
pub const   VBUS_STAT_MASK: u8  = 0b1110_0000; // <<5
pub const   CHRG_STAT_MASK: u8  = 0b0001_1000; // <<3
pub const   CHRG_STAT_SHIFT: u8 = 3;
pub const   PG_STAT: u8         = 1 << 2;
pub const   THERM_STAT: u8      = 1 << 1;
pub const   VSYS_STAT: u8       = 1 << 0;

// --- REG09: faults (read-only, latched)
pub const REG09: u8 = 0x09;
pub const   WATCHDOG_FAULT: u8  = 1 << 7;
pub const   BOOST_FAULT: u8     = 1 << 6;
pub const   CHRG_FAULT_MASK: u8 = 0b0011_0000; // <<4
pub const   BAT_FAULT: u8       = 1 << 3;
pub const   NTC_FAULT_MASK: u8  = 0b0000_0111;

// --- REG0A: status + interrupt masks
pub const REG0A: u8 = 0x0A;
pub const   VBUS_GD: u8         = 1 << 7;
pub const   VINDPM_STAT: u8     = 1 << 6;
pub const   IINDPM_STAT: u8     = 1 << 5;
pub const   TOPOFF_ACTIVE: u8   = 1 << 3;
pub const   ACOV_STAT: u8       = 1 << 2;
pub const   VINDPM_INT_MASK: u8 = 1 << 1;
pub const   IINDPM_INT_MASK: u8 = 1 << 0;

// --- REG0B: part information
pub const REG0B: u8 = 0x0B;
pub const   REG_RESET: u8       = 1 << 7;
pub const   PN_MASK: u8         = 0b0111_1000; // <<3
pub const   PN_SHIFT: u8        = 3;
pub const   DEV_REV_MASK: u8    = 0b0000_0011;

pub const REG_COUNT: u8 = 0x0C;
