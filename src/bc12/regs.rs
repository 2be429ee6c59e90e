//! PMIC BC1.1 charger-detect front-end fields.
//! Registers are 16 bit; each field is addressed as (register, mask, shift).

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    pub addr: u16,
    pub mask: u16,
    pub shift: u8,
}

impl Field {
    const fn new(addr: u16, mask: u16, shift: u8) -> Self { Self { addr, mask, shift } }

    /// Unshifted value into register position.
    pub const fn encode(self, val: u16) -> u16 { (val << self.shift) & self.mask }

    pub const fn decode(self, reg: u16) -> u16 { (reg & self.mask) >> self.shift }
}

// --- BC11_CON0: bias / reset
pub const BC11_CON0: u16 = 0x0A2E;
pub const   BIAS_EN: Field  = Field::new(BC11_CON0, 0x0001, 0);
pub const   BB_CTRL: Field  = Field::new(BC11_CON0, 0x0002, 1);
pub const   RST: Field      = Field::new(BC11_CON0, 0x0004, 2);

// --- BC11_CON1: sources, reference, comparator, pull-up/down
pub const BC11_CON1: u16 = 0x0A30;
pub const   VSRC_EN: Field  = Field::new(BC11_CON1, 0x0003, 0); // 1 = DM, 2 = DP
pub const   VREF_VTH: Field = Field::new(BC11_CON1, 0x000C, 2); // 0 = 0.325 V, 1 = 1.2 V
pub const   CMP_EN: Field   = Field::new(BC11_CON1, 0x0030, 4); // 1 = DP, 2 = DM
pub const   IPU_EN: Field   = Field::new(BC11_CON1, 0x00C0, 6); // 2 = DP pull-up
pub const   IPD_EN: Field   = Field::new(BC11_CON1, 0x0300, 8); // 1 = DP, 2 = DM pull-down

// --- BC11_CON2: comparator output (read-only)
pub const BC11_CON2: u16 = 0x0A32;
pub const   CMP_OUT: Field  = Field::new(BC11_CON2, 0x0001, 0);
