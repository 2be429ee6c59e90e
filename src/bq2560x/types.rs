//! Public enums and driver error type.

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error<E> {
    I2c(E),
    /// The secondary charger rejected a request.
    Secondary,
    /// Part number mismatch.
    InvalidDevice(u8),
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for Error<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::I2c(_) => defmt::write!(f, "I2c(..)"),
            Error::Secondary => defmt::write!(f, "Secondary"),
            Error::InvalidDevice(pn) => defmt::write!(f, "InvalidDevice({=u8})", pn),
        }
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PartNumber {
    Bq25600 = 0x00,
    Bq25601 = 0x02,
}

impl PartNumber {
    pub fn from_code(pn: u8) -> Option<Self> {
        match pn {
            0x00 => Some(Self::Bq25600),
            0x02 => Some(Self::Bq25601),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceId {
    pub part: PartNumber,
    pub revision: u8,
}

/// REG08 CHRG_STAT.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeStat {
    Idle = 0,
    PreCharge = 1,
    FastCharge = 2,
    Done = 3,
}

impl ChargeStat {
    pub fn from_code(code: u8) -> Self {
        match code & 0b11 {
            0 => Self::Idle,
            1 => Self::PreCharge,
            2 => Self::FastCharge,
            _ => Self::Done,
        }
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WdtTimer { Disable=0, S40=1, S80=2, S160=3 }

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoostVoltage { Mv4850=0, Mv5000=1, Mv5150=2, Mv5300=3 }

impl BoostVoltage {
    /// Unlisted voltages fall back to 5.0 V.
    pub fn from_mv(mv: u32) -> Self {
        match mv {
            4850 => Self::Mv4850,
            5150 => Self::Mv5150,
            5300 => Self::Mv5300,
            _ => Self::Mv5000,
        }
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VacOvp { Mv5500=0, Mv6500=1, Mv10500=2, Mv14000=3 }

impl VacOvp {
    /// Unlisted thresholds fall back to 5.5 V.
    pub fn from_mv(mv: u32) -> Self {
        match mv {
            14000 | 14300 => Self::Mv14000,
            10500 => Self::Mv10500,
            6500 => Self::Mv6500,
            _ => Self::Mv5500,
        }
    }
}
