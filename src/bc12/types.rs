/// Result of BC1.2 port classification.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerType {
    #[default]
    Unknown,
    /// SDP.
    StandardHost,
    /// CDP.
    ChargingHost,
    /// DCP.
    StandardCharger,
    Apple2_1A,
    Nonstandard,
}

/// Power-supply class reported upstream.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerSupplyType {
    #[default]
    Unknown,
    Usb,
    UsbCdp,
    UsbDcp,
}

impl ChargerType {
    pub fn power_supply_type(self) -> PowerSupplyType {
        match self {
            Self::Unknown => PowerSupplyType::Unknown,
            Self::StandardHost => PowerSupplyType::Usb,
            Self::ChargingHost => PowerSupplyType::UsbCdp,
            Self::StandardCharger | Self::Apple2_1A | Self::Nonstandard => PowerSupplyType::UsbDcp,
        }
    }

    /// Ports that carry USB data (the device stack should enumerate).
    pub fn is_usb_host(self) -> bool {
        matches!(self, Self::StandardHost | Self::ChargingHost)
    }
}
