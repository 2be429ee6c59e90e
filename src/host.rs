//! Collaborators the charger driver talks to but does not own the implementation of.

use crate::bc12::ChargerType;

/// PMIC register bus and VBUS ADC. The BC1.2 front-end lives in this PMIC.
#[allow(async_fn_in_trait)]
pub trait Pmic {
    type Error: core::fmt::Debug;

    async fn read_reg(&mut self, addr: u16) -> Result<u16, Self::Error>;

    /// Read-modify-write of the bits selected by `mask`.
    async fn update_bits(&mut self, addr: u16, mask: u16, val: u16) -> Result<(), Self::Error>;

    /// VBUS voltage in mV.
    async fn vbus_mv(&mut self) -> Result<u32, Self::Error>;

    async fn vbus_present(&mut self) -> bool;
}

/// Upstream charger framework and USB stack.
pub trait ChargerHost {
    fn online_changed(&mut self, online: bool);
    fn charger_type_changed(&mut self, ty: ChargerType);
    /// An SDP/CDP host was detected; the USB device stack may enumerate.
    fn usb_connect(&mut self);
    fn usb_disconnect(&mut self);
    /// The USB PHY is up and D+/D- may be driven.
    fn usb_ready(&mut self) -> bool;
    /// Take the D+/D- lines from the USB PHY for detection.
    fn charger_detect_acquire(&mut self);
    fn charger_detect_release(&mut self);
}

/// Second charger IC sharing the input on dual-charger boards.
#[allow(async_fn_in_trait)]
pub trait SecondaryCharger {
    type Error: core::fmt::Debug;

    async fn set_input_current(&mut self, ma: u32) -> Result<(), Self::Error>;
    async fn hardware_init(&mut self) -> Result<(), Self::Error>;
    async fn charging_disable(&mut self) -> Result<(), Self::Error>;
    async fn suspend(&mut self) -> Result<(), Self::Error>;
    async fn unsuspend(&mut self) -> Result<(), Self::Error>;
}

/// Secondary charger type for single-charger boards; pass `None`.
#[derive(Debug)]
pub enum NoSecondary {}

impl SecondaryCharger for NoSecondary {
    type Error = core::convert::Infallible;

    async fn set_input_current(&mut self, _ma: u32) -> Result<(), Self::Error> { match *self {} }
    async fn hardware_init(&mut self) -> Result<(), Self::Error> { match *self {} }
    async fn charging_disable(&mut self) -> Result<(), Self::Error> { match *self {} }
    async fn suspend(&mut self) -> Result<(), Self::Error> { match *self {} }
    async fn unsuspend(&mut self) -> Result<(), Self::Error> { match *self {} }
}
