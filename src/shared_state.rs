//! Messages exchanged with the charger actor, and the channels that carry them.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::channel::Channel;
use embassy_sync::pubsub::{ImmediatePublisher, PubSubChannel};

use crate::bc12::{ChargerType, PowerSupplyType};
use crate::config::COMMAND_QUEUE_DEPTH;
use crate::host::ChargerHost;

/// The commands that can be sent to the charger actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerCommand {
    /// The INT line fired.
    Irq,
    /// Requested input current (mA), thermally clamped and debounced.
    SetInputCurrentLimit(u32),
    /// Charge current (mA), re-applied 3 s later.
    SetChargeCurrent(u32),
    SetChargeVoltage(u32),
    SetTerminationCurrent(u32),
    /// Keep charging past the termination current.
    DisableTermination,
    /// Gauge reading: battery voltage (mV) and temperature (0.1 °C).
    BatteryUpdate { voltage_mv: u32, temp_decidegc: i32 },
    /// Re-evaluate the VINDPM hysteresis for a battery voltage (mV).
    SetAiclPoint(u32),
    HardwareInit,
    EnableCharging(bool),
    EnableOtg(bool),
    EnableHiz(bool),
    EnterShipMode,
    SuspendSecondary(bool),
    KickWatchdog,
    DumpRegisters,
}

/// Notifications published by the charger actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerEvent {
    Online(bool),
    ChargerType(ChargerType),
    UsbConnect,
    UsbDisconnect,
    /// D+/D- are taken from the USB PHY for detection.
    DetectAcquire,
    DetectRelease,
}

/// Snapshot published after every actor iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargerStatus {
    pub power_good: bool,
    pub vbus_present: bool,
    pub charger_type: ChargerType,
    pub supply_type: PowerSupplyType,
    pub otg_enabled: bool,
    pub charge_enabled: bool,
    /// Last AICL request, `None` until one ran since plug-in.
    pub input_current_ma: Option<u32>,
    pub charge_current_ma: u32,
    pub aicl_point_mv: u32,
}

pub const EVENT_CAP: usize = 8;
pub const EVENT_SUBS: usize = 3;
pub const STATUS_CAP: usize = 2;
pub const STATUS_SUBS: usize = 3;

/// The Channel for sending commands to the charger actor.
pub static CHARGER_COMMANDS: Channel<CriticalSectionRawMutex, ChargerCommand, COMMAND_QUEUE_DEPTH> = Channel::new();

/// The PubSubChannel for charger notifications. One publisher: the actor.
pub static CHARGER_EVENTS: PubSubChannel<CriticalSectionRawMutex, ChargerEvent, EVENT_CAP, EVENT_SUBS, 1> =
    PubSubChannel::new();

/// The PubSubChannel for broadcasting charger status.
pub static CHARGER_STATUS: PubSubChannel<CriticalSectionRawMutex, ChargerStatus, STATUS_CAP, STATUS_SUBS, 1> =
    PubSubChannel::new();

/// Set by the USB device task once the PHY is up.
pub static USB_READY: AtomicBool = AtomicBool::new(false);

/// `ChargerHost` that turns upstream notifications into `ChargerEvent`s.
pub struct EventPublisher<'a, M: RawMutex, const CAP: usize, const SUBS: usize, const PUBS: usize> {
    publisher: ImmediatePublisher<'a, M, ChargerEvent, CAP, SUBS, PUBS>,
    usb_ready: &'a AtomicBool,
}

impl EventPublisher<'static, CriticalSectionRawMutex, EVENT_CAP, EVENT_SUBS, 1> {
    /// Publisher on the crate-wide event channel.
    pub fn global() -> Self {
        Self::new(CHARGER_EVENTS.immediate_publisher(), &USB_READY)
    }
}

impl<'a, M: RawMutex, const CAP: usize, const SUBS: usize, const PUBS: usize> EventPublisher<'a, M, CAP, SUBS, PUBS> {
    pub fn new(publisher: ImmediatePublisher<'a, M, ChargerEvent, CAP, SUBS, PUBS>, usb_ready: &'a AtomicBool) -> Self {
        Self { publisher, usb_ready }
    }

    fn publish(&self, ev: ChargerEvent) {
        // Lagging subscribers lose the oldest event.
        self.publisher.publish_immediate(ev);
    }
}

impl<'a, M: RawMutex, const CAP: usize, const SUBS: usize, const PUBS: usize> ChargerHost
    for EventPublisher<'a, M, CAP, SUBS, PUBS>
{
    fn online_changed(&mut self, online: bool) { self.publish(ChargerEvent::Online(online)); }
    fn charger_type_changed(&mut self, ty: ChargerType) { self.publish(ChargerEvent::ChargerType(ty)); }
    fn usb_connect(&mut self) { self.publish(ChargerEvent::UsbConnect); }
    fn usb_disconnect(&mut self) { self.publish(ChargerEvent::UsbDisconnect); }
    fn usb_ready(&mut self) -> bool { self.usb_ready.load(Ordering::Acquire) }
    fn charger_detect_acquire(&mut self) { self.publish(ChargerEvent::DetectAcquire); }
    fn charger_detect_release(&mut self) { self.publish(ChargerEvent::DetectRelease); }
}
