//! Async driver for the TI BQ2560x single-cell charger with BC1.2 charger-type
//! detection on the PMIC front-end and a software AICL current ramp.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod aicl;
pub mod bc12;
pub mod bq2560x;
pub mod charger;
pub mod config;
pub mod deferred;
pub mod host;
pub mod shared_state;
pub mod task;

#[cfg(test)]
mod testing;

pub use bc12::{ChargerType, PowerSupplyType};
pub use bq2560x::{Bq2560x, Error};
pub use charger::{BatteryStatus, Charger, ChargerState};
pub use config::{ChargerConfig, PlatformData};
pub use host::{ChargerHost, NoSecondary, Pmic, SecondaryCharger};
pub use shared_state::{ChargerCommand, ChargerEvent, ChargerStatus, EventPublisher};
