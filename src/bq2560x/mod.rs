pub mod regs;
pub mod types;
pub mod device;
pub mod decode;

pub use device::Bq2560x;
pub use types::{ChargeStat, DeviceId, Error, PartNumber, WdtTimer};
