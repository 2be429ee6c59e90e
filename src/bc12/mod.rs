pub mod regs;
pub mod types;
pub mod detect;

pub use detect::Detector;
pub use types::{ChargerType, PowerSupplyType};
