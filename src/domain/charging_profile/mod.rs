//! ChargingProfile aggregate

pub mod model;
pub mod power_limit;

pub use model::{ChargingProfile, SchedulePeriod};
pub use power_limit::{power_limit, UNBOUNDED_POWER_W};
