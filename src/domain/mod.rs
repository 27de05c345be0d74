//! Charging station domain model

pub mod charging_profile;
pub mod evse;
pub mod snapshot;
pub mod station;
pub mod transaction;

pub use charging_profile::{power_limit, ChargingProfile, SchedulePeriod, UNBOUNDED_POWER_W};
pub use evse::{Evse, EvseStatus};
pub use snapshot::{EvseRecord, Snapshot, TransactionRecord, SNAPSHOT_VERSION};
pub use station::StationState;
pub use transaction::{MeterState, MeterTaskId, Transaction};

pub use crate::support::errors::DomainError;
