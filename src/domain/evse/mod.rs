//! EVSE aggregate

pub mod model;

pub use model::{Evse, EvseStatus};
