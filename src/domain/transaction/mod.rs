//! Transaction aggregate

pub mod model;

pub use model::{MeterState, MeterTaskId, Transaction};
