//! Snapshot stores and schema migration

mod file;
mod memory;
pub mod migration;
mod traits;

pub use file::{JsonFileStore, DEFAULT_STATE_FILE};
pub use memory::InMemoryStore;
pub use traits::StateStore;
