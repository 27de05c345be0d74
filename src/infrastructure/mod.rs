//! Infrastructure layer - external concerns

pub mod storage;
pub mod transport;

pub use storage::{InMemoryStore, JsonFileStore, StateStore};
pub use transport::{connect, run_session, WsCsmsClient};
