//! Storage trait definitions

use crate::domain::Snapshot;
use crate::support::errors::InfraError;

/// Durable home of the station snapshot.
///
/// Synchronous on purpose: saves are small and never happen on the
/// metering path.
pub trait StateStore: Send + Sync {
    /// Replace the stored snapshot.
    fn save(&self, snapshot: &Snapshot) -> Result<(), InfraError>;

    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Snapshot>, InfraError>;
}
