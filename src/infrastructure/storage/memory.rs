//! In-memory snapshot store for tests and dry runs

use parking_lot::Mutex;

use super::StateStore;
use crate::domain::Snapshot;
use crate::support::errors::InfraError;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
    saves: Mutex<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            saves: Mutex::new(0),
        }
    }

    /// Last saved snapshot.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.snapshot.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl StateStore for InMemoryStore {
    fn save(&self, snapshot: &Snapshot) -> Result<(), InfraError> {
        *self.snapshot.lock() = Some(snapshot.clone());
        *self.saves.lock() += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>, InfraError> {
        Ok(self.snapshot.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_returns_last_save() {
        let store = InMemoryStore::new();
        assert!(store.load().unwrap().is_none());

        let snapshot = Snapshot::default();
        store.save(&snapshot).unwrap();
        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot));
        assert_eq!(store.save_count(), 2);
    }
}
