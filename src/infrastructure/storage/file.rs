//! JSON file snapshot store

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::migration::migrate;
use super::StateStore;
use crate::domain::Snapshot;
use crate::support::errors::InfraError;

/// Default file name, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = "charge_point_state.json";

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_STATE_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    /// Write to a sibling temp file, then rename over the target.
    fn save(&self, snapshot: &Snapshot) -> Result<(), InfraError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "State saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>, InfraError> {
        if !self.path.exists() {
            return Ok(None);
        }
        info!(path = %self.path.display(), "Loading state");
        let bytes = fs::read(&self.path)?;
        let raw: serde_json::Value = serde_json::from_slice(&bytes)?;
        migrate(raw).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EvseRecord, EvseStatus, TransactionRecord};

    #[test]
    fn missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("state.json"));

        let mut snapshot = Snapshot::default();
        snapshot.evses.insert(1, EvseRecord { status: EvseStatus::Occupied });
        snapshot.evses.insert(2, EvseRecord { status: EvseStatus::Available });
        snapshot.transactions.insert(
            "1".into(),
            TransactionRecord {
                transaction_id: Some("tx-1".into()),
                evse_id: Some(1),
                seq_no: 7,
                energy: 83.325,
                is_charging: true,
                ..Default::default()
            },
        );

        store.save(&snapshot).unwrap();
        assert!(!store.temp_path().exists());
        assert_eq!(store.load().unwrap(), Some(snapshot));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(InfraError::Serialization(_))));
    }

    #[test]
    fn legacy_file_is_migrated_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            br#"{"evses": {"1": {"connectors": {"1": {"status": "Occupied"}, "2": {"status": "Available"}}}},
                 "transactions": {"1-1": {"transaction_id": "abc", "evse_id": 1, "connector_id": 1, "seq_no": 2, "energy": 200, "is_charging": false}}}"#,
        )
        .unwrap();
        let snapshot = JsonFileStore::new(&path).load().unwrap().unwrap();
        assert_eq!(snapshot.evses[&1].status, EvseStatus::Occupied);
        assert_eq!(snapshot.transactions["1-1"].energy, 200.0);
    }
}
