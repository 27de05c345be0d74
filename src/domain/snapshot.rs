//! Durable station snapshot
//!
//! The logical layout written to disk. Everything that may be missing in an
//! older or hand-edited file is optional or defaulted here; restoring the
//! live state from it decides what survives.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::charging_profile::ChargingProfile;
use super::evse::EvseStatus;

/// Current schema version.
pub const SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub evses: BTreeMap<u32, EvseRecord>,
    #[serde(default)]
    pub transactions: BTreeMap<String, TransactionRecord>,
    #[serde(default)]
    pub charging_profiles: BTreeMap<u32, ChargingProfile>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            evses: BTreeMap::new(),
            transactions: BTreeMap::new(),
            charging_profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvseRecord {
    pub status: EvseStatus,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub evse_id: Option<u32>,
    #[serde(default)]
    pub seq_no: u64,
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub is_charging: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending_remote_start: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_start_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tolerates_sparse_transaction_records() {
        let snapshot: Snapshot = serde_json::from_value(json!({
            "evses": {"1": {"status": "Occupied"}},
            "transactions": {"1-1": {"transaction_id": "abc", "evse_id": 1, "connector_id": 1, "energy": 300}}
        }))
        .unwrap();
        let record = &snapshot.transactions["1-1"];
        assert_eq!(record.energy, 300.0);
        assert_eq!(record.seq_no, 0);
        assert!(!record.is_charging);
        assert_eq!(snapshot.version, 0);
    }

    #[test]
    fn optional_fields_are_omitted() {
        let record = TransactionRecord {
            transaction_id: Some("t".into()),
            evse_id: Some(1),
            ..Default::default()
        };
        let v = serde_json::to_value(&record).unwrap();
        assert!(v.get("pending_remote_start").is_none());
        assert!(v.get("remote_start_id").is_none());
        assert_eq!(v["is_charging"], false);
    }
}
