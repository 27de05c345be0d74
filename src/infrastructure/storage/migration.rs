//! Snapshot schema migration
//!
//! Runs once on the raw JSON before it is typed. Version 1 files nest a
//! connector map inside every EVSE; version 2 keeps a single status.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::{EvseStatus, Snapshot, SNAPSHOT_VERSION};
use crate::support::errors::InfraError;

/// Bring a raw snapshot up to [`SNAPSHOT_VERSION`] and type it.
pub fn migrate(mut raw: Value) -> Result<Snapshot, InfraError> {
    let root = raw
        .as_object_mut()
        .ok_or_else(|| InfraError::Migration("snapshot root is not an object".into()))?;

    let version = root.get("version").and_then(Value::as_u64).unwrap_or(1);
    if version > SNAPSHOT_VERSION as u64 {
        return Err(InfraError::Migration(format!(
            "snapshot version {} is newer than supported {}",
            version, SNAPSHOT_VERSION
        )));
    }

    if let Some(evses) = root.get_mut("evses") {
        let evses = evses
            .as_object_mut()
            .ok_or_else(|| InfraError::Migration("evses is not an object".into()))?;
        migrate_evses(evses);
    }

    root.insert("version".into(), Value::from(SNAPSHOT_VERSION));
    Ok(serde_json::from_value(raw)?)
}

fn migrate_evses(evses: &mut Map<String, Value>) {
    evses.retain(|key, _| {
        let numeric = key.parse::<u32>().is_ok();
        if !numeric {
            warn!(evse_key = key.as_str(), "Dropping EVSE with non-numeric id");
        }
        numeric
    });

    for (evse_id, evse) in evses.iter_mut() {
        let status = match evse.get("connectors") {
            Some(connectors) => {
                debug!(evse_id = evse_id.as_str(), "Collapsing nested connectors");
                first_connector_status(connectors)
            }
            None => evse.get("status").and_then(Value::as_str).map(str::to_owned),
        };
        let status = canonical_status(evse_id, status.as_deref());

        let mut record = Map::new();
        record.insert("status".into(), Value::from(status.as_str()));
        *evse = Value::Object(record);
    }
}

/// Status of the connector with the lowest numeric id; `Available` when
/// the map is empty.
fn first_connector_status(connectors: &Value) -> Option<String> {
    let Some(map) = connectors.as_object() else {
        return None;
    };
    if map.is_empty() {
        return Some(EvseStatus::Available.as_str().to_string());
    }
    map.iter()
        .filter_map(|(k, v)| k.parse::<u64>().ok().map(|id| (id, v)))
        .min_by_key(|(id, _)| *id)
        .and_then(|(_, conn)| conn.get("status"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn canonical_status(evse_id: &str, status: Option<&str>) -> EvseStatus {
    match status.and_then(EvseStatus::parse) {
        Some(status) => status,
        None => {
            warn!(
                evse_id,
                status = status.unwrap_or("<missing>"),
                "Unknown EVSE status in snapshot, treating as Unavailable"
            );
            EvseStatus::Unavailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collapses_legacy_connectors() {
        let raw = json!({
            "evses": {
                "1": {"connectors": {"2": {"status": "Available"}, "1": {"status": "Occupied"}}}
            },
            "transactions": {}
        });
        let snapshot = migrate(raw).unwrap();
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.evses[&1].status, EvseStatus::Occupied);
    }

    #[test]
    fn nested_field_is_removed() {
        let mut evses = json!({"1": {"connectors": {"1": {"status": "Faulted"}}}})
            .as_object()
            .cloned()
            .unwrap();
        migrate_evses(&mut evses);
        assert_eq!(evses["1"], json!({"status": "Faulted"}));
    }

    #[test]
    fn empty_connector_map_is_available() {
        let snapshot = migrate(json!({"evses": {"3": {"connectors": {}}}})).unwrap();
        assert_eq!(snapshot.evses[&3].status, EvseStatus::Available);
    }

    #[test]
    fn unknown_status_becomes_unavailable() {
        let snapshot = migrate(json!({
            "evses": {"1": {"status": "Reserved"}, "2": {"connectors": {"1": {"status": "Charging"}}}}
        }))
        .unwrap();
        assert_eq!(snapshot.evses[&1].status, EvseStatus::Unavailable);
        assert_eq!(snapshot.evses[&2].status, EvseStatus::Unavailable);
    }

    #[test]
    fn current_version_passes_through() {
        let raw = json!({
            "version": 2,
            "evses": {"1": {"status": "Occupied"}},
            "transactions": {"1": {"transaction_id": "t", "evse_id": 1, "seq_no": 3, "energy": 12.5, "is_charging": true}},
            "charging_profiles": {}
        });
        let snapshot = migrate(raw).unwrap();
        assert_eq!(snapshot.transactions["1"].seq_no, 3);
        assert!(snapshot.transactions["1"].is_charging);
    }

    #[test]
    fn rejects_non_object_root_and_future_versions() {
        assert!(matches!(migrate(json!([1, 2])), Err(InfraError::Migration(_))));
        assert!(matches!(
            migrate(json!({"version": 99})),
            Err(InfraError::Migration(_))
        ));
    }
}
