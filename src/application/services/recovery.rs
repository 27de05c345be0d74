//! Restart recovery
//!
//! [`restore`] turns a loaded snapshot into live state, discarding whatever
//! cannot be trusted. [`RecoveryService::reannounce`] runs once the CSMS
//! has accepted the boot and tells it about every surviving transaction.

use std::collections::BTreeMap;

use rust_ocpp::v2_0_1::enumerations::charging_state_enum_type::ChargingStateEnumType;
use rust_ocpp::v2_0_1::enumerations::transaction_event_enum_type::TransactionEventEnumType;
use rust_ocpp::v2_0_1::enumerations::trigger_reason_enum_type::TriggerReasonEnumType;
use tracing::{info, warn};

use super::lifecycle::LifecycleService;
use crate::application::sender::TxEvent;
use crate::domain::{
    Evse, EvseStatus, MeterState, Snapshot, StationState, Transaction, TransactionRecord,
};

/// Build live state from a snapshot.
///
/// Transactions are dropped when they miss an id, point at an unknown or
/// Available EVSE, are still waiting for a vehicle after a remote start,
/// or collide with an earlier record on the same EVSE. EVSEs left
/// Occupied or Unavailable without a transaction become Available.
pub fn restore(snapshot: Snapshot) -> StationState {
    let mut evses: BTreeMap<u32, Evse> = snapshot
        .evses
        .iter()
        .map(|(id, record)| (*id, Evse::with_status(*id, record.status)))
        .collect();

    let mut transactions = BTreeMap::new();
    for (key, record) in snapshot.transactions {
        let Some((evse_id, tx)) = restore_transaction(&key, record) else {
            continue;
        };
        let Some(evse) = evses.get_mut(&evse_id) else {
            warn!(key = %key, evse_id, "Dropping transaction for unknown EVSE");
            continue;
        };
        if evse.is_available() {
            warn!(key = %key, evse_id, "Dropping transaction on Available EVSE");
            continue;
        }
        if tx.pending_remote_start {
            warn!(key = %key, evse_id, "Dropping unfinished remote start");
            evse.status = EvseStatus::Available;
            continue;
        }
        if transactions.contains_key(&evse_id) {
            warn!(key = %key, evse_id, "Dropping duplicate transaction for EVSE");
            continue;
        }
        transactions.insert(evse_id, tx);
    }

    for evse in evses.values_mut() {
        let orphaned = matches!(evse.status, EvseStatus::Occupied | EvseStatus::Unavailable)
            && !transactions.contains_key(&evse.id);
        if orphaned {
            warn!(evse_id = evse.id, status = %evse.status, "EVSE without transaction reset to Available");
            evse.status = EvseStatus::Available;
        }
    }

    let charging_profiles = snapshot
        .charging_profiles
        .into_iter()
        .filter(|(evse_id, profile)| {
            let known = evses.contains_key(evse_id) && profile.evse_id == *evse_id;
            if !known {
                warn!(evse_id, profile_id = profile.id, "Dropping charging profile for unknown EVSE");
            }
            known
        })
        .collect();

    StationState::from_parts(evses, transactions, charging_profiles)
}

fn restore_transaction(key: &str, record: TransactionRecord) -> Option<(u32, Transaction)> {
    let (Some(transaction_id), Some(evse_id)) = (record.transaction_id, record.evse_id) else {
        warn!(key, "Dropping transaction without transaction_id or evse_id");
        return None;
    };
    let tx = Transaction {
        transaction_id,
        evse_id,
        seq_no: record.seq_no,
        energy: record.energy,
        meter: if record.is_charging {
            MeterState::Suspended
        } else {
            MeterState::Idle
        },
        pending_remote_start: record.pending_remote_start,
        remote_start_id: record.remote_start_id,
        id_token: record.id_token,
    };
    Some((evse_id, tx))
}

#[derive(Clone)]
pub struct RecoveryService {
    lifecycle: LifecycleService,
}

impl RecoveryService {
    pub fn new(lifecycle: LifecycleService) -> Self {
        Self { lifecycle }
    }

    /// Announce every restored transaction, drop the ones the CSMS
    /// rejects, then resume metering for those that were charging.
    pub async fn reannounce(&self) {
        let station = self.lifecycle.station();
        let evse_ids: Vec<u32> = station.read(|s| s.transactions.keys().copied().collect());

        for evse_id in evse_ids {
            let announce = station.update(|s| {
                let tx = s.transaction_mut(evse_id)?;
                let state = if tx.is_charging() {
                    ChargingStateEnumType::Charging
                } else {
                    ChargingStateEnumType::EVConnected
                };
                Some((tx.transaction_id.clone(), tx.next_seq(), tx.energy, state))
            });
            let Some((transaction_id, seq_no, energy, state)) = announce else {
                continue;
            };

            let event = TxEvent::new(
                TransactionEventEnumType::Updated,
                TriggerReasonEnumType::ChargingStateChanged,
                seq_no,
                &transaction_id,
                evse_id,
            )
            .charging_state(state)
            .energy(energy);

            match station.sender().transaction_event(event).await {
                Ok(_) => info!(evse_id, transaction_id = %transaction_id, "Transaction re-announced"),
                Err(e) if e.is_rejection() => {
                    warn!(evse_id, transaction_id = %transaction_id, "CSMS rejected restored transaction");
                    self.drop_restored(evse_id, &transaction_id).await;
                }
                Err(e) => {
                    warn!(evse_id, transaction_id = %transaction_id, error = %e, "Re-announce not delivered, keeping transaction");
                }
            }
        }

        station.persist();

        let suspended: Vec<(u32, String)> = station.read(|s| {
            s.transactions
                .values()
                .filter(|tx| tx.meter == MeterState::Suspended)
                .map(|tx| (tx.evse_id, tx.transaction_id.clone()))
                .collect()
        });
        for (evse_id, transaction_id) in suspended {
            info!(evse_id, transaction_id = %transaction_id, "Resuming metering");
            if let Err(e) = self
                .lifecycle
                .start_metering(evse_id, &transaction_id, false)
            {
                warn!(evse_id, error = %e, "Could not resume metering");
            }
        }
    }

    async fn drop_restored(&self, evse_id: u32, transaction_id: &str) {
        let station = self.lifecycle.station();
        let dropped = station.update(|s| {
            let ours = s.holds(evse_id, transaction_id);
            if ours {
                s.transactions.remove(&evse_id);
                let _ = s.set_status(evse_id, EvseStatus::Available);
            }
            ours
        });
        if dropped {
            station
                .history()
                .record(format!("Restored transaction {} dropped", transaction_id));
            let _ = station
                .sender()
                .status_notification(evse_id, EvseStatus::Available)
                .await;
        }
    }
}
