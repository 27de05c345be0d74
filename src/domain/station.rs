//! Live station state
//!
//! All EVSEs, their transactions and charging profiles. Owned by the
//! application layer behind a mutex; every method here is synchronous.

use std::collections::BTreeMap;

use super::charging_profile::{power_limit, ChargingProfile};
use super::evse::{Evse, EvseStatus};
use super::snapshot::{EvseRecord, Snapshot, TransactionRecord, SNAPSHOT_VERSION};
use super::transaction::{MeterTaskId, Transaction};
use crate::support::errors::DomainError;

#[derive(Debug, Clone, Default)]
pub struct StationState {
    pub evses: BTreeMap<u32, Evse>,
    /// Keyed by EVSE id; at most one transaction per EVSE
    pub transactions: BTreeMap<u32, Transaction>,
    pub charging_profiles: BTreeMap<u32, ChargingProfile>,
    next_meter_task: u64,
}

impl StationState {
    /// EVSEs `1..=evse_count`, all Available.
    pub fn fresh(evse_count: u32) -> Self {
        Self {
            evses: (1..=evse_count).map(|id| (id, Evse::new(id))).collect(),
            ..Default::default()
        }
    }

    pub fn from_parts(
        evses: BTreeMap<u32, Evse>,
        transactions: BTreeMap<u32, Transaction>,
        charging_profiles: BTreeMap<u32, ChargingProfile>,
    ) -> Self {
        Self {
            evses,
            transactions,
            charging_profiles,
            next_meter_task: 0,
        }
    }

    // ── EVSEs ──────────────────────────────────────────────

    pub fn evse(&self, evse_id: u32) -> Result<&Evse, DomainError> {
        self.evses
            .get(&evse_id)
            .ok_or(DomainError::EvseNotFound(evse_id))
    }

    pub fn status(&self, evse_id: u32) -> Result<EvseStatus, DomainError> {
        Ok(self.evse(evse_id)?.status)
    }

    pub fn set_status(&mut self, evse_id: u32, status: EvseStatus) -> Result<(), DomainError> {
        let evse = self
            .evses
            .get_mut(&evse_id)
            .ok_or(DomainError::EvseNotFound(evse_id))?;
        evse.status = status;
        Ok(())
    }

    /// Lowest EVSE id without a transaction.
    pub fn first_free_evse(&self) -> Option<u32> {
        self.evses
            .keys()
            .copied()
            .find(|id| !self.transactions.contains_key(id))
    }

    // ── Transactions ───────────────────────────────────────

    pub fn transaction(&self, evse_id: u32) -> Option<&Transaction> {
        self.transactions.get(&evse_id)
    }

    pub fn transaction_mut(&mut self, evse_id: u32) -> Option<&mut Transaction> {
        self.transactions.get_mut(&evse_id)
    }

    /// EVSE owning the transaction with this id.
    pub fn evse_for_transaction(&self, transaction_id: &str) -> Option<u32> {
        self.transactions
            .values()
            .find(|tx| tx.transaction_id == transaction_id)
            .map(|tx| tx.evse_id)
    }

    /// True if the record on `evse_id` is still the transaction `transaction_id`.
    pub fn holds(&self, evse_id: u32, transaction_id: &str) -> bool {
        self.transactions
            .get(&evse_id)
            .is_some_and(|tx| tx.transaction_id == transaction_id)
    }

    pub fn allocate_meter_task(&mut self) -> MeterTaskId {
        self.next_meter_task += 1;
        MeterTaskId(self.next_meter_task)
    }

    // ── Charging profiles ──────────────────────────────────

    pub fn set_profile(&mut self, profile: ChargingProfile) -> Result<(), DomainError> {
        self.evse(profile.evse_id)?;
        self.charging_profiles.insert(profile.evse_id, profile);
        Ok(())
    }

    /// Remove profiles matching `profile_id` or `evse_id`, or all of them
    /// when neither is given. Returns how many were removed.
    pub fn clear_profiles(&mut self, profile_id: Option<i32>, evse_id: Option<u32>) -> usize {
        let before = self.charging_profiles.len();
        match (profile_id, evse_id) {
            (Some(id), _) => self.charging_profiles.retain(|_, p| p.id != id),
            (None, Some(evse)) => {
                self.charging_profiles.remove(&evse);
            }
            (None, None) => self.charging_profiles.clear(),
        }
        before - self.charging_profiles.len()
    }

    pub fn profiles_matching(
        &self,
        evse_id: Option<u32>,
        profile_ids: Option<&[i32]>,
    ) -> Vec<ChargingProfile> {
        self.charging_profiles
            .values()
            .filter(|p| evse_id.map_or(true, |e| p.evse_id == e))
            .filter(|p| profile_ids.map_or(true, |ids| ids.contains(&p.id)))
            .cloned()
            .collect()
    }

    /// Power ceiling of `evse_id` in watts.
    pub fn power_limit(&self, evse_id: u32) -> f64 {
        power_limit(self.charging_profiles.get(&evse_id))
    }

    // ── Persistence ────────────────────────────────────────

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            evses: self
                .evses
                .iter()
                .map(|(id, evse)| (*id, EvseRecord { status: evse.status }))
                .collect(),
            transactions: self
                .transactions
                .iter()
                .map(|(evse_id, tx)| {
                    (
                        evse_id.to_string(),
                        TransactionRecord {
                            transaction_id: Some(tx.transaction_id.clone()),
                            evse_id: Some(tx.evse_id),
                            seq_no: tx.seq_no,
                            energy: tx.energy,
                            is_charging: tx.is_charging(),
                            pending_remote_start: tx.pending_remote_start,
                            remote_start_id: tx.remote_start_id,
                            id_token: tx.id_token.clone(),
                        },
                    )
                })
                .collect(),
            charging_profiles: self.charging_profiles.clone(),
        }
    }

    /// `Available` EVSEs hold no transaction and every transaction sits on
    /// a known, non-Available EVSE.
    pub fn is_consistent(&self) -> bool {
        let evses_ok = self
            .evses
            .values()
            .all(|evse| !(evse.is_available() && self.transactions.contains_key(&evse.id)));
        let txs_ok = self.transactions.iter().all(|(key, tx)| {
            *key == tx.evse_id
                && self
                    .evses
                    .get(key)
                    .is_some_and(|evse| !evse.is_available())
        });
        evses_ok && txs_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::MeterState;

    #[test]
    fn fresh_state_has_available_evses() {
        let state = StationState::fresh(2);
        assert_eq!(state.evses.len(), 2);
        assert_eq!(state.status(1).unwrap(), EvseStatus::Available);
        assert!(matches!(state.evse(3), Err(DomainError::EvseNotFound(3))));
        assert!(state.is_consistent());
    }

    #[test]
    fn first_free_evse_prefers_lowest_id() {
        let mut state = StationState::fresh(3);
        assert_eq!(state.first_free_evse(), Some(1));
        state.set_status(1, EvseStatus::Occupied).unwrap();
        state.transactions.insert(1, Transaction::new(1));
        assert_eq!(state.first_free_evse(), Some(2));
    }

    #[test]
    fn snapshot_marks_charging_transactions() {
        let mut state = StationState::fresh(2);
        state.set_status(2, EvseStatus::Occupied).unwrap();
        let mut tx = Transaction::new(2);
        tx.seq_no = 4;
        tx.energy = 55.5;
        tx.meter = MeterState::Running(MeterTaskId(1));
        let id = tx.transaction_id.clone();
        state.transactions.insert(2, tx);

        let snapshot = state.to_snapshot();
        let record = &snapshot.transactions["2"];
        assert_eq!(record.transaction_id.as_deref(), Some(id.as_str()));
        assert_eq!(record.seq_no, 4);
        assert_eq!(record.energy, 55.5);
        assert!(record.is_charging);
        assert_eq!(snapshot.evses[&2].status, EvseStatus::Occupied);
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn transaction_on_available_evse_is_inconsistent() {
        let mut state = StationState::fresh(1);
        state.transactions.insert(1, Transaction::new(1));
        assert!(!state.is_consistent());
    }

    #[test]
    fn meter_task_ids_are_unique() {
        let mut state = StationState::fresh(1);
        let a = state.allocate_meter_task();
        let b = state.allocate_meter_task();
        assert_ne!(a, b);
    }

    fn profile(id: i32, evse_id: u32) -> ChargingProfile {
        ChargingProfile {
            id,
            evse_id,
            stack_level: 0,
            purpose: None,
            charging_rate_unit: None,
            periods: Vec::new(),
            received: None,
        }
    }

    #[test]
    fn set_profile_requires_known_evse() {
        let mut state = StationState::fresh(2);
        assert!(state.set_profile(profile(1, 9)).is_err());
        assert!(state.set_profile(profile(1, 2)).is_ok());
    }

    #[test]
    fn clear_profiles_by_id_evse_or_all() {
        let mut state = StationState::fresh(3);
        for evse in 1..=3 {
            state.set_profile(profile(evse as i32 * 10, evse)).unwrap();
        }
        assert_eq!(state.clear_profiles(Some(20), None), 1);
        assert_eq!(state.clear_profiles(Some(20), None), 0);
        assert_eq!(state.clear_profiles(None, Some(3)), 1);
        assert_eq!(state.clear_profiles(None, None), 1);
        assert!(state.charging_profiles.is_empty());
    }

    #[test]
    fn profiles_matching_filters() {
        let mut state = StationState::fresh(2);
        state.set_profile(profile(5, 1)).unwrap();
        state.set_profile(profile(6, 2)).unwrap();
        assert_eq!(state.profiles_matching(None, None).len(), 2);
        assert_eq!(state.profiles_matching(Some(2), None)[0].id, 6);
        assert_eq!(state.profiles_matching(None, Some(&[5])).len(), 1);
        assert!(state.profiles_matching(Some(1), Some(&[6])).is_empty());
    }
}
