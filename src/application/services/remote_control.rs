//! Remote start and stop
//!
//! The synchronous answer to the CSMS only depends on which EVSE the
//! request maps to. Reconciling it with the physical state happens
//! afterwards in a background task.

use rust_ocpp::v2_0_1::enumerations::charging_state_enum_type::ChargingStateEnumType;
use rust_ocpp::v2_0_1::enumerations::request_start_stop_status_enum_type::RequestStartStopStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::transaction_event_enum_type::TransactionEventEnumType;
use rust_ocpp::v2_0_1::enumerations::trigger_reason_enum_type::TriggerReasonEnumType;
use tracing::{info, warn};

use super::lifecycle::LifecycleService;
use crate::application::sender::TxEvent;
use crate::domain::{DomainError, EvseStatus, Transaction};

/// What a remote start finds on its EVSE when it runs.
enum StartPlan {
    AlreadyCharging,
    AwaitingVehicle,
    VehicleConnected { transaction_id: String, seq_no: u64 },
    Placeholder(Transaction),
}

#[derive(Clone)]
pub struct RemoteControlService {
    lifecycle: LifecycleService,
}

impl RemoteControlService {
    pub fn new(lifecycle: LifecycleService) -> Self {
        Self { lifecycle }
    }

    // ── RequestStartTransaction ────────────────────────────

    /// Pick the EVSE and answer. On `Accepted` the start is reconciled in
    /// a spawned task.
    pub fn request_start(
        &self,
        evse_id: Option<u32>,
        remote_start_id: i64,
        id_token: String,
    ) -> RequestStartStopStatusEnumType {
        let station = self.lifecycle.station();
        let target = station.read(|s| match evse_id {
            Some(id) => s.evses.contains_key(&id).then_some(id),
            None => s.first_free_evse(),
        });

        let Some(evse_id) = target else {
            warn!(?evse_id, remote_start_id, "No EVSE for remote start");
            station
                .history()
                .record(format!("Remote start {} rejected", remote_start_id));
            return RequestStartStopStatusEnumType::Rejected;
        };

        info!(evse_id, remote_start_id, "Remote start accepted");
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.reconcile_start(evse_id, remote_start_id, id_token).await {
                warn!(evse_id, remote_start_id, error = %e, "Remote start not completed");
            }
        });
        RequestStartStopStatusEnumType::Accepted
    }

    pub(crate) async fn reconcile_start(
        &self,
        evse_id: u32,
        remote_start_id: i64,
        id_token: String,
    ) -> Result<(), DomainError> {
        let station = self.lifecycle.station();
        let plan = station.update(|s| match s.transaction_mut(evse_id) {
            Some(tx) if tx.is_charging() => StartPlan::AlreadyCharging,
            Some(tx) if tx.pending_remote_start => StartPlan::AwaitingVehicle,
            Some(tx) => StartPlan::VehicleConnected {
                transaction_id: tx.transaction_id.clone(),
                seq_no: tx.next_seq(),
            },
            None => StartPlan::Placeholder(Transaction::remote_placeholder(
                evse_id,
                remote_start_id,
                id_token.clone(),
            )),
        });

        match plan {
            StartPlan::AlreadyCharging => {
                info!(evse_id, "Remote start ignored, EVSE already charging");
                Ok(())
            }
            StartPlan::AwaitingVehicle => {
                info!(evse_id, "Remote start ignored, EVSE already awaiting a vehicle");
                Ok(())
            }
            StartPlan::VehicleConnected {
                transaction_id,
                seq_no,
            } => {
                self.start_connected(evse_id, transaction_id, seq_no, remote_start_id, id_token)
                    .await
            }
            StartPlan::Placeholder(tx) => self.start_placeholder(tx).await,
        }
    }

    async fn start_connected(
        &self,
        evse_id: u32,
        transaction_id: String,
        seq_no: u64,
        remote_start_id: i64,
        id_token: String,
    ) -> Result<(), DomainError> {
        let station = self.lifecycle.station();
        let event = TxEvent::new(
            TransactionEventEnumType::Updated,
            TriggerReasonEnumType::RemoteStart,
            seq_no,
            &transaction_id,
            evse_id,
        )
        .charging_state(ChargingStateEnumType::Charging)
        .remote_start(Some(remote_start_id), Some(id_token.clone()));
        station.sender().transaction_event(event).await?;

        let adopted = station.update(|s| {
            if !s.holds(evse_id, &transaction_id) {
                return false;
            }
            if let Some(tx) = s.transaction_mut(evse_id) {
                tx.remote_start_id = Some(remote_start_id);
                tx.id_token = Some(id_token);
            }
            true
        });
        if !adopted {
            return Err(DomainError::Conflict(format!(
                "Transaction on EVSE {} changed during the remote start",
                evse_id
            )));
        }
        self.lifecycle
            .start_metering(evse_id, &transaction_id, false)?;
        self.lifecycle
            .mark_remote_charging(evse_id, &transaction_id)
            .await;
        station.persist();
        info!(evse_id, transaction_id = %transaction_id, "Remote start charging connected vehicle");
        Ok(())
    }

    async fn start_placeholder(&self, tx: Transaction) -> Result<(), DomainError> {
        let station = self.lifecycle.station();
        let evse_id = tx.evse_id;
        let transaction_id = tx.transaction_id.clone();

        let event = TxEvent::new(
            TransactionEventEnumType::Started,
            TriggerReasonEnumType::RemoteStart,
            0,
            &transaction_id,
            evse_id,
        )
        .remote_start(tx.remote_start_id, tx.id_token.clone());
        station.sender().transaction_event(event).await?;

        let committed = station.update(|s| {
            if s.transaction(evse_id).is_some() {
                return false;
            }
            s.transactions.insert(evse_id, tx);
            let _ = s.set_status(evse_id, EvseStatus::Occupied);
            true
        });
        if !committed {
            return Err(DomainError::Conflict(format!(
                "EVSE {} was taken while the remote start was pending",
                evse_id
            )));
        }

        let _ = station
            .sender()
            .status_notification(evse_id, EvseStatus::Occupied)
            .await;
        station.persist();
        info!(evse_id, transaction_id = %transaction_id, "Remote start waiting for vehicle");
        Ok(())
    }

    // ── RequestStopTransaction ─────────────────────────────

    pub fn request_stop(&self, transaction_id: &str) -> RequestStartStopStatusEnumType {
        let station = self.lifecycle.station();
        let found = station.read(|s| {
            s.evse_for_transaction(transaction_id)
                .and_then(|evse| s.transaction(evse).map(|tx| (evse, tx.is_charging())))
        });

        match found {
            None => {
                warn!(transaction_id, "Remote stop for unknown transaction");
                RequestStartStopStatusEnumType::Rejected
            }
            Some((evse_id, false)) => {
                info!(evse_id, transaction_id, "Remote stop ignored, not charging");
                RequestStartStopStatusEnumType::Accepted
            }
            Some((evse_id, true)) => {
                let lifecycle = self.lifecycle.clone();
                tokio::spawn(async move {
                    if let Err(e) = lifecycle
                        .stop_charging(evse_id, TriggerReasonEnumType::RemoteStop)
                        .await
                    {
                        warn!(evse_id, error = %e, "Remote stop not completed");
                    }
                });
                RequestStartStopStatusEnumType::Accepted
            }
        }
    }
}
