//! Transaction lifecycle
//!
//! Per-EVSE state machine:
//!
//! ```text
//! Available --connect--> Occupied --start_charging--> Charging
//!     ^                     ^  |                          |
//!     +-----disconnect------+  +<------stop_charging------+
//! ```
//!
//! plus the remote-start placeholder, which becomes charging once a
//! vehicle is connected. Every sequence that suspends on the CSMS re-checks
//! the record afterwards before committing anything.

use std::sync::Arc;

use rust_ocpp::v2_0_1::enumerations::charging_state_enum_type::ChargingStateEnumType;
use rust_ocpp::v2_0_1::enumerations::transaction_event_enum_type::TransactionEventEnumType;
use rust_ocpp::v2_0_1::enumerations::trigger_reason_enum_type::TriggerReasonEnumType;
use tracing::{debug, info, warn};

use crate::application::sender::TxEvent;
use crate::application::station::{Station, TickLock};
use crate::domain::{DomainError, EvseStatus, MeterState, MeterTaskId, Transaction};

enum ConnectPlan {
    Fresh(Transaction),
    AdoptPlaceholder {
        transaction_id: String,
        seq_no: u64,
        remote_start_id: Option<i64>,
        id_token: Option<String>,
    },
}

#[derive(Clone)]
pub struct LifecycleService {
    station: Arc<Station>,
}

impl LifecycleService {
    pub fn new(station: Arc<Station>) -> Self {
        Self { station }
    }

    pub fn station(&self) -> &Arc<Station> {
        &self.station
    }

    // ── Connect ────────────────────────────────────────────

    /// Plug a vehicle into `evse_id`. Returns the transaction id.
    pub async fn connect(&self, evse_id: u32) -> Result<String, DomainError> {
        let plan = self.station.update(|s| {
            let status = s.status(evse_id)?;
            match s.transaction_mut(evse_id) {
                Some(tx) if tx.pending_remote_start => Ok(ConnectPlan::AdoptPlaceholder {
                    transaction_id: tx.transaction_id.clone(),
                    seq_no: tx.next_seq(),
                    remote_start_id: tx.remote_start_id,
                    id_token: tx.id_token.clone(),
                }),
                Some(_) => Err(DomainError::InvalidEvseState { evse_id, status }),
                None if status != EvseStatus::Available => {
                    Err(DomainError::InvalidEvseState { evse_id, status })
                }
                None => {
                    s.set_status(evse_id, EvseStatus::Occupied)?;
                    Ok(ConnectPlan::Fresh(Transaction::new(evse_id)))
                }
            }
        })?;

        match plan {
            ConnectPlan::Fresh(tx) => self.connect_fresh(tx).await,
            ConnectPlan::AdoptPlaceholder {
                transaction_id,
                seq_no,
                remote_start_id,
                id_token,
            } => {
                self.adopt_placeholder(evse_id, transaction_id, seq_no, remote_start_id, id_token)
                    .await
            }
        }
    }

    async fn connect_fresh(&self, tx: Transaction) -> Result<String, DomainError> {
        let evse_id = tx.evse_id;
        let transaction_id = tx.transaction_id.clone();
        let sender = self.station.sender();

        self.station
            .history()
            .record(format!("EVSE {} connected", evse_id));
        let _ = sender.status_notification(evse_id, EvseStatus::Occupied).await;

        let event = TxEvent::new(
            TransactionEventEnumType::Started,
            TriggerReasonEnumType::CablePluggedIn,
            0,
            &transaction_id,
            evse_id,
        )
        .charging_state(ChargingStateEnumType::EVConnected);

        if let Err(e) = sender.transaction_event(event).await {
            warn!(evse_id, transaction_id = %transaction_id, error = %e, "Transaction start not applied, rolling back");
            let rolled_back = self.station.update(|s| {
                let untouched = s.transaction(evse_id).is_none()
                    && s.status(evse_id).ok() == Some(EvseStatus::Occupied);
                if untouched {
                    let _ = s.set_status(evse_id, EvseStatus::Available);
                }
                untouched
            });
            if rolled_back {
                let _ = sender
                    .status_notification(evse_id, EvseStatus::Available)
                    .await;
            }
            return Err(e.into());
        }

        let committed = self.station.update(|s| {
            let still_ours = s.transaction(evse_id).is_none()
                && s.status(evse_id).ok() == Some(EvseStatus::Occupied);
            if still_ours {
                s.transactions.insert(evse_id, tx);
            }
            still_ours
        });
        if !committed {
            warn!(evse_id, transaction_id = %transaction_id, "EVSE changed while starting transaction");
            return Err(DomainError::Conflict(format!(
                "EVSE {} changed while the transaction was starting",
                evse_id
            )));
        }

        self.station.persist();
        info!(evse_id, transaction_id = %transaction_id, "Transaction started");
        Ok(transaction_id)
    }

    async fn adopt_placeholder(
        &self,
        evse_id: u32,
        transaction_id: String,
        seq_no: u64,
        remote_start_id: Option<i64>,
        id_token: Option<String>,
    ) -> Result<String, DomainError> {
        self.station
            .history()
            .record(format!("EVSE {} connected (remote start pending)", evse_id));

        let event = TxEvent::new(
            TransactionEventEnumType::Updated,
            TriggerReasonEnumType::CablePluggedIn,
            seq_no,
            &transaction_id,
            evse_id,
        )
        .charging_state(ChargingStateEnumType::Charging)
        .remote_start(remote_start_id, id_token);
        self.station.sender().transaction_event(event).await?;

        self.start_metering(evse_id, &transaction_id, true)?;
        self.mark_remote_charging(evse_id, &transaction_id).await;
        self.station.persist();
        info!(evse_id, transaction_id = %transaction_id, "Remote start completed by vehicle");
        Ok(transaction_id)
    }

    /// An EVSE charging because of a remote start reports `Unavailable`.
    pub(crate) async fn mark_remote_charging(&self, evse_id: u32, transaction_id: &str) {
        let marked = self.station.update(|s| {
            let ours = s.holds(evse_id, transaction_id);
            if ours {
                let _ = s.set_status(evse_id, EvseStatus::Unavailable);
            }
            ours
        });
        if marked {
            let _ = self
                .station
                .sender()
                .status_notification(evse_id, EvseStatus::Unavailable)
                .await;
        }
    }

    // ── Start / stop charging ──────────────────────────────

    pub async fn start_charging(&self, evse_id: u32) -> Result<(), DomainError> {
        let (transaction_id, seq_no) = self.station.update(|s| {
            s.evse(evse_id)?;
            let tx = s
                .transaction_mut(evse_id)
                .ok_or(DomainError::NoTransaction(evse_id))?;
            if tx.pending_remote_start {
                return Err(DomainError::AwaitingVehicle(evse_id));
            }
            if tx.is_charging() {
                return Err(DomainError::AlreadyCharging(evse_id));
            }
            Ok((tx.transaction_id.clone(), tx.next_seq()))
        })?;

        let event = TxEvent::new(
            TransactionEventEnumType::Updated,
            TriggerReasonEnumType::ChargingStateChanged,
            seq_no,
            &transaction_id,
            evse_id,
        )
        .charging_state(ChargingStateEnumType::Charging);
        self.station.sender().transaction_event(event).await?;

        self.start_metering(evse_id, &transaction_id, false)?;
        self.station.persist();
        info!(evse_id, transaction_id = %transaction_id, "Charging started");
        Ok(())
    }

    /// Stop metering and report the vehicle as connected but idle.
    pub async fn stop_charging(
        &self,
        evse_id: u32,
        trigger: TriggerReasonEnumType,
    ) -> Result<(), DomainError> {
        let (transaction_id, task) = self.station.update(|s| {
            s.evse(evse_id)?;
            let tx = s
                .transaction_mut(evse_id)
                .ok_or(DomainError::NoTransaction(evse_id))?;
            let task = match tx.meter {
                MeterState::Running(id) => Some(id),
                MeterState::Suspended => None,
                MeterState::Idle => return Err(DomainError::NotCharging(evse_id)),
            };
            tx.meter = MeterState::Idle;
            Ok((tx.transaction_id.clone(), task))
        })?;

        if let Some(task) = task {
            self.station.cancel_meter_task(task).await;
        }

        let seq_no = self
            .station
            .update(|s| {
                s.transaction_mut(evse_id)
                    .filter(|tx| tx.transaction_id == transaction_id)
                    .map(Transaction::next_seq)
            })
            .ok_or_else(|| {
                DomainError::Conflict(format!("Transaction on EVSE {} ended meanwhile", evse_id))
            })?;

        let sender = self.station.sender();
        let event = TxEvent::new(
            TransactionEventEnumType::Updated,
            trigger.clone(),
            seq_no,
            &transaction_id,
            evse_id,
        )
        .charging_state(ChargingStateEnumType::EVConnected);
        if let Err(e) = sender.transaction_event(event).await {
            warn!(evse_id, transaction_id = %transaction_id, error = %e, "Stop event not applied");
        }

        let still_ours = self.station.update(|s| {
            let ours = s.holds(evse_id, &transaction_id);
            if ours {
                let _ = s.set_status(evse_id, EvseStatus::Occupied);
            }
            ours
        });
        if still_ours {
            let _ = sender.status_notification(evse_id, EvseStatus::Occupied).await;
        }
        self.station.persist();
        info!(evse_id, transaction_id = %transaction_id, trigger = ?trigger, "Charging stopped");
        Ok(())
    }

    // ── Disconnect ─────────────────────────────────────────

    /// Unplug the vehicle. Ends any transaction; always leaves the EVSE
    /// Available and sends exactly one StatusNotification.
    pub async fn disconnect(&self, evse_id: u32) -> Result<(), DomainError> {
        let removed = self.station.update(|s| {
            s.evse(evse_id)?;
            Ok::<_, DomainError>(s.transactions.remove(&evse_id))
        })?;

        let sender = self.station.sender();
        if let Some(mut tx) = removed {
            if let Some(task) = tx.meter_task() {
                self.station.cancel_meter_task(task).await;
            }
            let seq_no = tx.next_seq();
            let event = TxEvent::new(
                TransactionEventEnumType::Ended,
                TriggerReasonEnumType::EVDeparted,
                seq_no,
                &tx.transaction_id,
                evse_id,
            )
            .energy(tx.energy);
            if let Err(e) = sender.transaction_event(event).await {
                warn!(evse_id, transaction_id = %tx.transaction_id, error = %e, "Transaction end not applied");
            }
            info!(evse_id, transaction_id = %tx.transaction_id, energy = tx.energy, "Transaction ended");
        } else {
            debug!(evse_id, "Disconnect without transaction");
        }

        self.station
            .update(|s| s.set_status(evse_id, EvseStatus::Available))?;
        self.station
            .history()
            .record(format!("EVSE {} disconnected", evse_id));
        let _ = sender
            .status_notification(evse_id, EvseStatus::Available)
            .await;
        self.station.persist();
        Ok(())
    }

    // ── Metering ───────────────────────────────────────────

    /// Attach a fresh metering task to the transaction on `evse_id`, if it
    /// is still `transaction_id` and has none running.
    pub(crate) fn start_metering(
        &self,
        evse_id: u32,
        transaction_id: &str,
        clear_pending: bool,
    ) -> Result<MeterTaskId, DomainError> {
        let task_id = self.station.update(|s| {
            if !s.holds(evse_id, transaction_id) {
                return None;
            }
            let task_id = s.allocate_meter_task();
            let tx = s.transaction_mut(evse_id)?;
            if matches!(tx.meter, MeterState::Running(_)) {
                return None;
            }
            tx.meter = MeterState::Running(task_id);
            if clear_pending {
                tx.pending_remote_start = false;
            }
            Some(task_id)
        });
        let task_id = task_id.ok_or_else(|| {
            DomainError::Conflict(format!(
                "Transaction on EVSE {} changed before metering started",
                evse_id
            ))
        })?;

        let tick = TickLock::default();
        let handle = tokio::spawn(self.clone().meter_loop(
            evse_id,
            transaction_id.to_string(),
            task_id,
            tick.clone(),
        ));
        self.station.register_meter_task(task_id, handle, tick);
        debug!(evse_id, transaction_id, task = %task_id, "Metering started");
        Ok(task_id)
    }

    async fn meter_loop(
        self,
        evse_id: u32,
        transaction_id: String,
        task_id: MeterTaskId,
        tick: TickLock,
    ) {
        let interval = self.station.settings().meter_interval;
        let interval_secs = interval.as_secs_f64();
        let sender = self.station.sender().clone();

        loop {
            tokio::time::sleep(interval).await;
            let _tick = tick.lock().await;

            let reading = self.station.update(|s| {
                let tx = s.transaction(evse_id)?;
                if tx.transaction_id != transaction_id || tx.meter != MeterState::Running(task_id)
                {
                    return None;
                }
                let power = s.power_limit(evse_id);
                let tx = s.transaction_mut(evse_id)?;
                let energy = tx.accumulate(power, interval_secs);
                Some((tx.next_seq(), energy))
            });
            let Some((seq_no, energy)) = reading else {
                debug!(evse_id, task = %task_id, "Metering task superseded");
                break;
            };

            if let Err(e) = sender.meter_values(evse_id, energy).await {
                warn!(evse_id, error = %e, "MeterValues not delivered");
            }

            let event = TxEvent::new(
                TransactionEventEnumType::Updated,
                TriggerReasonEnumType::MeterValuePeriodic,
                seq_no,
                &transaction_id,
                evse_id,
            )
            .charging_state(ChargingStateEnumType::Charging)
            .energy(energy);

            match sender.transaction_event(event).await {
                Ok(_) => {}
                Err(e) if e.is_rejection() => {
                    warn!(evse_id, transaction_id = %transaction_id, "CSMS rejected meter update, dropping transaction");
                    self.drop_rejected(evse_id, &transaction_id, Some(task_id))
                        .await;
                    break;
                }
                Err(e) => {
                    warn!(evse_id, transaction_id = %transaction_id, error = %e, "Meter update not delivered");
                }
            }
        }

        self.station.release_meter_task(task_id);
    }

    /// Discard a transaction the CSMS refused. With `task` set, only if
    /// that metering task still owns the record.
    pub(crate) async fn drop_rejected(
        &self,
        evse_id: u32,
        transaction_id: &str,
        task: Option<MeterTaskId>,
    ) {
        let dropped = self.station.update(|s| {
            let owned = s.transaction(evse_id).is_some_and(|tx| {
                tx.transaction_id == transaction_id
                    && task.map_or(true, |id| tx.meter == MeterState::Running(id))
            });
            if owned {
                s.transactions.remove(&evse_id);
                let _ = s.set_status(evse_id, EvseStatus::Available);
            }
            owned
        });
        if dropped {
            self.station
                .history()
                .record(format!("Transaction {} dropped", transaction_id));
            let _ = self
                .station
                .sender()
                .status_notification(evse_id, EvseStatus::Available)
                .await;
            self.station.persist();
        }
    }
}
