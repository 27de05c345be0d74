//! Charge point facade
//!
//! Wires the station context and its services together and exposes the
//! operations the REPL and the transport need. Inbound CSMS calls enter
//! through the [`InboundPort`] implementation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rust_ocpp::v2_0_1::enumerations::authorization_status_enum_type::AuthorizationStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::registration_status_enum_type::RegistrationStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::trigger_reason_enum_type::TriggerReasonEnumType;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::application::handlers::action_matcher;
use crate::application::ports::{CsmsPort, InboundPort};
use crate::application::sender::OcppSender;
use crate::application::services::{
    restore, LifecycleService, OperationsService, RecoveryService, RemoteControlService,
};
use crate::application::station::{Station, StationSettings};
use crate::domain::{DomainError, EvseStatus, StationState};
use crate::infrastructure::storage::StateStore;
use crate::support::errors::{CallError, HandlerError};
use crate::support::history::History;
use crate::support::shutdown::ShutdownSignal;

/// One line of the status report.
#[derive(Debug, Clone, PartialEq)]
pub struct EvseView {
    pub evse_id: u32,
    pub status: EvseStatus,
    pub transaction_id: Option<String>,
    pub charging: bool,
    pub energy: f64,
}

impl fmt::Display for EvseView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EVSE {}: {}", self.evse_id, self.status)?;
        if let Some(tx_id) = &self.transaction_id {
            let state = if self.charging { "Charging" } else { "Occupied" };
            write!(
                f,
                " (State: {}, TxId: {}, Energy: {:.3} Wh)",
                state, tx_id, self.energy
            )?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct ChargePoint {
    station: Arc<Station>,
    lifecycle: LifecycleService,
    remote: RemoteControlService,
    recovery: RecoveryService,
    operations: OperationsService,
    shutdown: ShutdownSignal,
}

impl ChargePoint {
    /// Build the charge point, restoring state from `store` when it holds
    /// a usable snapshot.
    pub fn new(
        settings: StationSettings,
        port: Arc<dyn CsmsPort>,
        store: Arc<dyn StateStore>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let (state, restored) = initial_state(store.as_ref(), settings.evse_count);
        let sender = OcppSender::new(port, Arc::new(History::new()));
        let station = Arc::new(Station::new(state, store, sender, settings));
        if restored {
            // Records dropped by recovery must not survive in the store.
            station.persist();
        }

        let lifecycle = LifecycleService::new(station.clone());
        let remote = RemoteControlService::new(lifecycle.clone());
        let recovery = RecoveryService::new(lifecycle.clone());
        let operations = OperationsService::new(station.clone(), recovery.clone(), shutdown.clone());

        Self {
            station,
            lifecycle,
            remote,
            recovery,
            operations,
            shutdown,
        }
    }

    pub fn station(&self) -> &Arc<Station> {
        &self.station
    }

    pub fn history(&self) -> &Arc<History> {
        self.station.history()
    }

    pub fn lifecycle(&self) -> &LifecycleService {
        &self.lifecycle
    }

    pub fn remote(&self) -> &RemoteControlService {
        &self.remote
    }

    pub fn recovery(&self) -> &RecoveryService {
        &self.recovery
    }

    pub fn operations(&self) -> &OperationsService {
        &self.operations
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    // ── Operator API ───────────────────────────────────────

    pub fn status(&self) -> Vec<EvseView> {
        self.station.read(|s| {
            s.evses
                .values()
                .map(|evse| {
                    let tx = s.transaction(evse.id);
                    EvseView {
                        evse_id: evse.id,
                        status: evse.status,
                        transaction_id: tx.map(|t| t.transaction_id.clone()),
                        charging: tx.is_some_and(|t| t.is_charging()),
                        energy: tx.map(|t| t.energy).unwrap_or_default(),
                    }
                })
                .collect()
        })
    }

    /// History lines, optionally only those containing `filter`
    /// (case-insensitive).
    pub fn history_lines(&self, filter: Option<&str>) -> Vec<String> {
        match filter {
            Some(term) => self.history().filtered(term),
            None => self.history().entries(),
        }
    }

    pub async fn boot(&self) -> Result<RegistrationStatusEnumType, CallError> {
        self.operations.boot().await
    }

    pub async fn connect(&self, evse_id: u32) -> Result<String, DomainError> {
        self.lifecycle.connect(evse_id).await
    }

    pub async fn charge(&self, evse_id: u32) -> Result<(), DomainError> {
        self.lifecycle.start_charging(evse_id).await
    }

    pub async fn stop_charge(&self, evse_id: u32) -> Result<(), DomainError> {
        self.lifecycle
            .stop_charging(evse_id, TriggerReasonEnumType::StopAuthorized)
            .await
    }

    pub async fn disconnect(&self, evse_id: u32) -> Result<(), DomainError> {
        self.lifecycle.disconnect(evse_id).await
    }

    pub async fn authorize(
        &self,
        id_token: &str,
    ) -> Result<AuthorizationStatusEnumType, DomainError> {
        self.operations.authorize(id_token).await
    }

    pub async fn notify_event(&self, event_type: &str, description: &str) -> Result<(), DomainError> {
        self.operations.notify_event(event_type, description).await
    }

    /// Flush state, signal shutdown and stop every background task.
    ///
    /// The snapshot is written while metering tasks are still registered,
    /// so charging transactions resume after the next start.
    pub async fn shutdown(&self) {
        self.station.persist();
        self.shutdown.trigger();
        self.operations.stop_heartbeat();
        self.station.cancel_all_meter_tasks().await;
        info!("Charge point stopped");
    }
}

/// Live state plus whether it came from a stored snapshot.
fn initial_state(store: &dyn StateStore, evse_count: u32) -> (StationState, bool) {
    match store.load() {
        Ok(Some(snapshot)) if !snapshot.evses.is_empty() => {
            let state = restore(snapshot);
            info!(
                evses = state.evses.len(),
                transactions = state.transactions.len(),
                "Station state restored"
            );
            (state, true)
        }
        Ok(Some(_)) => {
            warn!("Stored snapshot has no EVSEs, starting fresh");
            (StationState::fresh(evse_count), false)
        }
        Ok(None) => {
            debug!("No stored state, starting fresh");
            (StationState::fresh(evse_count), false)
        }
        Err(e) => {
            error!(error = %e, "Failed to load station state, starting fresh");
            (StationState::fresh(evse_count), false)
        }
    }
}

#[async_trait]
impl InboundPort for ChargePoint {
    async fn handle_call(&self, action: &str, payload: Value) -> Result<Value, HandlerError> {
        debug!(action, "Inbound call");
        action_matcher(self, action, &payload).await
    }
}
