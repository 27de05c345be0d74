//! Shared station context
//!
//! Owns the live [`StationState`] together with everything the services
//! need to act on it: the snapshot store, the outbound sender, the history
//! and the registry of running metering tasks.
//!
//! The state mutex is only taken inside the synchronous closures passed to
//! [`Station::read`] and [`Station::update`]; it is never held across an
//! `.await`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_ocpp::v2_0_1::datatypes::charging_station_type::ChargingStationType;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::application::sender::OcppSender;
use crate::domain::{MeterTaskId, StationState};
use crate::infrastructure::storage::StateStore;
use crate::support::history::History;

/// Static identity and tuning of the simulated station.
#[derive(Debug, Clone)]
pub struct StationSettings {
    pub station_id: String,
    pub vendor: String,
    pub model: String,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub evse_count: u32,
    pub meter_interval: Duration,
}

impl StationSettings {
    pub fn charging_station_info(&self) -> ChargingStationType {
        ChargingStationType {
            model: self.model.clone(),
            vendor_name: self.vendor.clone(),
            serial_number: self.serial_number.clone(),
            firmware_version: self.firmware_version.clone(),
            modem: None,
        }
    }
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            station_id: "CP001".into(),
            vendor: "AcmeCorp".into(),
            model: "ModelX".into(),
            serial_number: None,
            firmware_version: None,
            evse_count: 2,
            meter_interval: Duration::from_secs(10),
        }
    }
}

/// Held by a metering task from claiming a seqNo until both of its sends
/// are done.
pub(crate) type TickLock = Arc<AsyncMutex<()>>;

struct MeterTask {
    handle: JoinHandle<()>,
    tick: TickLock,
}

pub struct Station {
    state: Mutex<StationState>,
    store: Arc<dyn StateStore>,
    sender: OcppSender,
    settings: StationSettings,
    meter_tasks: Mutex<HashMap<MeterTaskId, MeterTask>>,
}

impl Station {
    pub fn new(
        state: StationState,
        store: Arc<dyn StateStore>,
        sender: OcppSender,
        settings: StationSettings,
    ) -> Self {
        Self {
            state: Mutex::new(state),
            store,
            sender,
            settings,
            meter_tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &StationSettings {
        &self.settings
    }

    pub fn sender(&self) -> &OcppSender {
        &self.sender
    }

    pub fn history(&self) -> &Arc<History> {
        self.sender.history()
    }

    // ── State access ───────────────────────────────────────

    pub fn read<T>(&self, f: impl FnOnce(&StationState) -> T) -> T {
        f(&self.state.lock())
    }

    pub fn update<T>(&self, f: impl FnOnce(&mut StationState) -> T) -> T {
        f(&mut self.state.lock())
    }

    /// Clone of the live state.
    pub fn state(&self) -> StationState {
        self.state.lock().clone()
    }

    /// Save the current state. Failures are logged, never propagated.
    pub fn persist(&self) {
        let snapshot = self.read(StationState::to_snapshot);
        if let Err(e) = self.store.save(&snapshot) {
            error!(error = %e, "Failed to persist station state");
        }
    }

    // ── Metering task registry ─────────────────────────────

    pub(crate) fn register_meter_task(
        &self,
        id: MeterTaskId,
        handle: JoinHandle<()>,
        tick: TickLock,
    ) {
        if handle.is_finished() {
            return;
        }
        self.meter_tasks.lock().insert(id, MeterTask { handle, tick });
    }

    /// Called by a metering task that ends on its own.
    pub(crate) fn release_meter_task(&self, id: MeterTaskId) {
        self.meter_tasks.lock().remove(&id);
    }

    /// Abort the task and wait until it is gone.
    /// Stop a metering task. A tick already in flight is allowed to finish,
    /// so its seqNo is never skipped.
    pub async fn cancel_meter_task(&self, id: MeterTaskId) {
        let task = self.meter_tasks.lock().remove(&id);
        if let Some(task) = task {
            let _tick = task.tick.lock().await;
            task.handle.abort();
            let _ = task.handle.await;
            debug!(task = %id, "Metering task cancelled");
        }
    }

    /// Abort every metering task, e.g. on shutdown.
    pub async fn cancel_all_meter_tasks(&self) {
        let tasks: Vec<_> = self.meter_tasks.lock().drain().collect();
        for (id, task) in tasks {
            task.handle.abort();
            let _ = task.handle.await;
            debug!(task = %id, "Metering task cancelled");
        }
    }

    pub fn running_meter_tasks(&self) -> usize {
        self.meter_tasks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::mock::MockCsms;
    use crate::domain::EvseStatus;
    use crate::infrastructure::storage::InMemoryStore;

    fn station(store: Arc<InMemoryStore>) -> Station {
        let sender = OcppSender::new(Arc::new(MockCsms::new()), Arc::new(History::new()));
        Station::new(
            StationState::fresh(2),
            store,
            sender,
            StationSettings::default(),
        )
    }

    #[test]
    fn persist_writes_current_state() {
        let store = Arc::new(InMemoryStore::new());
        let station = station(store.clone());
        station.update(|s| s.set_status(2, EvseStatus::Faulted)).unwrap();
        station.persist();
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.evses[&2].status, EvseStatus::Faulted);
    }

    #[tokio::test]
    async fn cancel_waits_for_task() {
        let station = station(Arc::new(InMemoryStore::new()));
        let id = station.update(|s| s.allocate_meter_task());
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        station.register_meter_task(id, handle, TickLock::default());
        assert_eq!(station.running_meter_tasks(), 1);

        station.cancel_meter_task(id).await;
        assert_eq!(station.running_meter_tasks(), 0);
    }
}
