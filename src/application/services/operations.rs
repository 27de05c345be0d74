//! Station-level operations
//!
//! Boot handshake and heartbeat, operator actions that do not touch a
//! transaction, charging-profile management and the simulated firmware
//! and log workflows.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_ocpp::v2_0_1::datatypes::charging_profile_type::ChargingProfileType;
use rust_ocpp::v2_0_1::enumerations::authorization_status_enum_type::AuthorizationStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::firmware_status_enum_type::FirmwareStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::registration_status_enum_type::RegistrationStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::upload_log_status_enum_type::UploadLogStatusEnumType;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::recovery::RecoveryService;
use crate::application::station::Station;
use crate::domain::{ChargingProfile, DomainError};
use crate::support::errors::CallError;
use crate::support::shutdown::ShutdownSignal;

/// Simulated firmware update: delay before each status report.
const FIRMWARE_STEPS: [(u64, FirmwareStatusEnumType); 4] = [
    (2, FirmwareStatusEnumType::Downloading),
    (10, FirmwareStatusEnumType::Downloaded),
    (2, FirmwareStatusEnumType::Installing),
    (10, FirmwareStatusEnumType::Installed),
];

/// Simulated log upload: delay before each status report.
const LOG_UPLOAD_STEPS: [(u64, UploadLogStatusEnumType); 2] = [
    (1, UploadLogStatusEnumType::Uploading),
    (5, UploadLogStatusEnumType::Uploaded),
];

#[derive(Clone)]
pub struct OperationsService {
    station: Arc<Station>,
    recovery: RecoveryService,
    shutdown: ShutdownSignal,
    heartbeat: Arc<Mutex<Option<JoinHandle<()>>>>,
    notify_seq: Arc<AtomicU64>,
    event_id: Arc<AtomicU64>,
}

impl OperationsService {
    pub fn new(station: Arc<Station>, recovery: RecoveryService, shutdown: ShutdownSignal) -> Self {
        Self {
            station,
            recovery,
            shutdown,
            heartbeat: Arc::new(Mutex::new(None)),
            notify_seq: Arc::new(AtomicU64::new(0)),
            event_id: Arc::new(AtomicU64::new(0)),
        }
    }

    // ── Boot & heartbeat ───────────────────────────────────

    /// Register with the CSMS, retrying while it answers Pending or
    /// Rejected. Once accepted: heartbeat, status of every EVSE, then the
    /// re-announce of restored transactions.
    pub async fn boot(&self) -> Result<RegistrationStatusEnumType, CallError> {
        let sender = self.station.sender();
        loop {
            let response = sender
                .boot_notification(self.station.settings().charging_station_info())
                .await?;
            let interval = Duration::from_secs(u64::from(response.interval.max(1)));

            match response.status {
                RegistrationStatusEnumType::Accepted => {
                    self.station
                        .history()
                        .received("BootNotification Confirmed");
                    info!(interval_secs = interval.as_secs(), "Boot accepted");
                    self.start_heartbeat(interval);
                    self.announce_statuses().await;
                    self.recovery.reannounce().await;
                    return Ok(RegistrationStatusEnumType::Accepted);
                }
                status => {
                    warn!(?status, retry_secs = interval.as_secs(), "Boot not accepted, retrying");
                    self.station
                        .history()
                        .received(format!("BootNotification {:?}", status));
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {}
                        _ = self.shutdown.wait() => return Ok(status),
                    }
                }
            }
        }
    }

    /// StatusNotification for every EVSE, ascending.
    pub async fn announce_statuses(&self) {
        let statuses: Vec<_> = self
            .station
            .read(|s| s.evses.values().map(|e| (e.id, e.status)).collect());
        for (evse_id, status) in statuses {
            let _ = self
                .station
                .sender()
                .status_notification(evse_id, status)
                .await;
        }
    }

    /// (Re)start the heartbeat loop. It ends on shutdown.
    pub fn start_heartbeat(&self, interval: Duration) {
        let sender = self.station.sender().clone();
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = sender.heartbeat().await {
                            warn!(error = %e, "Heartbeat failed");
                        }
                    }
                }
            }
            debug!("Heartbeat loop stopped");
        });
        if let Some(previous) = self.heartbeat.lock().replace(handle) {
            previous.abort();
        }
    }

    pub async fn send_heartbeat(&self) -> Result<(), CallError> {
        self.station.sender().heartbeat().await.map(|_| ())
    }

    // ── Operator actions ───────────────────────────────────

    pub async fn authorize(
        &self,
        id_token: &str,
    ) -> Result<AuthorizationStatusEnumType, DomainError> {
        let status = self.station.sender().authorize(id_token).await?;
        info!(id_token, ?status, "Authorize answered");
        Ok(status)
    }

    /// Custom NotifyEvent. `seqNo` and `eventId` increase with every call.
    pub async fn notify_event(&self, event_type: &str, description: &str) -> Result<(), DomainError> {
        let seq_no = self.notify_seq.fetch_add(1, Ordering::SeqCst);
        let event_id = self.event_id.fetch_add(1, Ordering::SeqCst);
        self.station
            .sender()
            .notify_event(seq_no, event_id, event_type, description)
            .await?;
        Ok(())
    }

    // ── Charging profiles ──────────────────────────────────

    pub fn set_charging_profile(
        &self,
        evse_id: u32,
        profile: &ChargingProfileType,
    ) -> Result<(), DomainError> {
        if evse_id == 0 {
            return Err(DomainError::Validation(
                "station-wide charging profiles are not supported".into(),
            ));
        }
        let profile = ChargingProfile::from_request(evse_id, profile)?;
        let profile_id = profile.id;
        self.station.update(|s| s.set_profile(profile))?;
        self.station.persist();
        info!(evse_id, profile_id, "Charging profile installed");
        Ok(())
    }

    /// Stored profiles matching the criteria.
    pub fn charging_profiles(
        &self,
        evse_id: Option<u32>,
        profile_ids: Option<&[i32]>,
    ) -> Vec<ChargingProfile> {
        // evseId 0 asks for station-wide profiles, which are never stored
        if evse_id == Some(0) {
            return Vec::new();
        }
        self.station
            .read(|s| s.profiles_matching(evse_id, profile_ids))
    }

    /// Report profiles with one ReportChargingProfiles per EVSE.
    pub fn report_charging_profiles(&self, request_id: i32, profiles: Vec<ChargingProfile>) {
        let reports: Vec<(u32, ChargingProfileType)> = profiles
            .into_iter()
            .filter_map(|profile| match profile.received {
                Some(received) => Some((profile.evse_id, received)),
                None => {
                    warn!(profile_id = profile.id, "Stored profile has no received form, not reported");
                    None
                }
            })
            .collect();
        let sender = self.station.sender().clone();
        tokio::spawn(async move {
            let count = reports.len();
            for (i, (evse_id, profile)) in reports.into_iter().enumerate() {
                let tbc = i + 1 < count;
                if let Err(e) = sender
                    .report_charging_profiles(request_id, evse_id, vec![profile], tbc)
                    .await
                {
                    warn!(request_id, error = %e, "ReportChargingProfiles not delivered");
                }
            }
        });
    }

    /// Returns how many profiles were removed.
    pub fn clear_charging_profiles(&self, profile_id: Option<i32>, evse_id: Option<u32>) -> usize {
        let removed = self
            .station
            .update(|s| s.clear_profiles(profile_id, evse_id));
        if removed > 0 {
            self.station.persist();
            info!(?profile_id, ?evse_id, removed, "Charging profiles cleared");
        }
        removed
    }

    // ── Simulated long-running operations ──────────────────

    pub fn simulate_firmware_update(&self, request_id: i32) {
        let sender = self.station.sender().clone();
        tokio::spawn(async move {
            for (delay, status) in FIRMWARE_STEPS {
                tokio::time::sleep(Duration::from_secs(delay)).await;
                if let Err(e) = sender.firmware_status(status.clone(), request_id).await {
                    warn!(request_id, ?status, error = %e, "FirmwareStatusNotification not delivered");
                }
            }
            info!(request_id, "Firmware update simulation finished");
        });
    }

    pub fn simulate_log_upload(&self, request_id: i32) {
        let sender = self.station.sender().clone();
        tokio::spawn(async move {
            for (delay, status) in LOG_UPLOAD_STEPS {
                tokio::time::sleep(Duration::from_secs(delay)).await;
                if let Err(e) = sender.log_status(status.clone(), request_id).await {
                    warn!(request_id, ?status, error = %e, "LogStatusNotification not delivered");
                }
            }
            info!(request_id, "Log upload simulation finished");
        });
    }

    /// Stop the heartbeat loop.
    pub fn stop_heartbeat(&self) {
        if let Some(handle) = self.heartbeat.lock().take() {
            handle.abort();
        }
    }
}
