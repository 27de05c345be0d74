//! Outbound message sender
//!
//! Typed front of [`CsmsPort`]: builds OCPP requests, records each one in
//! the history, logs rejections and tracks call latency.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_ocpp::v2_0_1::datatypes::charging_profile_type::ChargingProfileType;
use rust_ocpp::v2_0_1::datatypes::charging_station_type::ChargingStationType;
use rust_ocpp::v2_0_1::datatypes::component_type::ComponentType;
use rust_ocpp::v2_0_1::datatypes::event_data_type::EventDataType;
use rust_ocpp::v2_0_1::datatypes::evse_type::EVSEType;
use rust_ocpp::v2_0_1::datatypes::id_token_type::IdTokenType;
use rust_ocpp::v2_0_1::datatypes::meter_value_type::MeterValueType;
use rust_ocpp::v2_0_1::datatypes::sampled_value_type::SampledValueType;
use rust_ocpp::v2_0_1::datatypes::transaction_type::TransactionType;
use rust_ocpp::v2_0_1::datatypes::unit_of_measure_type::UnitOfMeasureType;
use rust_ocpp::v2_0_1::datatypes::variable_type::VariableType;
use rust_ocpp::v2_0_1::enumerations::authorization_status_enum_type::AuthorizationStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::boot_reason_enum_type::BootReasonEnumType;
use rust_ocpp::v2_0_1::enumerations::charging_limit_source_enum_type::ChargingLimitSourceEnumType;
use rust_ocpp::v2_0_1::enumerations::charging_state_enum_type::ChargingStateEnumType;
use rust_ocpp::v2_0_1::enumerations::connector_status_enum_type::ConnectorStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::event_notification_enum_type::EventNotificationEnumType;
use rust_ocpp::v2_0_1::enumerations::event_trigger_enum_type::EventTriggerEnumType;
use rust_ocpp::v2_0_1::enumerations::firmware_status_enum_type::FirmwareStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::id_token_enum_type::IdTokenEnumType;
use rust_ocpp::v2_0_1::enumerations::measurand_enum_type::MeasurandEnumType;
use rust_ocpp::v2_0_1::enumerations::reading_context_enum_type::ReadingContextEnumType;
use rust_ocpp::v2_0_1::enumerations::transaction_event_enum_type::TransactionEventEnumType;
use rust_ocpp::v2_0_1::enumerations::trigger_reason_enum_type::TriggerReasonEnumType;
use rust_ocpp::v2_0_1::enumerations::upload_log_status_enum_type::UploadLogStatusEnumType;
use rust_ocpp::v2_0_1::messages::authorize::AuthorizeRequest;
use rust_ocpp::v2_0_1::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use rust_ocpp::v2_0_1::messages::firmware_status_notification::FirmwareStatusNotificationRequest;
use rust_ocpp::v2_0_1::messages::heartbeat::{HeartbeatRequest, HeartbeatResponse};
use rust_ocpp::v2_0_1::messages::log_status_notification::LogStatusNotificationRequest;
use rust_ocpp::v2_0_1::messages::meter_values::MeterValuesRequest;
use rust_ocpp::v2_0_1::messages::notify_event::NotifyEventRequest;
use rust_ocpp::v2_0_1::messages::report_charging_profiles::ReportChargingProfilesRequest;
use rust_ocpp::v2_0_1::messages::status_notification::StatusNotificationRequest;
use rust_ocpp::v2_0_1::messages::transaction_event::{
    TransactionEventRequest, TransactionEventResponse,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::application::ports::CsmsPort;
use crate::domain::EvseStatus;
use crate::ocpp::OcppRequest;
use crate::support::errors::CallError;
use crate::support::history::History;

/// Record call latency and outcome.
fn record_call(action: &'static str, outcome: &'static str, start: Instant) {
    let duration = start.elapsed().as_secs_f64();
    metrics::histogram!("ocpp_call_latency_seconds", "action" => action).record(duration);
    metrics::counter!("ocpp_calls_total", "action" => action, "outcome" => outcome).increment(1);
}

/// OCPP integers are 32-bit; local counters saturate at the wire.
fn wire_int<T: TryInto<i32>>(value: T) -> i32 {
    value.try_into().unwrap_or(i32::MAX)
}

fn connector_status(status: EvseStatus) -> ConnectorStatusEnumType {
    match status {
        EvseStatus::Available => ConnectorStatusEnumType::Available,
        EvseStatus::Occupied => ConnectorStatusEnumType::Occupied,
        EvseStatus::Unavailable => ConnectorStatusEnumType::Unavailable,
        EvseStatus::Faulted => ConnectorStatusEnumType::Faulted,
    }
}

/// Periodic `Energy.Active.Import.Register` sample in Wh.
fn energy_reading(energy_wh: f64) -> MeterValueType {
    let value = Decimal::from_f64(energy_wh)
        .unwrap_or_default()
        .round_dp(3);
    MeterValueType {
        timestamp: Utc::now(),
        sampled_value: vec![SampledValueType {
            value,
            context: Some(ReadingContextEnumType::SamplePeriodic),
            measurand: Some(MeasurandEnumType::EnergyActiveImportRegister),
            unit_of_measure: Some(UnitOfMeasureType {
                unit: Some("Wh".into()),
                multiplier: None,
            }),
            ..Default::default()
        }],
    }
}

/// Everything a TransactionEvent may carry.
#[derive(Debug, Clone)]
pub struct TxEvent {
    pub event_type: TransactionEventEnumType,
    pub trigger: TriggerReasonEnumType,
    pub seq_no: u64,
    pub transaction_id: String,
    pub evse_id: u32,
    pub charging_state: Option<ChargingStateEnumType>,
    pub remote_start_id: Option<i64>,
    pub id_token: Option<String>,
    /// Cumulative energy reading in Wh
    pub energy: Option<f64>,
}

impl TxEvent {
    pub fn new(
        event_type: TransactionEventEnumType,
        trigger: TriggerReasonEnumType,
        seq_no: u64,
        transaction_id: impl Into<String>,
        evse_id: u32,
    ) -> Self {
        Self {
            event_type,
            trigger,
            seq_no,
            transaction_id: transaction_id.into(),
            evse_id,
            charging_state: None,
            remote_start_id: None,
            id_token: None,
            energy: None,
        }
    }

    pub fn charging_state(mut self, state: ChargingStateEnumType) -> Self {
        self.charging_state = Some(state);
        self
    }

    pub fn remote_start(mut self, remote_start_id: Option<i64>, id_token: Option<String>) -> Self {
        self.remote_start_id = remote_start_id;
        self.id_token = id_token;
        self
    }

    pub fn energy(mut self, energy: f64) -> Self {
        self.energy = Some(energy);
        self
    }

    fn into_request(self) -> TransactionEventRequest {
        TransactionEventRequest {
            event_type: self.event_type,
            timestamp: Utc::now(),
            trigger_reason: self.trigger,
            seq_no: wire_int(self.seq_no),
            transaction_info: TransactionType {
                transaction_id: self.transaction_id,
                charging_state: self.charging_state,
                remote_start_id: self.remote_start_id.map(wire_int),
                ..Default::default()
            },
            evse: Some(EVSEType {
                id: wire_int(self.evse_id),
                connector_id: Some(1),
            }),
            id_token: self.id_token.map(|token| IdTokenType {
                id_token: token,
                kind: IdTokenEnumType::Central,
                additional_info: None,
            }),
            meter_value: self.energy.map(|e| vec![energy_reading(e)]),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct OcppSender {
    port: Arc<dyn CsmsPort>,
    history: Arc<History>,
}

impl OcppSender {
    pub fn new(port: Arc<dyn CsmsPort>, history: Arc<History>) -> Self {
        Self { port, history }
    }

    pub fn history(&self) -> &Arc<History> {
        &self.history
    }

    /// Send a typed request and decode its response.
    pub async fn send<R: OcppRequest>(
        &self,
        request: &R,
        summary: &str,
    ) -> Result<R::Response, CallError> {
        let payload = serde_json::to_value(request)
            .map_err(|e| CallError::InvalidRequest(format!("{}: {}", R::ACTION, e)))?;

        if summary.is_empty() {
            self.history.sent(R::ACTION);
        } else {
            self.history.sent(format!("{} ({})", R::ACTION, summary));
        }
        debug!(action = R::ACTION, %payload, "Sending request");

        let start = Instant::now();
        let result = self.port.call(R::ACTION, payload).await;

        match result {
            Ok(value) => {
                record_call(R::ACTION, "accepted", start);
                decode::<R>(value)
            }
            Err(e) => {
                let outcome = if e.is_rejection() { "rejected" } else { "failed" };
                record_call(R::ACTION, outcome, start);
                if e.is_rejection() {
                    self.history.received(format!("{} rejected", R::ACTION));
                }
                warn!(action = R::ACTION, error = %e, "Request not applied");
                Err(e)
            }
        }
    }

    // ── Core messages ──────────────────────────────────────

    pub async fn boot_notification(
        &self,
        station: ChargingStationType,
    ) -> Result<BootNotificationResponse, CallError> {
        let request = BootNotificationRequest {
            reason: BootReasonEnumType::PowerUp,
            charging_station: station,
        };
        self.send(&request, "").await
    }

    pub async fn heartbeat(&self) -> Result<HeartbeatResponse, CallError> {
        self.send(&HeartbeatRequest {}, "").await
    }

    pub async fn status_notification(
        &self,
        evse_id: u32,
        status: EvseStatus,
    ) -> Result<(), CallError> {
        let request = StatusNotificationRequest {
            timestamp: Utc::now(),
            connector_status: connector_status(status),
            evse_id: wire_int(evse_id),
            connector_id: 1,
        };
        let summary = format!("EvseId: {}, Status: {}", evse_id, status);
        self.send(&request, &summary).await.map(|_| ())
    }

    pub async fn transaction_event(
        &self,
        event: TxEvent,
    ) -> Result<TransactionEventResponse, CallError> {
        let summary = format!(
            "Type: {:?}, Trigger: {:?}, Seq: {}, TxId: {}",
            event.event_type, event.trigger, event.seq_no, event.transaction_id
        );
        self.send(&event.into_request(), &summary).await
    }

    pub async fn meter_values(&self, evse_id: u32, energy: f64) -> Result<(), CallError> {
        let request = MeterValuesRequest {
            evse_id: wire_int(evse_id),
            meter_value: vec![energy_reading(energy)],
        };
        let summary = format!("EvseId: {}, Energy: {:.3} Wh", evse_id, energy);
        self.send(&request, &summary).await.map(|_| ())
    }

    // ── Auxiliary messages ─────────────────────────────────

    pub async fn authorize(&self, id_token: &str) -> Result<AuthorizationStatusEnumType, CallError> {
        let request = AuthorizeRequest {
            id_token: IdTokenType {
                id_token: id_token.to_string(),
                kind: IdTokenEnumType::ISO14443,
                additional_info: None,
            },
            ..Default::default()
        };
        let response = self
            .send(&request, &format!("IdToken: {}", id_token))
            .await?;
        let status = response.id_token_info.status;
        self.history
            .received(format!("Authorize Response ({:?})", status));
        Ok(status)
    }

    pub async fn notify_event(
        &self,
        seq_no: u64,
        event_id: u64,
        event_type: &str,
        description: &str,
    ) -> Result<(), CallError> {
        let now = Utc::now();
        let request = NotifyEventRequest {
            generated_at: now,
            tbc: None,
            seq_no: wire_int(seq_no),
            event_data: vec![EventDataType {
                event_id: wire_int(event_id),
                timestamp: now,
                trigger: EventTriggerEnumType::Delta,
                actual_value: description.to_string(),
                event_notification_type: EventNotificationEnumType::CustomMonitor,
                component: ComponentType {
                    name: "CustomEvent".into(),
                    ..Default::default()
                },
                variable: VariableType {
                    name: event_type.to_string(),
                    instance: None,
                },
                ..Default::default()
            }],
        };
        self.send(&request, &format!("Type: {}", event_type))
            .await
            .map(|_| ())
    }

    pub async fn firmware_status(
        &self,
        status: FirmwareStatusEnumType,
        request_id: i32,
    ) -> Result<(), CallError> {
        let summary = format!("Status: {:?}", status);
        let request = FirmwareStatusNotificationRequest {
            status,
            request_id: Some(request_id),
        };
        self.send(&request, &summary).await.map(|_| ())
    }

    pub async fn log_status(
        &self,
        status: UploadLogStatusEnumType,
        request_id: i32,
    ) -> Result<(), CallError> {
        let summary = format!("Status: {:?}", status);
        let request = LogStatusNotificationRequest {
            status,
            request_id: Some(request_id),
        };
        self.send(&request, &summary).await.map(|_| ())
    }

    pub async fn report_charging_profiles(
        &self,
        request_id: i32,
        evse_id: u32,
        profiles: Vec<ChargingProfileType>,
        tbc: bool,
    ) -> Result<(), CallError> {
        let request = ReportChargingProfilesRequest {
            request_id,
            charging_limit_source: ChargingLimitSourceEnumType::CSO,
            tbc: Some(tbc),
            evse_id: wire_int(evse_id),
            charging_profile: profiles,
        };
        self.send(&request, &format!("EvseId: {}", evse_id))
            .await
            .map(|_| ())
    }
}

fn decode<R: OcppRequest>(value: Value) -> Result<R::Response, CallError> {
    // Some CSMS answer `null` for empty confirmations.
    let value = if value.is_null() {
        Value::Object(Default::default())
    } else {
        value
    };
    serde_json::from_value(value)
        .map_err(|e| CallError::InvalidResponse(format!("{}: {}", R::ACTION, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::mock::MockCsms;

    fn sender() -> (Arc<MockCsms>, OcppSender) {
        let csms = Arc::new(MockCsms::new());
        let sender = OcppSender::new(csms.clone(), Arc::new(History::new()));
        (csms, sender)
    }

    #[tokio::test]
    async fn status_notification_uses_connector_one() {
        let (csms, sender) = sender();
        sender
            .status_notification(2, EvseStatus::Occupied)
            .await
            .unwrap();
        let payload = &csms.calls_for("StatusNotification")[0];
        assert_eq!(payload["evseId"], 2);
        assert_eq!(payload["connectorId"], 1);
        assert_eq!(payload["connectorStatus"], "Occupied");
        assert!(sender.history().entries()[0].contains(">> StatusNotification"));
    }

    #[tokio::test]
    async fn transaction_event_carries_reading() {
        let (csms, sender) = sender();
        let event = TxEvent::new(
            TransactionEventEnumType::Updated,
            TriggerReasonEnumType::MeterValuePeriodic,
            2,
            "tx-1",
            1,
        )
        .energy(27.775);
        sender.transaction_event(event).await.unwrap();

        let payload = &csms.events_for("tx-1")[0];
        assert_eq!(payload["seqNo"], 2);
        assert_eq!(payload["triggerReason"], "MeterValuePeriodic");
        assert_eq!(payload["evse"]["connectorId"], 1);
        let sample = &payload["meterValue"][0]["sampledValue"][0];
        assert_eq!(sample["value"], 27.775);
        assert_eq!(sample["context"], "Sample.Periodic");
        assert_eq!(sample["measurand"], "Energy.Active.Import.Register");
        assert_eq!(sample["unitOfMeasure"]["unit"], "Wh");
    }

    #[tokio::test]
    async fn rejection_is_recorded_and_returned() {
        let (csms, sender) = sender();
        csms.reject_event("Started");
        let event = TxEvent::new(
            TransactionEventEnumType::Started,
            TriggerReasonEnumType::CablePluggedIn,
            0,
            "tx-1",
            1,
        );
        let err = sender.transaction_event(event).await.unwrap_err();
        assert!(err.is_rejection());
        assert!(sender
            .history()
            .entries()
            .iter()
            .any(|e| e.contains("<< TransactionEvent rejected")));
    }

    #[tokio::test]
    async fn malformed_response_is_invalid() {
        let (csms, sender) = sender();
        csms.set_boot_status("Bogus");
        let err = sender
            .boot_notification(ChargingStationType {
                model: "M".into(),
                vendor_name: "V".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn authorize_reports_status() {
        let (csms, sender) = sender();
        let status = sender.authorize("CARD01").await.unwrap();
        assert_eq!(status, AuthorizationStatusEnumType::Accepted);
        assert_eq!(csms.calls_for("Authorize")[0]["idToken"]["type"], "ISO14443");
    }

    #[test]
    fn counters_saturate_at_wire_width() {
        assert_eq!(wire_int(7u64), 7);
        assert_eq!(wire_int(u64::MAX), i32::MAX);
    }
}
