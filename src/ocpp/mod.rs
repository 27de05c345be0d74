//! OCPP 2.0.1 outbound actions
//!
//! Payloads are the `rust_ocpp::v2_0_1` message types. [`OcppRequest`]
//! ties each charging-station-initiated request to its action name and
//! response type, so the sender can derive both from the request.

use serde::de::DeserializeOwned;
use serde::Serialize;

use rust_ocpp::v2_0_1::messages::authorize::{AuthorizeRequest, AuthorizeResponse};
use rust_ocpp::v2_0_1::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use rust_ocpp::v2_0_1::messages::firmware_status_notification::{
    FirmwareStatusNotificationRequest, FirmwareStatusNotificationResponse,
};
use rust_ocpp::v2_0_1::messages::heartbeat::{HeartbeatRequest, HeartbeatResponse};
use rust_ocpp::v2_0_1::messages::log_status_notification::{
    LogStatusNotificationRequest, LogStatusNotificationResponse,
};
use rust_ocpp::v2_0_1::messages::meter_values::{MeterValuesRequest, MeterValuesResponse};
use rust_ocpp::v2_0_1::messages::notify_event::{NotifyEventRequest, NotifyEventResponse};
use rust_ocpp::v2_0_1::messages::report_charging_profiles::{
    ReportChargingProfilesRequest, ReportChargingProfilesResponse,
};
use rust_ocpp::v2_0_1::messages::status_notification::{
    StatusNotificationRequest, StatusNotificationResponse,
};
use rust_ocpp::v2_0_1::messages::transaction_event::{
    TransactionEventRequest, TransactionEventResponse,
};

/// A request the charging station sends to the CSMS.
pub trait OcppRequest: Serialize {
    const ACTION: &'static str;
    type Response: DeserializeOwned;
}

macro_rules! ocpp_request {
    ($($request:ty => $response:ty, $action:literal;)+) => {
        $(
            impl OcppRequest for $request {
                const ACTION: &'static str = $action;
                type Response = $response;
            }
        )+
    };
}

ocpp_request! {
    BootNotificationRequest => BootNotificationResponse, "BootNotification";
    HeartbeatRequest => HeartbeatResponse, "Heartbeat";
    StatusNotificationRequest => StatusNotificationResponse, "StatusNotification";
    AuthorizeRequest => AuthorizeResponse, "Authorize";
    TransactionEventRequest => TransactionEventResponse, "TransactionEvent";
    MeterValuesRequest => MeterValuesResponse, "MeterValues";
    NotifyEventRequest => NotifyEventResponse, "NotifyEvent";
    FirmwareStatusNotificationRequest => FirmwareStatusNotificationResponse, "FirmwareStatusNotification";
    LogStatusNotificationRequest => LogStatusNotificationResponse, "LogStatusNotification";
    ReportChargingProfilesRequest => ReportChargingProfilesResponse, "ReportChargingProfiles";
}
