//! GetChargingProfiles handler

use rust_ocpp::v2_0_1::enumerations::get_charging_profile_status_enum_type::GetChargingProfileStatusEnumType;
use rust_ocpp::v2_0_1::messages::get_charging_profiles::{
    GetChargingProfilesRequest, GetChargingProfilesResponse,
};
use serde_json::Value;
use tracing::info;

use super::{parse, respond};
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_get_charging_profiles(
    cp: &ChargePoint,
    payload: &Value,
) -> Result<Value, HandlerError> {
    let req: GetChargingProfilesRequest = parse("GetChargingProfiles", payload)?;
    info!(request_id = req.request_id, evse_id = ?req.evse_id, "GetChargingProfiles");
    cp.history().received(format!(
        "GetChargingProfiles (RequestId: {})",
        req.request_id
    ));

    // A negative evseId can match nothing.
    let profiles = match req.evse_id.map(u32::try_from).transpose() {
        Ok(evse_id) => cp.operations().charging_profiles(
            evse_id,
            req.charging_profile.charging_profile_id.as_deref(),
        ),
        Err(_) => Vec::new(),
    };

    let status = if profiles.is_empty() {
        GetChargingProfileStatusEnumType::NoProfiles
    } else {
        cp.operations()
            .report_charging_profiles(req.request_id, profiles);
        GetChargingProfileStatusEnumType::Accepted
    };

    respond(&GetChargingProfilesResponse {
        status,
        status_info: None,
    })
}
