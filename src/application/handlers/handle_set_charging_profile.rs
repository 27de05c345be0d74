//! SetChargingProfile handler

use rust_ocpp::v2_0_1::enumerations::charging_profile_status_enum_type::ChargingProfileStatusEnumType;
use rust_ocpp::v2_0_1::messages::set_charging_profile::{
    SetChargingProfileRequest, SetChargingProfileResponse,
};
use serde_json::Value;
use tracing::{info, warn};

use super::respond;
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_set_charging_profile(
    cp: &ChargePoint,
    payload: &Value,
) -> Result<Value, HandlerError> {
    // A profile the station cannot read is refused, not a format violation.
    let req: SetChargingProfileRequest = match serde_json::from_value(payload.clone()) {
        Ok(req) => req,
        Err(e) => {
            warn!(error = %e, "Malformed charging profile");
            cp.history().received("SetChargingProfile (malformed)");
            return rejected();
        }
    };
    info!(
        evse_id = req.evse_id,
        profile_id = req.charging_profile.id,
        "SetChargingProfile"
    );
    cp.history().received(format!(
        "SetChargingProfile (EvseId: {}, ProfileId: {})",
        req.evse_id, req.charging_profile.id
    ));

    let Ok(evse_id) = u32::try_from(req.evse_id) else {
        warn!(evse_id = req.evse_id, "Charging profile for invalid EVSE");
        return rejected();
    };

    match cp
        .operations()
        .set_charging_profile(evse_id, &req.charging_profile)
    {
        Ok(()) => respond(&SetChargingProfileResponse {
            status: ChargingProfileStatusEnumType::Accepted,
            status_info: None,
        }),
        Err(e) => {
            warn!(evse_id, error = %e, "Charging profile rejected");
            rejected()
        }
    }
}

fn rejected() -> Result<Value, HandlerError> {
    respond(&SetChargingProfileResponse {
        status: ChargingProfileStatusEnumType::Rejected,
        status_info: None,
    })
}
