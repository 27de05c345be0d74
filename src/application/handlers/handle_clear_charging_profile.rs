//! ClearChargingProfile handler

use rust_ocpp::v2_0_1::enumerations::clear_charging_profile_status_enum_type::ClearChargingProfileStatusEnumType;
use rust_ocpp::v2_0_1::messages::clear_charging_profile::{
    ClearChargingProfileRequest, ClearChargingProfileResponse,
};
use serde_json::Value;
use tracing::info;

use super::{parse, respond};
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_clear_charging_profile(
    cp: &ChargePoint,
    payload: &Value,
) -> Result<Value, HandlerError> {
    let req: ClearChargingProfileRequest = parse("ClearChargingProfile", payload)?;
    let evse_id = req
        .charging_profile_criteria
        .as_ref()
        .and_then(|c| c.evse_id);
    info!(profile_id = ?req.charging_profile_id, ?evse_id, "ClearChargingProfile");
    cp.history().received("ClearChargingProfile");

    // A negative evseId must not widen into "all EVSEs".
    let removed = match evse_id.map(u32::try_from).transpose() {
        Ok(evse_id) => cp
            .operations()
            .clear_charging_profiles(req.charging_profile_id, evse_id),
        Err(_) => 0,
    };

    let status = if removed > 0 {
        ClearChargingProfileStatusEnumType::Accepted
    } else {
        ClearChargingProfileStatusEnumType::Unknown
    };
    respond(&ClearChargingProfileResponse {
        status,
        status_info: None,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::handlers::handle_set_charging_profile;
    use crate::application::handlers::tests::charge_point;
    use crate::domain::UNBOUNDED_POWER_W;

    #[tokio::test]
    async fn clears_by_id_then_reports_unknown() {
        let (_, cp) = charge_point();
        handle_set_charging_profile(
            &cp,
            &json!({
                "evseId": 1,
                "chargingProfile": {
                    "id": 4,
                    "stackLevel": 0,
                    "chargingProfilePurpose": "TxDefaultProfile",
                    "chargingProfileKind": "Absolute",
                    "chargingSchedule": [{
                        "id": 1,
                        "chargingRateUnit": "W",
                        "chargingSchedulePeriod": [{"startPeriod": 0, "limit": 3000.0}]
                    }]
                }
            }),
        )
        .await
        .unwrap();
        assert_eq!(cp.station().state().power_limit(1), 3000.0);

        let response = handle_clear_charging_profile(
            &cp,
            &json!({"chargingProfileCriteria": {"evseId": -1}}),
        )
        .await
        .unwrap();
        assert_eq!(response, json!({"status": "Unknown"}));
        assert_eq!(cp.station().state().power_limit(1), 3000.0);

        let response = handle_clear_charging_profile(&cp, &json!({"chargingProfileId": 4}))
            .await
            .unwrap();
        assert_eq!(response, json!({"status": "Accepted"}));
        assert_eq!(cp.station().state().power_limit(1), UNBOUNDED_POWER_W);

        let response = handle_clear_charging_profile(&cp, &json!({"chargingProfileId": 4}))
            .await
            .unwrap();
        assert_eq!(response, json!({"status": "Unknown"}));
    }
}
