//! ChangeAvailability handler

use rust_ocpp::v2_0_1::enumerations::change_availability_status_enum_type::ChangeAvailabilityStatusEnumType;
use rust_ocpp::v2_0_1::messages::change_availability::{
    ChangeAvailabilityRequest, ChangeAvailabilityResponse,
};
use serde_json::Value;
use tracing::info;

use super::{parse, respond};
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_change_availability(
    cp: &ChargePoint,
    payload: &Value,
) -> Result<Value, HandlerError> {
    let req: ChangeAvailabilityRequest = parse("ChangeAvailability", payload)?;
    let evse_id = req.evse.map(|e| e.id);
    info!(
        operational_status = ?req.operational_status,
        ?evse_id,
        "ChangeAvailability"
    );
    cp.history().received(format!(
        "ChangeAvailability (Status: {:?})",
        req.operational_status
    ));

    respond(&ChangeAvailabilityResponse {
        status: ChangeAvailabilityStatusEnumType::Accepted,
        status_info: None,
    })
}
