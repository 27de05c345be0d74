//! Reset handler
//!
//! The simulator does not reboot; the request is acknowledged only.

use rust_ocpp::v2_0_1::enumerations::reset_status_enum_type::ResetStatusEnumType;
use rust_ocpp::v2_0_1::messages::reset::{ResetRequest, ResetResponse};
use serde_json::Value;
use tracing::info;

use super::{parse, respond};
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_reset(cp: &ChargePoint, payload: &Value) -> Result<Value, HandlerError> {
    let req: ResetRequest = parse("Reset", payload)?;
    info!(kind = ?req.request_type, evse_id = ?req.evse_id, "Reset requested");
    cp.history()
        .received(format!("Reset (Type: {:?})", req.request_type));

    respond(&ResetResponse {
        status: ResetStatusEnumType::Accepted,
        status_info: None,
    })
}
