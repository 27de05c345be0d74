//! GetLog handler

use rust_ocpp::v2_0_1::enumerations::log_status_enum_type::LogStatusEnumType;
use rust_ocpp::v2_0_1::messages::get_log::{GetLogRequest, GetLogResponse};
use serde_json::Value;
use tracing::info;

use super::{parse, respond};
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_get_log(cp: &ChargePoint, payload: &Value) -> Result<Value, HandlerError> {
    let req: GetLogRequest = parse("GetLog", payload)?;
    info!(
        request_id = req.request_id,
        log_type = ?req.log_type,
        remote_location = req.log.remote_location.as_str(),
        "GetLog"
    );
    cp.history().received(format!(
        "GetLog (RequestId: {}, LogType: {:?})",
        req.request_id, req.log_type
    ));

    cp.operations().simulate_log_upload(req.request_id);

    respond(&GetLogResponse {
        status: LogStatusEnumType::Accepted,
        filename: Some(format!(
            "{}-{}.log",
            cp.station().settings().station_id,
            req.request_id
        )),
        status_info: None,
    })
}
