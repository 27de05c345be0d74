//! UnlockConnector handler

use rust_ocpp::v2_0_1::enumerations::unlock_status_enum_type::UnlockStatusEnumType;
use rust_ocpp::v2_0_1::messages::unlock_connector::{
    UnlockConnectorRequest, UnlockConnectorResponse,
};
use serde_json::Value;
use tracing::info;

use super::{parse, respond};
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_unlock_connector(
    cp: &ChargePoint,
    payload: &Value,
) -> Result<Value, HandlerError> {
    let req: UnlockConnectorRequest = parse("UnlockConnector", payload)?;
    info!(evse_id = req.evse_id, connector_id = req.connector_id, "UnlockConnector");
    cp.history().received(format!(
        "UnlockConnector (EvseId: {}, ConnectorId: {})",
        req.evse_id, req.connector_id
    ));

    respond(&UnlockConnectorResponse {
        status: UnlockStatusEnumType::Unlocked,
        status_info: None,
    })
}
