//! SetVariables handler
//!
//! The simulator has no device model; every write is acknowledged.

use rust_ocpp::v2_0_1::datatypes::set_variable_result_type::SetVariableResultType;
use rust_ocpp::v2_0_1::enumerations::set_variable_status_enum_type::SetVariableStatusEnumType;
use rust_ocpp::v2_0_1::messages::set_variables::{SetVariablesRequest, SetVariablesResponse};
use serde_json::Value;
use tracing::info;

use super::{parse, respond};
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_set_variables(cp: &ChargePoint, payload: &Value) -> Result<Value, HandlerError> {
    let req: SetVariablesRequest = parse("SetVariables", payload)?;
    info!(count = req.set_variable_data.len(), "SetVariables");
    cp.history().received(format!(
        "SetVariables ({} item(s))",
        req.set_variable_data.len()
    ));

    let set_variable_result = req
        .set_variable_data
        .into_iter()
        .map(|item| SetVariableResultType {
            attribute_type: item.attribute_type,
            attribute_status: SetVariableStatusEnumType::Accepted,
            component: item.component,
            variable: item.variable,
            attribute_status_info: None,
        })
        .collect();

    respond(&SetVariablesResponse {
        set_variable_result,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::handlers::tests::charge_point;

    #[tokio::test]
    async fn echoes_each_item() {
        let (_, cp) = charge_point();
        let response = handle_set_variables(
            &cp,
            &json!({"setVariableData": [
                {"attributeValue": "60", "component": {"name": "OCPPCommCtrlr"}, "variable": {"name": "HeartbeatInterval"}},
                {"attributeValue": "true", "component": {"name": "AuthCtrlr"}, "variable": {"name": "Enabled"}}
            ]}),
        )
        .await
        .unwrap();

        let results = response["setVariableResult"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["attributeStatus"], "Accepted");
        assert_eq!(results[0]["variable"]["name"], "HeartbeatInterval");
        assert_eq!(results[1]["component"]["name"], "AuthCtrlr");
    }
}
