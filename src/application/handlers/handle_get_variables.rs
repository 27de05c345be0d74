//! GetVariables handler

use rust_ocpp::v2_0_1::datatypes::get_variable_result_type::GetVariableResultType;
use rust_ocpp::v2_0_1::enumerations::get_variable_status_enum_type::GetVariableStatusEnumType;
use rust_ocpp::v2_0_1::messages::get_variables::{GetVariablesRequest, GetVariablesResponse};
use serde_json::Value;
use tracing::info;

use super::{parse, respond};
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_get_variables(cp: &ChargePoint, payload: &Value) -> Result<Value, HandlerError> {
    let req: GetVariablesRequest = parse("GetVariables", payload)?;
    info!(count = req.get_variable_data.len(), "GetVariables");
    cp.history().received(format!(
        "GetVariables ({} item(s))",
        req.get_variable_data.len()
    ));

    let get_variable_result = req
        .get_variable_data
        .into_iter()
        .map(|item| GetVariableResultType {
            attribute_status: GetVariableStatusEnumType::UnknownComponent,
            attribute_type: item.attribute_type,
            attribute_value: None,
            component: item.component,
            variable: item.variable,
            attribute_status_info: None,
        })
        .collect();

    respond(&GetVariablesResponse {
        get_variable_result,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::handlers::tests::charge_point;

    #[tokio::test]
    async fn every_component_is_unknown() {
        let (_, cp) = charge_point();
        let response = handle_get_variables(
            &cp,
            &json!({"getVariableData": [
                {"component": {"name": "ChargingStation"}, "variable": {"name": "Model"}}
            ]}),
        )
        .await
        .unwrap();

        assert_eq!(
            response,
            json!({"getVariableResult": [{
                "attributeStatus": "UnknownComponent",
                "component": {"name": "ChargingStation"},
                "variable": {"name": "Model"}
            }]})
        );
    }
}
