//! RequestStopTransaction handler

use rust_ocpp::v2_0_1::messages::request_stop_transaction::{
    RequestStopTransactionRequest, RequestStopTransactionResponse,
};
use serde_json::Value;
use tracing::info;

use super::{parse, respond};
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_request_stop_transaction(
    cp: &ChargePoint,
    payload: &Value,
) -> Result<Value, HandlerError> {
    let req: RequestStopTransactionRequest = parse("RequestStopTransaction", payload)?;
    info!(transaction_id = req.transaction_id.as_str(), "RequestStopTransaction");
    cp.history().received(format!(
        "RequestStopTransaction (TransactionId: {})",
        req.transaction_id
    ));

    let status = cp.remote().request_stop(&req.transaction_id);
    respond(&RequestStopTransactionResponse {
        status,
        status_info: None,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::application::handlers::tests::charge_point;

    #[tokio::test(start_paused = true)]
    async fn unknown_transaction_is_rejected() {
        let (_, cp) = charge_point();
        let response = handle_request_stop_transaction(&cp, &json!({"transactionId": "nope"}))
            .await
            .unwrap();
        assert_eq!(response, json!({"status": "Rejected"}));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_charging_transaction() {
        let (csms, cp) = charge_point();
        let tx_id = cp.connect(1).await.unwrap();
        cp.charge(1).await.unwrap();

        let response = handle_request_stop_transaction(&cp, &json!({"transactionId": tx_id}))
            .await
            .unwrap();
        assert_eq!(response, json!({"status": "Accepted"}));

        tokio::time::sleep(Duration::from_millis(1)).await;
        let tx = cp.station().state().transaction(1).cloned().unwrap();
        assert!(!tx.is_charging());
        assert_eq!(cp.station().running_meter_tasks(), 0);

        let before = csms.count("MeterValues");
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(csms.count("MeterValues"), before);
    }
}
