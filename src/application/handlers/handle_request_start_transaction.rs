//! RequestStartTransaction handler

use rust_ocpp::v2_0_1::enumerations::request_start_stop_status_enum_type::RequestStartStopStatusEnumType;
use rust_ocpp::v2_0_1::messages::request_start_transaction::{
    RequestStartTransactionRequest, RequestStartTransactionResponse,
};
use serde_json::Value;
use tracing::{info, warn};

use super::{parse, respond};
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_request_start_transaction(
    cp: &ChargePoint,
    payload: &Value,
) -> Result<Value, HandlerError> {
    let req: RequestStartTransactionRequest = parse("RequestStartTransaction", payload)?;
    info!(
        evse_id = ?req.evse_id,
        remote_start_id = req.remote_start_id,
        id_token = req.id_token.id_token.as_str(),
        "RequestStartTransaction"
    );
    cp.history().received(format!(
        "RequestStartTransaction (RemoteStartId: {}, IdToken: {})",
        req.remote_start_id, req.id_token.id_token
    ));

    let status = match req.evse_id.map(u32::try_from).transpose() {
        Ok(evse_id) => cp.remote().request_start(
            evse_id,
            req.remote_start_id.into(),
            req.id_token.id_token,
        ),
        Err(_) => {
            warn!(evse_id = ?req.evse_id, "Remote start for invalid EVSE");
            RequestStartStopStatusEnumType::Rejected
        }
    };

    respond(&RequestStartTransactionResponse {
        status,
        transaction_id: None,
        status_info: None,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::application::handlers::tests::charge_point;
    use crate::domain::EvseStatus;

    #[tokio::test(start_paused = true)]
    async fn accepted_start_reserves_evse() {
        let (csms, cp) = charge_point();
        let response = handle_request_start_transaction(
            &cp,
            &json!({"remoteStartId": 7, "idToken": {"idToken": "TAG", "type": "Central"}}),
        )
        .await
        .unwrap();
        assert_eq!(response, json!({"status": "Accepted"}));

        tokio::time::sleep(Duration::from_millis(1)).await;
        let state = cp.station().state();
        let tx = state.transaction(1).unwrap();
        assert!(tx.pending_remote_start);
        assert_eq!(tx.remote_start_id, Some(7));
        assert_eq!(state.status(1).unwrap(), EvseStatus::Occupied);
        assert!(csms.count("TransactionEvent") >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_when_no_evse_is_free() {
        let (_, cp) = charge_point();
        cp.connect(1).await.unwrap();
        cp.connect(2).await.unwrap();

        let response = handle_request_start_transaction(
            &cp,
            &json!({"remoteStartId": 1, "idToken": {"idToken": "TAG", "type": "Central"}}),
        )
        .await
        .unwrap();
        assert_eq!(response, json!({"status": "Rejected"}));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(cp.station().read(|s| s.transactions.len()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn negative_evse_is_rejected() {
        let (csms, cp) = charge_point();
        let response = handle_request_start_transaction(
            &cp,
            &json!({"evseId": -1, "remoteStartId": 2, "idToken": {"idToken": "TAG", "type": "Central"}}),
        )
        .await
        .unwrap();
        assert_eq!(response, json!({"status": "Rejected"}));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(cp.station().read(|s| s.transactions.is_empty()));
        assert_eq!(csms.count("TransactionEvent"), 0);
    }

    #[tokio::test]
    async fn missing_id_token_is_format_violation() {
        let (_, cp) = charge_point();
        let err = handle_request_start_transaction(&cp, &json!({"remoteStartId": 1}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FormatViolation");
    }
}
