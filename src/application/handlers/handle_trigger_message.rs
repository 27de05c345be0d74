//! TriggerMessage handler
//!
//! Always accepted. Heartbeat and StatusNotification are actually sent,
//! other triggers are acknowledged without effect.

use rust_ocpp::v2_0_1::enumerations::message_trigger_enum_type::MessageTriggerEnumType;
use rust_ocpp::v2_0_1::enumerations::trigger_message_status_enum_type::TriggerMessageStatusEnumType;
use rust_ocpp::v2_0_1::messages::trigger_message::{TriggerMessageRequest, TriggerMessageResponse};
use serde_json::Value;
use tracing::{info, warn};

use super::{parse, respond};
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_trigger_message(
    cp: &ChargePoint,
    payload: &Value,
) -> Result<Value, HandlerError> {
    let req: TriggerMessageRequest = parse("TriggerMessage", payload)?;
    let evse_id = req.evse.map(|e| e.id);
    info!(requested_message = ?req.requested_message, ?evse_id, "TriggerMessage");
    cp.history().received(format!(
        "TriggerMessage (RequestedMessage: {:?})",
        req.requested_message
    ));

    match req.requested_message {
        MessageTriggerEnumType::Heartbeat => {
            let operations = cp.operations().clone();
            tokio::spawn(async move {
                if let Err(e) = operations.send_heartbeat().await {
                    warn!(error = %e, "Triggered Heartbeat not delivered");
                }
            });
        }
        MessageTriggerEnumType::StatusNotification => {
            let cp = cp.clone();
            tokio::spawn(async move {
                match evse_id {
                    Some(requested) => {
                        let known = u32::try_from(requested).ok().and_then(|id| {
                            let status = cp.station().read(|s| s.status(id)).ok()?;
                            Some((id, status))
                        });
                        let Some((evse_id, status)) = known else {
                            warn!(evse_id = requested, "Triggered StatusNotification for unknown EVSE");
                            return;
                        };
                        let _ = cp
                            .station()
                            .sender()
                            .status_notification(evse_id, status)
                            .await;
                    }
                    None => cp.operations().announce_statuses().await,
                }
            });
        }
        other => {
            info!(requested_message = ?other, "Trigger acknowledged without effect");
        }
    }

    respond(&TriggerMessageResponse {
        status: TriggerMessageStatusEnumType::Accepted,
        status_info: None,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::application::handlers::tests::charge_point;

    async fn trigger(cp: &ChargePoint, payload: Value) -> Value {
        let response = handle_trigger_message(cp, &payload).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        response
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_is_sent() {
        let (csms, cp) = charge_point();
        let response = trigger(&cp, json!({"requestedMessage": "Heartbeat"})).await;
        assert_eq!(response, json!({"status": "Accepted"}));
        assert_eq!(csms.count("Heartbeat"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn status_notification_for_one_or_all() {
        let (csms, cp) = charge_point();
        trigger(
            &cp,
            json!({"requestedMessage": "StatusNotification", "evse": {"id": 2}}),
        )
        .await;
        let sent = csms.calls_for("StatusNotification");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["evseId"], 2);

        csms.clear();
        trigger(&cp, json!({"requestedMessage": "StatusNotification"})).await;
        assert_eq!(csms.count("StatusNotification"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn status_notification_for_unknown_evse_sends_nothing() {
        let (csms, cp) = charge_point();
        for id in [9, -1] {
            let response = trigger(
                &cp,
                json!({"requestedMessage": "StatusNotification", "evse": {"id": id}}),
            )
            .await;
            assert_eq!(response, json!({"status": "Accepted"}));
        }
        assert_eq!(csms.count("StatusNotification"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn other_triggers_are_accepted_without_effect() {
        let (csms, cp) = charge_point();
        let response = trigger(&cp, json!({"requestedMessage": "MeterValues"})).await;
        assert_eq!(response, json!({"status": "Accepted"}));
        assert!(csms.calls().is_empty());
    }
}
