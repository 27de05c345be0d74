//! UpdateFirmware handler
//!
//! Accepts immediately and plays back a scripted sequence of
//! FirmwareStatusNotification messages in the background.

use rust_ocpp::v2_0_1::enumerations::update_firmware_status_enum_type::UpdateFirmwareStatusEnumType;
use rust_ocpp::v2_0_1::messages::update_firmware::{UpdateFirmwareRequest, UpdateFirmwareResponse};
use serde_json::Value;
use tracing::info;

use super::{parse, respond};
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_update_firmware(
    cp: &ChargePoint,
    payload: &Value,
) -> Result<Value, HandlerError> {
    let req: UpdateFirmwareRequest = parse("UpdateFirmware", payload)?;
    info!(
        request_id = req.request_id,
        location = req.firmware.location.as_str(),
        retrieve_at = %req.firmware.retrieve_date_time,
        "UpdateFirmware"
    );
    cp.history().received(format!(
        "UpdateFirmware (RequestId: {})",
        req.request_id
    ));

    cp.operations().simulate_firmware_update(req.request_id);

    respond(&UpdateFirmwareResponse {
        status: UpdateFirmwareStatusEnumType::Accepted,
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
    async fn plays_back_firmware_statuses() {
        let (csms, cp) = charge_point();
        let response = handle_update_firmware(
            &cp,
            &json!({
                "requestId": 42,
                "firmware": {"location": "https://fw.example/cp.bin", "retrieveDateTime": "2024-01-01T00:00:00Z"}
            }),
        )
        .await
        .unwrap();
        assert_eq!(response, json!({"status": "Accepted"}));

        tokio::time::sleep(Duration::from_secs(25)).await;
        let statuses: Vec<Value> = csms
            .calls_for("FirmwareStatusNotification")
            .into_iter()
            .map(|p| p["status"].clone())
            .collect();
        assert_eq!(
            statuses,
            vec![
                json!("Downloading"),
                json!("Downloaded"),
                json!("Installing"),
                json!("Installed")
            ]
        );
    }
}
