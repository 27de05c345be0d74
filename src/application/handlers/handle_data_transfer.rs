//! DataTransfer handler
//!
//! No vendor extensions are implemented; every transfer is accepted.

use rust_ocpp::v2_0_1::enumerations::data_transfer_status_enum_type::DataTransferStatusEnumType;
use rust_ocpp::v2_0_1::messages::datatransfer::{DataTransferRequest, DataTransferResponse};
use serde_json::Value;
use tracing::info;

use super::{parse, respond};
use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

pub async fn handle_data_transfer(cp: &ChargePoint, payload: &Value) -> Result<Value, HandlerError> {
    let req: DataTransferRequest = parse("DataTransfer", payload)?;
    info!(
        vendor_id = req.vendor_id.as_str(),
        message_id = ?req.message_id,
        "DataTransfer"
    );
    cp.history()
        .received(format!("DataTransfer (VendorId: {})", req.vendor_id));

    respond(&DataTransferResponse {
        status: DataTransferStatusEnumType::Accepted,
        data: None,
        status_info: None,
    })
}
