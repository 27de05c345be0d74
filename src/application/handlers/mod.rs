//! Inbound OCPP 2.0.1 action handlers
//!
//! Routes CSMS-initiated action names to their handlers. Each handler
//! deserializes the payload into its request type, records the call in the
//! history and answers synchronously; anything slow is spawned.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::application::charge_point::ChargePoint;
use crate::support::errors::HandlerError;

mod handle_change_availability;
mod handle_clear_charging_profile;
mod handle_data_transfer;
mod handle_get_charging_profiles;
mod handle_get_log;
mod handle_get_variables;
mod handle_request_start_transaction;
mod handle_request_stop_transaction;
mod handle_reset;
mod handle_set_charging_profile;
mod handle_set_variables;
mod handle_trigger_message;
mod handle_unlock_connector;
mod handle_update_firmware;

pub use handle_change_availability::handle_change_availability;
pub use handle_clear_charging_profile::handle_clear_charging_profile;
pub use handle_data_transfer::handle_data_transfer;
pub use handle_get_charging_profiles::handle_get_charging_profiles;
pub use handle_get_log::handle_get_log;
pub use handle_get_variables::handle_get_variables;
pub use handle_request_start_transaction::handle_request_start_transaction;
pub use handle_request_stop_transaction::handle_request_stop_transaction;
pub use handle_reset::handle_reset;
pub use handle_set_charging_profile::handle_set_charging_profile;
pub use handle_set_variables::handle_set_variables;
pub use handle_trigger_message::handle_trigger_message;
pub use handle_unlock_connector::handle_unlock_connector;
pub use handle_update_firmware::handle_update_firmware;

/// Routes OCPP 2.0.1 actions to their respective handlers.
///
/// `action` is the string action name from the OCPP-J Call frame. Unknown
/// actions, including charging-station-initiated ones, are answered with
/// `NotImplemented`.
pub async fn action_matcher(
    cp: &ChargePoint,
    action: &str,
    payload: &Value,
) -> Result<Value, HandlerError> {
    match action {
        "Reset" => handle_reset(cp, payload).await,
        "RequestStartTransaction" => handle_request_start_transaction(cp, payload).await,
        "RequestStopTransaction" => handle_request_stop_transaction(cp, payload).await,
        "ChangeAvailability" => handle_change_availability(cp, payload).await,
        "UnlockConnector" => handle_unlock_connector(cp, payload).await,
        "SetVariables" => handle_set_variables(cp, payload).await,
        "GetVariables" => handle_get_variables(cp, payload).await,
        "TriggerMessage" => handle_trigger_message(cp, payload).await,
        "SetChargingProfile" => handle_set_charging_profile(cp, payload).await,
        "GetChargingProfiles" => handle_get_charging_profiles(cp, payload).await,
        "ClearChargingProfile" => handle_clear_charging_profile(cp, payload).await,
        "UpdateFirmware" => handle_update_firmware(cp, payload).await,
        "GetLog" => handle_get_log(cp, payload).await,
        "DataTransfer" => handle_data_transfer(cp, payload).await,

        unknown => {
            warn!(action = unknown, "Unsupported inbound action");
            Err(HandlerError::NotImplemented(unknown.to_string()))
        }
    }
}

/// Deserialize a request payload, mapping failures to `FormatViolation`.
pub(crate) fn parse<T: DeserializeOwned>(action: &str, payload: &Value) -> Result<T, HandlerError> {
    serde_json::from_value(payload.clone()).map_err(|e| {
        error!(action, error = %e, "Failed to parse request");
        HandlerError::FormatViolation(format!("{}: {}", action, e))
    })
}

pub(crate) fn respond<T: Serialize>(response: &T) -> Result<Value, HandlerError> {
    serde_json::to_value(response).map_err(|e| HandlerError::Internal(e.to_string()))
}
