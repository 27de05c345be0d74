//! Inbound port: requests from the CSMS to the charging station

use async_trait::async_trait;
use serde_json::Value;

use crate::support::errors::HandlerError;

/// Handles one CSMS-initiated call. `Ok` becomes a CALLRESULT, `Err` a
/// CALLERROR with [`HandlerError::code`].
#[async_trait]
pub trait InboundPort: Send + Sync {
    async fn handle_call(&self, action: &str, payload: Value) -> Result<Value, HandlerError>;
}
