//! Outbound port: requests from the charging station to the CSMS
//!
//! The core never sees frames or message ids. A production adapter lives in
//! [`WsCsmsClient`](crate::infrastructure::transport::WsCsmsClient); tests
//! use a recording mock.

use async_trait::async_trait;
use serde_json::Value;

use crate::support::errors::CallError;

#[async_trait]
pub trait CsmsPort: Send + Sync {
    /// Send `action` with `payload` and wait for the CSMS answer.
    ///
    /// `Ok` carries the CALLRESULT payload. A CALLERROR becomes
    /// [`CallError::Rejected`]; everything else means the outcome is unknown
    /// and the request must be treated as not applied.
    async fn call(&self, action: &'static str, payload: Value) -> Result<Value, CallError>;
}
