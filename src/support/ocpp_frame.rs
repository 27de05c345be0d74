//! OCPP-J message framing
//!
//! - **Call**       `[2, "<uniqueId>", "<action>", {<payload>}]`
//! - **CallResult** `[3, "<uniqueId>", {<payload>}]`
//! - **CallError**  `[4, "<uniqueId>", "<errorCode>", "<errorDescription>", {<errorDetails>}]`

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

// ── Message-type constants ─────────────────────────────────────

const MSG_TYPE_CALL: u64 = 2;
const MSG_TYPE_CALL_RESULT: u64 = 3;
const MSG_TYPE_CALL_ERROR: u64 = 4;

// ── OcppFrame ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum OcppFrame {
    Call {
        unique_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        unique_id: String,
        payload: Value,
    },
    CallError {
        unique_id: String,
        error_code: String,
        error_description: String,
        error_details: Value,
    },
}

impl OcppFrame {
    /// New outbound Call with a freshly generated message id.
    pub fn call(action: impl Into<String>, payload: Value) -> Self {
        Self::Call {
            unique_id: Uuid::new_v4().to_string(),
            action: action.into(),
            payload,
        }
    }

    pub fn result(unique_id: impl Into<String>, payload: Value) -> Self {
        Self::CallResult {
            unique_id: unique_id.into(),
            payload,
        }
    }

    pub fn error(
        unique_id: impl Into<String>,
        error_code: impl Into<String>,
        error_description: impl Into<String>,
    ) -> Self {
        Self::CallError {
            unique_id: unique_id.into(),
            error_code: error_code.into(),
            error_description: error_description.into(),
            error_details: Value::Object(Default::default()),
        }
    }

    // ── Parsing ────────────────────────────────────────────

    pub fn parse(text: &str) -> Result<Self, OcppFrameError> {
        let arr: Vec<Value> =
            serde_json::from_str(text).map_err(|e| OcppFrameError::InvalidJson(e.to_string()))?;

        let msg_type = arr
            .first()
            .ok_or(OcppFrameError::EmptyArray)?
            .as_u64()
            .ok_or(OcppFrameError::InvalidMessageType)?;

        let unique_id = arr
            .get(1)
            .and_then(Value::as_str)
            .ok_or(OcppFrameError::FieldTypeMismatch("uniqueId must be a string"))?
            .to_string();

        match msg_type {
            MSG_TYPE_CALL => {
                require_len(&arr, 4)?;
                let action = arr[2]
                    .as_str()
                    .ok_or(OcppFrameError::FieldTypeMismatch("action must be a string"))?
                    .to_string();
                Ok(Self::Call {
                    unique_id,
                    action,
                    payload: arr[3].clone(),
                })
            }
            MSG_TYPE_CALL_RESULT => Ok(Self::CallResult {
                unique_id,
                payload: arr
                    .get(2)
                    .filter(|v| !v.is_null())
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Default::default())),
            }),
            MSG_TYPE_CALL_ERROR => {
                require_len(&arr, 3)?;
                Ok(Self::CallError {
                    unique_id,
                    error_code: arr[2].as_str().unwrap_or("GenericError").to_string(),
                    error_description: arr
                        .get(3)
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string(),
                    error_details: arr
                        .get(4)
                        .cloned()
                        .unwrap_or_else(|| Value::Object(Default::default())),
                })
            }
            other => Err(OcppFrameError::UnknownMessageType(other)),
        }
    }

    // ── Serialization ──────────────────────────────────────

    pub fn serialize(&self) -> String {
        let arr = match self {
            Self::Call {
                unique_id,
                action,
                payload,
            } => serde_json::json!([MSG_TYPE_CALL, unique_id, action, payload]),
            Self::CallResult { unique_id, payload } => {
                serde_json::json!([MSG_TYPE_CALL_RESULT, unique_id, payload])
            }
            Self::CallError {
                unique_id,
                error_code,
                error_description,
                error_details,
            } => serde_json::json!([
                MSG_TYPE_CALL_ERROR,
                unique_id,
                error_code,
                error_description,
                error_details
            ]),
        };
        arr.to_string()
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Call { unique_id, .. }
            | Self::CallResult { unique_id, .. }
            | Self::CallError { unique_id, .. } => unique_id,
        }
    }
}

fn require_len(arr: &[Value], expected: usize) -> Result<(), OcppFrameError> {
    if arr.len() < expected {
        return Err(OcppFrameError::MissingFields {
            expected,
            got: arr.len(),
        });
    }
    Ok(())
}

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OcppFrameError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Empty OCPP message array")]
    EmptyArray,
    #[error("Message type is not a number")]
    InvalidMessageType,
    #[error("Unknown message type: {0}")]
    UnknownMessageType(u64),
    #[error("Expected at least {expected} fields, got {got}")]
    MissingFields { expected: usize, got: usize },
    #[error("Field type mismatch: {0}")]
    FieldTypeMismatch(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_inbound_call() {
        let text = r#"[2,"csms-1","RequestStopTransaction",{"transactionId":"tx-1"}]"#;
        match OcppFrame::parse(text).unwrap() {
            OcppFrame::Call {
                unique_id,
                action,
                payload,
            } => {
                assert_eq!(unique_id, "csms-1");
                assert_eq!(action, "RequestStopTransaction");
                assert_eq!(payload["transactionId"], "tx-1");
            }
            other => panic!("Expected Call frame, got {:?}", other),
        }
    }

    #[test]
    fn parse_call_result_with_null_payload() {
        let frame = OcppFrame::parse(r#"[3,"abc",null]"#).unwrap();
        assert_eq!(frame, OcppFrame::result("abc", serde_json::json!({})));
    }

    #[test]
    fn parse_call_error_without_details() {
        match OcppFrame::parse(r#"[4,"abc","SecurityError","denied"]"#).unwrap() {
            OcppFrame::CallError {
                error_code,
                error_description,
                error_details,
                ..
            } => {
                assert_eq!(error_code, "SecurityError");
                assert_eq!(error_description, "denied");
                assert!(error_details.as_object().unwrap().is_empty());
            }
            other => panic!("Expected CallError frame, got {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(OcppFrame::parse("[]"), Err(OcppFrameError::EmptyArray)));
        assert!(matches!(
            OcppFrame::parse(r#"[9,"x"]"#),
            Err(OcppFrameError::UnknownMessageType(9))
        ));
        assert!(matches!(
            OcppFrame::parse(r#"[2,"x","Reset"]"#),
            Err(OcppFrameError::MissingFields { expected: 4, got: 3 })
        ));
        assert!(OcppFrame::parse("not json").is_err());
    }

    #[test]
    fn outbound_call_serializes_with_generated_id() {
        let frame = OcppFrame::call("Heartbeat", serde_json::json!({}));
        let text = frame.serialize();
        assert!(text.starts_with("[2,\""));
        assert!(text.ends_with(",\"Heartbeat\",{}]"));
        assert_eq!(OcppFrame::parse(&text).unwrap(), frame);
    }
}
