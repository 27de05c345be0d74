//! Recording CSMS double for tests

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::CsmsPort;
use crate::support::errors::CallError;

#[derive(Default)]
pub struct MockCsms {
    calls: Mutex<Vec<(String, Value)>>,
    rejected_actions: Mutex<HashSet<String>>,
    rejected_events: Mutex<HashSet<String>>,
    failing_actions: Mutex<HashSet<String>>,
    boot_status: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl MockCsms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `action` with a CALLERROR.
    pub fn reject_action(&self, action: &str) {
        self.rejected_actions.lock().insert(action.to_string());
    }

    /// Answer TransactionEvents of `event_type` with a CALLERROR.
    pub fn reject_event(&self, event_type: &str) {
        self.rejected_events.lock().insert(event_type.to_string());
    }

    /// Fail every `action` with a transport error.
    pub fn fail_action(&self, action: &str) {
        self.failing_actions.lock().insert(action.to_string());
    }

    pub fn accept_all(&self) {
        self.rejected_actions.lock().clear();
        self.rejected_events.lock().clear();
        self.failing_actions.lock().clear();
    }

    pub fn set_boot_status(&self, status: &str) {
        *self.boot_status.lock() = Some(status.to_string());
    }

    /// Delay every answer, so tests can interleave operations.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, action: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(a, _)| a == action)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// TransactionEvents sent for `transaction_id`, in order.
    pub fn events_for(&self, transaction_id: &str) -> Vec<Value> {
        self.calls_for("TransactionEvent")
            .into_iter()
            .filter(|p| p["transactionInfo"]["transactionId"] == transaction_id)
            .collect()
    }

    pub fn count(&self, action: &str) -> usize {
        self.calls_for(action).len()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn response_for(&self, action: &str) -> Value {
        match action {
            "BootNotification" => {
                let status = self
                    .boot_status
                    .lock()
                    .clone()
                    .unwrap_or_else(|| "Accepted".to_string());
                json!({"currentTime": "2024-01-01T00:00:00Z", "interval": 300, "status": status})
            }
            "Heartbeat" => json!({"currentTime": "2024-01-01T00:00:00Z"}),
            "Authorize" => json!({"idTokenInfo": {"status": "Accepted"}}),
            _ => json!({}),
        }
    }
}

#[async_trait]
impl CsmsPort for MockCsms {
    async fn call(&self, action: &'static str, payload: Value) -> Result<Value, CallError> {
        self.calls.lock().push((action.to_string(), payload.clone()));

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_actions.lock().contains(action) {
            return Err(CallError::Transport("connection closed".into()));
        }

        let event_rejected = action == "TransactionEvent"
            && payload["eventType"]
                .as_str()
                .is_some_and(|e| self.rejected_events.lock().contains(e));
        if event_rejected || self.rejected_actions.lock().contains(action) {
            return Err(CallError::Rejected {
                action: action.to_string(),
                code: "GenericError".into(),
                description: "rejected by mock".into(),
            });
        }

        Ok(self.response_for(action))
    }
}
