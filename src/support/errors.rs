use thiserror::Error;

use crate::domain::EvseStatus;

/// Outcome of an outbound call that did not produce an accepted response.
///
/// Every variant means "assume not applied"; only [`CallError::Rejected`]
/// is an explicit answer from the CSMS.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error("CSMS rejected {action}: {code} ({description})")]
    Rejected {
        action: String,
        code: String,
        description: String,
    },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Timed out waiting for {0} response")]
    Timeout(String),

    #[error("Invalid request payload: {0}")]
    InvalidRequest(String),

    #[error("Invalid response payload: {0}")]
    InvalidResponse(String),
}

impl CallError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("EVSE {0} not found")]
    EvseNotFound(u32),

    #[error("EVSE {evse_id} is {status}")]
    InvalidEvseState { evse_id: u32, status: EvseStatus },

    #[error("No active transaction on EVSE {0}")]
    NoTransaction(u32),

    #[error("Transaction on EVSE {0} is already charging")]
    AlreadyCharging(u32),

    #[error("EVSE {0} is not charging")]
    NotCharging(u32),

    #[error("Transaction on EVSE {0} is waiting for a vehicle")]
    AwaitingVehicle(u32),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Call(#[from] CallError),
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot migration failed: {0}")]
    Migration(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] crate::support::ocpp_frame::OcppFrameError),
}

/// Error answered to the CSMS as a CALLERROR frame.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    FormatViolation(String),

    #[error("Action {0} is not implemented")]
    NotImplemented(String),

    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    /// OCPP-J error code for the CALLERROR frame.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FormatViolation(_) => "FormatViolation",
            Self::NotImplemented(_) => "NotImplemented",
            Self::Internal(_) => "InternalError",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Infra(#[from] InfraError),
}
