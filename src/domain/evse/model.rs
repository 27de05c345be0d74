//! EVSE domain entity

use serde::{Deserialize, Serialize};

/// Status of an EVSE, reported verbatim as the OCPP `connectorStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvseStatus {
    Available,
    Occupied,
    Unavailable,
    Faulted,
}

impl Default for EvseStatus {
    fn default() -> Self {
        Self::Available
    }
}

impl EvseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Occupied => "Occupied",
            Self::Unavailable => "Unavailable",
            Self::Faulted => "Faulted",
        }
    }

    /// Exact canonical name only; `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Available" => Some(Self::Available),
            "Occupied" => Some(Self::Occupied),
            "Unavailable" => Some(Self::Unavailable),
            "Faulted" => Some(Self::Faulted),
            _ => None,
        }
    }
}

impl std::fmt::Display for EvseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical charge delivery point with a single connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evse {
    pub id: u32,
    pub status: EvseStatus,
}

impl Evse {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            status: EvseStatus::Available,
        }
    }

    pub fn with_status(id: u32, status: EvseStatus) -> Self {
        Self { id, status }
    }

    pub fn is_available(&self) -> bool {
        self.status == EvseStatus::Available
    }
}
