//! ChargingProfile domain entity

use rust_decimal::prelude::ToPrimitive;
use rust_ocpp::v2_0_1::datatypes::charging_profile_type::ChargingProfileType;
use rust_ocpp::v2_0_1::enumerations::charging_profile_purpose_enum_type::ChargingProfilePurposeEnumType;
use rust_ocpp::v2_0_1::enumerations::charging_rate_unit_enum_type::ChargingRateUnitEnumType;
use serde::{Deserialize, Serialize};

use crate::support::errors::DomainError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePeriod {
    pub start_period: i32,
    pub limit: f64,
}

/// Active charging profile of one EVSE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingProfile {
    /// Profile id assigned by the CSMS
    pub id: i32,
    pub evse_id: u32,
    #[serde(default)]
    pub stack_level: i32,
    #[serde(default)]
    pub purpose: Option<ChargingProfilePurposeEnumType>,
    #[serde(default)]
    pub charging_rate_unit: Option<ChargingRateUnitEnumType>,
    #[serde(default)]
    pub periods: Vec<SchedulePeriod>,
    /// Profile as received, returned by ReportChargingProfiles
    #[serde(default)]
    pub received: Option<ChargingProfileType>,
}

impl ChargingProfile {
    /// Validate an incoming profile. EVSE existence is checked by the caller.
    pub fn from_request(evse_id: u32, profile: &ChargingProfileType) -> Result<Self, DomainError> {
        let schedule = profile
            .charging_schedule
            .first()
            .ok_or_else(|| DomainError::Validation("chargingSchedule is empty".into()))?;

        if schedule.charging_schedule_period.is_empty() {
            return Err(DomainError::Validation(
                "chargingSchedulePeriod is empty".into(),
            ));
        }

        let periods = schedule
            .charging_schedule_period
            .iter()
            .map(|p| {
                let limit = p.limit.to_f64().ok_or_else(|| {
                    DomainError::Validation(format!("limit {} is out of range", p.limit))
                })?;
                Ok(SchedulePeriod {
                    start_period: p.start_period,
                    limit,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(Self {
            id: profile.id,
            evse_id,
            stack_level: profile.stack_level,
            purpose: Some(profile.charging_profile_purpose.clone()),
            charging_rate_unit: Some(schedule.charging_rate_unit.clone()),
            periods,
            received: Some(profile.clone()),
        })
    }
}
