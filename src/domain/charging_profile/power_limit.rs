//! Instantaneous power ceiling of an EVSE

use rust_ocpp::v2_0_1::enumerations::charging_rate_unit_enum_type::ChargingRateUnitEnumType;

use super::model::ChargingProfile;

/// Returned when no usable limit exists.
pub const UNBOUNDED_POWER_W: f64 = 9999.0;

/// Nominal single-phase voltage for converting ampere limits.
pub const NOMINAL_VOLTAGE: f64 = 230.0;

/// Power limit in watts. Only the first schedule period is considered;
/// the schedule is not evaluated against the clock.
pub fn power_limit(profile: Option<&ChargingProfile>) -> f64 {
    let Some(profile) = profile else {
        return UNBOUNDED_POWER_W;
    };
    let Some(period) = profile.periods.first() else {
        return UNBOUNDED_POWER_W;
    };
    match profile.charging_rate_unit {
        Some(ChargingRateUnitEnumType::A) => period.limit * NOMINAL_VOLTAGE,
        Some(ChargingRateUnitEnumType::W) => period.limit,
        None => UNBOUNDED_POWER_W,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::charging_profile::model::SchedulePeriod;

    fn profile(unit: Option<ChargingRateUnitEnumType>, limits: &[f64]) -> ChargingProfile {
        ChargingProfile {
            id: 1,
            evse_id: 1,
            stack_level: 0,
            purpose: None,
            charging_rate_unit: unit,
            periods: limits
                .iter()
                .enumerate()
                .map(|(i, l)| SchedulePeriod {
                    start_period: i as i32 * 60,
                    limit: *l,
                })
                .collect(),
            received: None,
        }
    }

    #[test]
    fn no_profile_is_unbounded() {
        assert_eq!(power_limit(None), UNBOUNDED_POWER_W);
    }

    #[test]
    fn amps_convert_at_230_volts() {
        let p = profile(Some(ChargingRateUnitEnumType::A), &[16.0]);
        assert_eq!(power_limit(Some(&p)), 3680.0);
    }

    #[test]
    fn watts_pass_through() {
        let p = profile(Some(ChargingRateUnitEnumType::W), &[7400.0]);
        assert_eq!(power_limit(Some(&p)), 7400.0);
    }

    #[test]
    fn only_first_period_counts() {
        let p = profile(Some(ChargingRateUnitEnumType::W), &[1000.0, 50.0]);
        assert_eq!(power_limit(Some(&p)), 1000.0);
    }

    #[test]
    fn missing_unit_or_periods_is_unbounded() {
        assert_eq!(power_limit(Some(&profile(None, &[10.0]))), UNBOUNDED_POWER_W);
        assert_eq!(
            power_limit(Some(&profile(Some(ChargingRateUnitEnumType::W), &[]))),
            UNBOUNDED_POWER_W
        );
    }
}
