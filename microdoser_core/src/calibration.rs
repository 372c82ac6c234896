//! Flow-rate calibration from a timed test dispense.

use std::time::Duration;

use crate::error::DoserError;
use crate::flow::FlowRate;
use crate::util::ACCEPTABLE_ERROR_PCT;

/// Result of one calibration dispense: how much material came out in how long.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowCalibration {
    duration: Duration,
    gate_position: Option<f64>,
    measured_mg: f64,
    flow_rate: FlowRate,
}

impl FlowCalibration {
    pub fn from_measurement(
        duration: Duration,
        gate_position: Option<f64>,
        measured_mg: f64,
    ) -> Result<Self, DoserError> {
        if duration.is_zero() {
            return Err(DoserError::Config(
                "calibration dispense duration must be > 0".into(),
            ));
        }
        if !(measured_mg.is_finite() && measured_mg > 0.0) {
            return Err(DoserError::Config(format!(
                "no material dispensed during calibration (measured {measured_mg:.3} mg)"
            )));
        }
        let flow_rate = FlowRate::new(measured_mg / duration.as_secs_f64()).map_err(|_| {
            DoserError::Config(format!(
                "calibration flow of {measured_mg} mg over {duration:?} is out of range"
            ))
        })?;
        Ok(Self {
            duration,
            gate_position,
            measured_mg,
            flow_rate,
        })
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn gate_position(&self) -> Option<f64> {
        self.gate_position
    }

    pub fn measured_mg(&self) -> f64 {
        self.measured_mg
    }

    /// measured_mg / duration_s
    pub fn flow_rate(&self) -> FlowRate {
        self.flow_rate
    }

    /// Signed error of a verification dispense, in percent of the target.
    pub fn verification_error_pct(target_mg: f64, measured_mg: f64) -> f64 {
        crate::util::error_pct(measured_mg - target_mg, target_mg)
    }

    /// Whether a verification error is small enough to keep the calibration.
    pub fn is_acceptable(error_pct: f64) -> bool {
        error_pct.abs() < ACCEPTABLE_ERROR_PCT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_is_mass_over_time() {
        let cal =
            FlowCalibration::from_measurement(Duration::from_secs(5), Some(35.0), 12.0).unwrap();
        assert!((cal.flow_rate().mg_per_s() - 2.4).abs() < 1e-12);
        assert_eq!(cal.gate_position(), Some(35.0));
    }

    #[test]
    fn rejects_empty_dispense() {
        let err = FlowCalibration::from_measurement(Duration::from_secs(5), None, 0.0)
            .expect_err("nothing dispensed");
        assert!(err.to_string().contains("no material dispensed"));
    }

    #[test]
    fn rejects_zero_duration() {
        assert!(FlowCalibration::from_measurement(Duration::ZERO, None, 3.0).is_err());
    }

    #[test]
    fn rejects_ratio_outside_f64_range() {
        let overflow =
            FlowCalibration::from_measurement(Duration::from_nanos(1), None, f64::MAX);
        assert!(matches!(overflow, Err(DoserError::Config(_))));
        let underflow =
            FlowCalibration::from_measurement(Duration::from_secs(u64::MAX), None, f64::MIN_POSITIVE);
        assert!(matches!(underflow, Err(DoserError::Config(_))));
    }

    #[test]
    fn verification_thresholds() {
        let pct = FlowCalibration::verification_error_pct(5.0, 5.2);
        assert!((pct - 4.0).abs() < 1e-9);
        assert!(FlowCalibration::is_acceptable(pct));
        assert!(!FlowCalibration::is_acceptable(
            FlowCalibration::verification_error_pct(5.0, 4.4)
        ));
    }
}
