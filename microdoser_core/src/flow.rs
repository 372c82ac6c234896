//! Open-loop flow model: dispense duration = target mass / flow rate.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::error::DoserError;

/// Placeholder flow estimate (mg/s) until the doser is calibrated.
pub const DEFAULT_FLOW_RATE_MG_PER_S: f64 = 2.0;

/// Material flow of the solid doser in mg/s. Always finite and > 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowRate(f64);

impl Default for FlowRate {
    fn default() -> Self {
        Self(DEFAULT_FLOW_RATE_MG_PER_S)
    }
}

impl FlowRate {
    pub fn new(mg_per_s: f64) -> Result<Self, DoserError> {
        if !(mg_per_s.is_finite() && mg_per_s > 0.0) {
            return Err(DoserError::Config(format!(
                "flow rate must be > 0 mg/s, got {mg_per_s}"
            )));
        }
        Ok(Self(mg_per_s))
    }

    #[inline]
    pub fn mg_per_s(self) -> f64 {
        self.0
    }

    /// Dispense time needed for `target_mg` at this flow rate.
    pub fn estimate_duration(self, target_mg: f64) -> Result<Duration, DoserError> {
        if !(target_mg.is_finite() && target_mg > 0.0) {
            return Err(DoserError::InvalidTarget(target_mg));
        }
        let secs = target_mg / self.0;
        let duration =
            Duration::try_from_secs_f64(secs).map_err(|_| DoserError::InvalidTarget(target_mg))?;
        debug!(
            target_mg,
            flow_mg_per_s = self.0,
            duration_s = secs,
            "dispense duration estimate"
        );
        Ok(duration)
    }
}

impl fmt::Display for FlowRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} mg/s", self.0)
    }
}
