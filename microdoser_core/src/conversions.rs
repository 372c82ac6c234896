//! Conversions bridging `microdoser_config` types to `microdoser_core` types.
//!
//! Geometry and flow values are re-validated here, so a `Config` that skipped
//! `validate()` still cannot produce a zero pitch or a zero flow rate.

use std::time::Duration;

use crate::calibration::FlowCalibration;
use crate::config::DosingCfg;
use crate::error::DoserError;
use crate::flow::FlowRate;
use crate::geometry::PlateGeometry;
use crate::well::PlateFormat;

// ── PlateFormat ──────────────────────────────────────────────────────────────

impl From<microdoser_config::PlateFormat> for PlateFormat {
    fn from(f: microdoser_config::PlateFormat) -> Self {
        match f {
            microdoser_config::PlateFormat::Well96 => PlateFormat::Well96,
            microdoser_config::PlateFormat::Well384 => PlateFormat::Well384,
        }
    }
}

// ── PlateGeometry ────────────────────────────────────────────────────────────

impl TryFrom<&microdoser_config::PlateCfg> for PlateGeometry {
    type Error = DoserError;

    fn try_from(c: &microdoser_config::PlateCfg) -> Result<Self, Self::Error> {
        let [x0, y0] = c.origin_mm;
        Ok(PlateGeometry::new((x0, y0), c.well_spacing_mm)?.with_strict_bounds(c.strict_bounds))
    }
}

// ── DosingCfg ────────────────────────────────────────────────────────────────

impl TryFrom<&microdoser_config::Config> for DosingCfg {
    type Error = DoserError;

    fn try_from(c: &microdoser_config::Config) -> Result<Self, Self::Error> {
        Ok(Self {
            geometry: PlateGeometry::try_from(&c.plate)?,
            plate_format: c.plate.format.into(),
            flow_rate: FlowRate::new(c.dosing.flow_rate_mg_per_s)?,
            default_gate_position: c.doser.default_gate_position,
            cnc_port: c.cnc.port.clone(),
        })
    }
}

// ── Flow calibration ─────────────────────────────────────────────────────────

impl From<&FlowCalibration> for microdoser_config::FlowCalibrationFile {
    fn from(c: &FlowCalibration) -> Self {
        Self {
            flow_rate_mg_per_s: c.flow_rate().mg_per_s(),
            duration_s: c.duration().as_secs_f64(),
            gate_position: c.gate_position(),
            measured_mg: c.measured_mg(),
        }
    }
}

impl TryFrom<&microdoser_config::FlowCalibrationFile> for FlowCalibration {
    type Error = DoserError;

    fn try_from(f: &microdoser_config::FlowCalibrationFile) -> Result<Self, Self::Error> {
        let duration = Duration::try_from_secs_f64(f.duration_s)
            .map_err(|_| DoserError::Config(format!("invalid calibration duration {}", f.duration_s)))?;
        FlowCalibration::from_measurement(duration, f.gate_position, f.measured_mg)
    }
}

/// Uses the stored rate, not one recomputed from the measurement.
impl TryFrom<&microdoser_config::FlowCalibrationFile> for FlowRate {
    type Error = DoserError;

    fn try_from(f: &microdoser_config::FlowCalibrationFile) -> Result<Self, Self::Error> {
        FlowRate::new(f.flow_rate_mg_per_s)
    }
}
