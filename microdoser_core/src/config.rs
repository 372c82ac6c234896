//! Runtime configuration for the dosing orchestrator.
//!
//! These are separate from the TOML-deserialized config in `microdoser_config`;
//! see `conversions` for the mapping.

use crate::flow::FlowRate;
use crate::geometry::PlateGeometry;
use crate::well::PlateFormat;

/// CNC dosing parameters.
#[derive(Debug, Clone)]
pub struct DosingCfg {
    /// Where the plate sits on the CNC bed.
    pub geometry: PlateGeometry,
    /// Declared plate layout; only enforced when `geometry` has strict bounds.
    pub plate_format: PlateFormat,
    /// Flow estimate used to turn a target mass into a dispense duration.
    pub flow_rate: FlowRate,
    /// Gate opening passed to the doser when a dose does not name one.
    pub default_gate_position: Option<f64>,
    /// Informational; the CNC driver owns the port itself.
    pub cnc_port: String,
}

impl Default for DosingCfg {
    fn default() -> Self {
        Self {
            geometry: PlateGeometry::default(),
            plate_format: PlateFormat::Well96,
            flow_rate: FlowRate::default(),
            default_gate_position: None,
            cnc_port: "/dev/ttyUSB0".to_string(),
        }
    }
}

/// Per-dose options of `Station::dose_to_well`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoseOptions {
    /// Read the balance before and after dispensing.
    pub verify: bool,
    /// Gate opening for this dose; falls back to the configured default.
    pub gate_position: Option<f64>,
}

impl Default for DoseOptions {
    fn default() -> Self {
        Self {
            verify: true,
            gate_position: None,
        }
    }
}

impl DoseOptions {
    pub fn unverified() -> Self {
        Self {
            verify: false,
            ..Self::default()
        }
    }

    pub fn with_gate(mut self, gate_position: f64) -> Self {
        self.gate_position = Some(gate_position);
        self
    }
}
