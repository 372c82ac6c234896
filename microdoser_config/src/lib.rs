#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas, well-target CSV parsing and persisted flow calibration.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Every section has defaults, so an empty file is a valid config.
//! - Well-target CSV loader enforces headers and keeps file order.
//! - `FlowCalibrationFile` is the on-disk form of a flow-rate calibration.
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BalanceCfg {
    /// Serial port of the precision balance
    pub port: String,
}

impl Default for BalanceCfg {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB1".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoaderCfg {
    /// Plate type understood by the loader ("shallow_plate", "deep_well", ...)
    pub plate_type: String,
    /// Extra loader parameters passed through untouched
    pub params: toml::Table,
}

impl Default for LoaderCfg {
    fn default() -> Self {
        Self {
            plate_type: "shallow_plate".to_string(),
            params: toml::Table::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CncCfg {
    pub port: String,
}

impl Default for CncCfg {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DoserCfg {
    pub i2c_address: u8,
    pub motor_gpio_pin: u8,
    /// Servo PWM frequency (Hz)
    pub frequency: u32,
    /// Gate opening used when a dose does not name one (degrees, 0..=180)
    pub default_gate_position: Option<f64>,
}

impl Default for DoserCfg {
    fn default() -> Self {
        Self {
            i2c_address: 0x40,
            motor_gpio_pin: 17,
            frequency: 50,
            default_gate_position: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlateFormat {
    #[default]
    #[serde(rename = "96", alias = "96-well")]
    Well96,
    #[serde(rename = "384", alias = "384-well")]
    Well384,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlateCfg {
    pub format: PlateFormat,
    /// Center-to-center well pitch in mm
    pub well_spacing_mm: f64,
    /// XY of well A1 in machine coordinates (mm)
    pub origin_mm: [f64; 2],
    /// Reject wells outside the declared format instead of moving there anyway
    pub strict_bounds: bool,
}

impl Default for PlateCfg {
    fn default() -> Self {
        Self {
            format: PlateFormat::Well96,
            well_spacing_mm: 9.0,
            origin_mm: [0.0, 0.0],
            strict_bounds: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DosingCfg {
    /// Attach the CNC dosing system; false runs a plain weighing station
    pub enabled: bool,
    /// Uncalibrated flow estimate; a calibration file overrides it
    pub flow_rate_mg_per_s: f64,
}

impl Default for DosingCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            flow_rate_mg_per_s: 2.0,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Hardware {
    /// Use real drivers when the binary was built with them
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub balance: BalanceCfg,
    pub loader: LoaderCfg,
    pub cnc: CncCfg,
    pub doser: DoserCfg,
    pub plate: PlateCfg,
    pub dosing: DosingCfg,
    pub logging: Logging,
    pub hardware: Hardware,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Plate geometry
        if !(self.plate.well_spacing_mm.is_finite() && self.plate.well_spacing_mm > 0.0) {
            eyre::bail!("plate.well_spacing_mm must be > 0");
        }
        if !self.plate.origin_mm.iter().all(|v| v.is_finite()) {
            eyre::bail!("plate.origin_mm must be finite");
        }

        // Dosing
        if !(self.dosing.flow_rate_mg_per_s.is_finite() && self.dosing.flow_rate_mg_per_s > 0.0) {
            eyre::bail!("dosing.flow_rate_mg_per_s must be > 0");
        }

        // Doser wiring
        if self.doser.frequency == 0 {
            eyre::bail!("doser.frequency must be > 0");
        }
        if self.doser.i2c_address > 0x7F {
            eyre::bail!("doser.i2c_address must be a 7-bit address (<= 0x7f)");
        }
        if let Some(g) = self.doser.default_gate_position
            && !(0.0..=180.0).contains(&g)
        {
            eyre::bail!("doser.default_gate_position must be in [0, 180]");
        }

        // Ports
        if self.balance.port.trim().is_empty() {
            eyre::bail!("balance.port must not be empty");
        }
        if self.dosing.enabled && self.cnc.port.trim().is_empty() {
            eyre::bail!("cnc.port must not be empty when dosing is enabled");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got '{r}'");
        }

        Ok(())
    }
}

/// Well-target CSV schema.
///
/// Expected headers:
/// well,target_mg
///
/// Example:
/// well,target_mg
/// A1,5.0
/// B3,2.5
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WellTargetRow {
    pub well: String,
    pub target_mg: f64,
}

/// Read well targets from any reader, keeping row order.
pub fn read_targets_csv<R: std::io::Read>(reader: R) -> eyre::Result<Vec<WellTargetRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers: {}", e))?
        .clone();
    let expected = ["well", "target_mg"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "targets CSV must have headers 'well,target_mg', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<WellTargetRow>().enumerate() {
        match rec {
            Ok(row) if row.well.is_empty() => {
                eyre::bail!("invalid CSV row {}: empty well", idx + 2);
            }
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    if rows.is_empty() {
        eyre::bail!("targets CSV has no rows");
    }
    Ok(rows)
}

pub fn load_targets_csv(path: &Path) -> eyre::Result<Vec<WellTargetRow>> {
    let file = std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("open targets CSV {:?}: {}", path, e))?;
    read_targets_csv(file)
}

/// Persisted flow-rate calibration, preferred at runtime over
/// `dosing.flow_rate_mg_per_s` when supplied.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct FlowCalibrationFile {
    pub flow_rate_mg_per_s: f64,
    /// Dispense duration used to measure the flow
    pub duration_s: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_position: Option<f64>,
    pub measured_mg: f64,
}

impl FlowCalibrationFile {
    pub fn validate(&self) -> eyre::Result<()> {
        if !(self.flow_rate_mg_per_s.is_finite() && self.flow_rate_mg_per_s > 0.0) {
            eyre::bail!("calibration flow_rate_mg_per_s must be > 0");
        }
        if !(self.duration_s.is_finite() && self.duration_s > 0.0) {
            eyre::bail!("calibration duration_s must be > 0");
        }
        Ok(())
    }

    pub fn to_toml(&self) -> eyre::Result<String> {
        toml::to_string(self).map_err(|e| eyre::eyre!("serialize calibration: {}", e))
    }
}

pub fn load_calibration(path: &Path) -> eyre::Result<FlowCalibrationFile> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("open calibration {:?}: {}", path, e))?;
    let cal: FlowCalibrationFile =
        toml::from_str(&text).map_err(|e| eyre::eyre!("parse calibration {:?}: {}", path, e))?;
    cal.validate()?;
    Ok(cal)
}
