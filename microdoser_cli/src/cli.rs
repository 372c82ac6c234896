//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "microdoser", version, about = "Gravimetric microplate dosing station")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/microdoser.toml")]
    pub config: PathBuf,

    /// Flow-rate calibration TOML written by `calibrate --save`; overrides
    /// dosing.flow_rate_mg_per_s
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Print results and errors as JSON, and log as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); falls back to logging.level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Run as a weighing-only station even if dosing is enabled in the config
    #[arg(long = "no-dosing", action = ArgAction::SetTrue)]
    pub no_dosing: bool,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// A `WELL=MG` pair given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct WellTarget {
    pub well: String,
    pub target_mg: f64,
}

pub fn parse_well_target(s: &str) -> Result<WellTarget, String> {
    let (well, mg) = s
        .split_once('=')
        .ok_or_else(|| format!("expected WELL=MG, got '{s}'"))?;
    let target_mg = mg
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad target in '{s}': {e}"))?;
    Ok(WellTarget {
        well: well.trim().to_string(),
        target_mg,
    })
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct PlateSource {
    /// CSV with headers `well,target_mg`
    #[arg(long, value_name = "FILE")]
    pub targets: Option<PathBuf>,
    /// Inline targets, e.g. `--well A1=5.0 --well A2=3.0`
    #[arg(long = "well", value_name = "WELL=MG", value_parser = parse_well_target)]
    pub wells: Vec<WellTarget>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a plate, dose one well, unload
    Dose {
        /// Well identifier, e.g. A1
        #[arg(long)]
        well: String,
        /// Target mass in milligrams
        #[arg(long = "target-mg", value_name = "MG", allow_negative_numbers = true)]
        target_mg: f64,
        /// Skip the before/after balance readings
        #[arg(long = "no-verify", action = ArgAction::SetTrue)]
        no_verify: bool,
        /// Gate opening for this dose (degrees)
        #[arg(long, value_name = "POS")]
        gate: Option<f64>,
    },
    /// Load a plate, dose every listed well in order, unload
    Plate {
        #[command(flatten)]
        source: PlateSource,
        /// Skip the before/after balance readings
        #[arg(long = "no-verify", action = ArgAction::SetTrue)]
        no_verify: bool,
    },
    /// Load a plate, weigh the listed wells, unload
    Weigh {
        /// Wells to weigh, in order
        #[arg(long = "well", value_name = "WELL", required = true)]
        wells: Vec<String>,
        /// Do not wait for the operator to confirm positioning
        #[arg(long, action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Measure the doser flow rate with one timed dispense
    Calibrate {
        /// Dispense duration in seconds
        #[arg(long, value_name = "SECONDS", default_value_t = 5.0)]
        duration: f64,
        /// Gate opening during the calibration dispense (degrees)
        #[arg(long, value_name = "POS")]
        gate: Option<f64>,
        /// Dose this many mg with the new flow rate and report the error
        #[arg(long = "verify-mg", value_name = "MG")]
        verify_mg: Option<f64>,
        /// Well used for the verification dose
        #[arg(long = "verify-well", value_name = "WELL", default_value = "A1")]
        verify_well: String,
        /// Write the calibration TOML here (atomically)
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },
    /// Print station status
    Status,
    /// Home every device and check the loader reports no fault
    SelfCheck,
}
