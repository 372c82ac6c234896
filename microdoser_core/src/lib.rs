#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Gravimetric microplate dosing (hardware-agnostic).
//!
//! All hardware goes through the driver traits in `microdoser_traits`
//! (`Balance`, `PlateLoader`, `Cnc`, `SolidDoser`, `OperatorPrompt`).
//!
//! ## Architecture
//!
//! - **Wells**: identifier parsing and plate formats (`well` module)
//! - **Geometry**: well → XY mapping on the CNC bed (`geometry` module)
//! - **Flow**: open-loop duration estimate from a flow rate (`flow` module)
//! - **Dosing**: `DosingSystem` trait and the CNC + solid doser implementation
//! - **Station**: load / weigh / dose / verify / unload around a balance
//! - **Calibration**: flow-rate measurement from a timed dispense
//!
//! There is no feedback control: a dose is one timed dispense, and the balance
//! readings around it are reported, never acted on.

pub mod atomic;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod dosing;
pub mod error;
pub mod flow;
pub mod geometry;
pub mod hw_error;
pub mod mocks;
pub mod station;
pub mod util;
pub mod well;

pub use builder::StationBuilder;
pub use calibration::FlowCalibration;
pub use config::{DoseOptions, DosingCfg};
pub use dosing::{CncDosingSystem, DosingSystem};
pub use error::{BuildError, Device, DoserError, Report, Result};
pub use flow::FlowRate;
pub use geometry::PlateGeometry;
pub use station::{DoseResult, PlateResults, Station, SystemStatus};
pub use well::{PlateFormat, Well};

pub use microdoser_traits::{HardwareAvailable, LoaderStatus};
