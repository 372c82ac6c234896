use std::fmt;

use microdoser_traits::DriverError;
use thiserror::Error;

use crate::well::PlateFormat;

/// Device a driver call was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Balance,
    PlateLoader,
    Cnc,
    SolidDoser,
    Operator,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Device::Balance => "balance",
            Device::PlateLoader => "plate loader",
            Device::Cnc => "cnc",
            Device::SolidDoser => "solid doser",
            Device::Operator => "operator prompt",
        })
    }
}

#[derive(Debug, Error)]
pub enum DoserError {
    #[error("no dosing system attached")]
    NoDosingSystem,
    #[error("invalid well identifier '{0}'")]
    InvalidWellFormat(String),
    #[error("invalid target mass {0} mg (must be > 0)")]
    InvalidTarget(f64),
    #[error("well {well} is outside a {format} plate")]
    WellOutOfRange { well: String, format: PlateFormat },
    #[error("{0} not initialized")]
    NotInitialized(&'static str),
    #[error("{device} timed out")]
    Timeout { device: Device },
    #[error("{device} driver error: {source}")]
    Driver {
        device: Device,
        #[source]
        source: DriverError,
    },
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing balance")]
    MissingBalance,
    #[error("missing plate loader")]
    MissingLoader,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
