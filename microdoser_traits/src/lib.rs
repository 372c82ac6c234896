//! Driver contracts consumed by the dosing and station orchestrators.
//!
//! Every device the station talks to sits behind one of these traits. Driver
//! failures cross the boundary as boxed errors so that any vendor library can
//! be wrapped without this crate knowing about it.
pub mod clock;

use std::fmt;
use std::time::Duration;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Error type returned by every driver call.
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;
/// Result alias for driver calls.
pub type DriverResult<T> = Result<T, DriverError>;

/// Precision balance. Readings are in grams.
pub trait Balance {
    fn tare(&mut self) -> DriverResult<()>;
    fn weigh(&mut self) -> DriverResult<f64>;
}

/// Automated plate loader that moves a microplate on and off the balance pan.
pub trait PlateLoader {
    fn load_plate(&mut self) -> DriverResult<()>;
    fn unload_plate(&mut self) -> DriverResult<()>;
    fn home(&mut self) -> DriverResult<()>;
    fn get_status(&mut self) -> DriverResult<LoaderStatus>;
    /// Release actuators. Defaults to a no-op for loaders without power control.
    fn shutdown(&mut self) -> DriverResult<()> {
        Ok(())
    }
}

/// XY gantry that positions the dispense head.
pub trait Cnc {
    fn home(&mut self) -> DriverResult<()>;
    /// Absolute move in millimeters.
    fn move_to(&mut self, x_mm: f64, y_mm: f64) -> DriverResult<()>;
    fn disconnect(&mut self) -> DriverResult<()>;
}

/// Timed solid-material dispenser.
pub trait SolidDoser {
    fn home(&mut self) -> DriverResult<()>;
    /// Open the gate (optionally to `gate_position`, driver default otherwise)
    /// and run the feed for `duration`. Blocks until the dispense is over.
    fn dispense(&mut self, duration: Duration, gate_position: Option<f64>) -> DriverResult<()>;
    fn shutdown(&mut self) -> DriverResult<()>;
}

/// Human in the loop: used when no dosing system can position over a well.
pub trait OperatorPrompt {
    /// Block until the operator confirms the measurement device sits over `well`.
    fn confirm_position(&mut self, well: &str) -> DriverResult<()>;
}

impl<T: Balance + ?Sized> Balance for Box<T> {
    fn tare(&mut self) -> DriverResult<()> {
        (**self).tare()
    }
    fn weigh(&mut self) -> DriverResult<f64> {
        (**self).weigh()
    }
}

impl<T: PlateLoader + ?Sized> PlateLoader for Box<T> {
    fn load_plate(&mut self) -> DriverResult<()> {
        (**self).load_plate()
    }
    fn unload_plate(&mut self) -> DriverResult<()> {
        (**self).unload_plate()
    }
    fn home(&mut self) -> DriverResult<()> {
        (**self).home()
    }
    fn get_status(&mut self) -> DriverResult<LoaderStatus> {
        (**self).get_status()
    }
    fn shutdown(&mut self) -> DriverResult<()> {
        (**self).shutdown()
    }
}

impl<T: Cnc + ?Sized> Cnc for Box<T> {
    fn home(&mut self) -> DriverResult<()> {
        (**self).home()
    }
    fn move_to(&mut self, x_mm: f64, y_mm: f64) -> DriverResult<()> {
        (**self).move_to(x_mm, y_mm)
    }
    fn disconnect(&mut self) -> DriverResult<()> {
        (**self).disconnect()
    }
}

impl<T: SolidDoser + ?Sized> SolidDoser for Box<T> {
    fn home(&mut self) -> DriverResult<()> {
        (**self).home()
    }
    fn dispense(&mut self, duration: Duration, gate_position: Option<f64>) -> DriverResult<()> {
        (**self).dispense(duration, gate_position)
    }
    fn shutdown(&mut self) -> DriverResult<()> {
        (**self).shutdown()
    }
}

/// Position reported by a plate loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderStatus {
    /// Not homed since power-up.
    Unknown,
    Homed,
    /// Plate sits on the balance.
    Loaded,
    /// Plate retracted from the balance.
    Unloaded,
    Fault(String),
}

impl fmt::Display for LoaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderStatus::Unknown => f.write_str("unknown"),
            LoaderStatus::Homed => f.write_str("homed"),
            LoaderStatus::Loaded => f.write_str("loaded"),
            LoaderStatus::Unloaded => f.write_str("unloaded"),
            LoaderStatus::Fault(msg) => write!(f, "fault: {msg}"),
        }
    }
}

/// Whether real device drivers are usable in this process.
///
/// Resolved once at start-up and handed to the orchestrators; nothing
/// inspects global state to find out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardwareAvailable(pub bool);

impl HardwareAvailable {
    #[inline]
    pub fn get(self) -> bool {
        self.0
    }
}
