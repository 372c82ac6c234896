//! Device backends for the microdoser station.
//!
//! The simulated bench is always available. Real Raspberry Pi drivers are
//! compiled in with the `hardware` feature on Linux.
pub mod error;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod pi_doser;

pub use error::HwError;
pub use microdoser_traits::HardwareAvailable;
pub use sim::{SimBalance, SimBench, SimCnc, SimDevice, SimPlateLoader, SimSolidDoser};

/// Resolve once, at start-up, whether real drivers were compiled in.
pub fn probe() -> HardwareAvailable {
    let available = cfg!(all(feature = "hardware", target_os = "linux"));
    tracing::debug!(available, "hardware probe");
    HardwareAvailable(available)
}
