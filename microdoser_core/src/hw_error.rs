//! Maps `Box<dyn Error>` from driver trait boundaries to typed `DoserError`.
//!
//! The traits in `microdoser_traits` use `Box<dyn Error + Send + Sync>` so any
//! vendor driver can be plugged in; this module wraps those errors with the
//! device they came from. Timeouts are recognised by type: `io::ErrorKind::TimedOut`
//! always, `microdoser_hardware::HwError::Timeout` behind a feature.

use microdoser_traits::{DriverError, DriverResult};

use crate::error::{Device, DoserError};

/// Map a driver error to a typed `DoserError`, keeping the original as source.
pub fn map_hw_error(device: Device, e: DriverError) -> DoserError {
    // Feature-gated: try to downcast to HwError for precise mapping
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(microdoser_hardware::HwError::Timeout) =
            e.downcast_ref::<microdoser_hardware::HwError>()
        {
            return DoserError::Timeout { device };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>()
        && io.kind() == std::io::ErrorKind::TimedOut
    {
        return DoserError::Timeout { device };
    }

    DoserError::Driver { device, source: e }
}

/// Attach the originating device to a driver result.
pub(crate) trait DriverResultExt<T> {
    fn via(self, device: Device) -> crate::Result<T>;
}

impl<T> DriverResultExt<T> for DriverResult<T> {
    #[inline]
    fn via(self, device: Device) -> crate::Result<T> {
        self.map_err(|e| eyre::Report::new(map_hw_error(device, e)))
    }
}
