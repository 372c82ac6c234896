//! Dosing orchestrator: turns a (well, target mass) request into CNC motion
//! and one timed, open-loop dispense.

use std::time::Duration;

use microdoser_traits::{Cnc, SolidDoser};
use tracing::{info, warn};

use crate::config::DosingCfg;
use crate::error::{Device, DoserError, Result};
use crate::flow::FlowRate;
use crate::hw_error::DriverResultExt;
use crate::well::PlateFormat;

/// Anything that can position over a well and put material into it.
///
/// The station only talks to this trait, so a pipetting robot or a manual
/// workflow can stand in for the CNC + solid doser pair.
pub trait DosingSystem {
    /// Short human-readable name for logs and status output.
    fn name(&self) -> &'static str;
    fn position_at_well(&mut self, well: &str) -> Result<()>;
    /// Position over `well` and dispense `target_mg` open-loop.
    fn dose_to_well(&mut self, well: &str, target_mg: f64, gate_position: Option<f64>)
    -> Result<()>;
    /// One raw timed dispense at the current position, for flow calibration.
    fn calibrate_flow_rate(&mut self, duration: Duration, gate_position: Option<f64>)
    -> Result<()>;
    fn set_flow_rate(&mut self, flow_rate: FlowRate);
    fn home(&mut self) -> Result<()>;
    fn shutdown(&mut self) -> Result<()>;
}

/// CNC gantry carrying a solid doser.
///
/// Created unconfigured; `initialize` hands over the drivers and homes them.
/// `home` and `shutdown` are safe on a system that was never (or only
/// partially) initialized.
pub struct CncDosingSystem {
    cfg: DosingCfg,
    cnc: Option<Box<dyn Cnc>>,
    doser: Option<Box<dyn SolidDoser>>,
}

impl core::fmt::Debug for CncDosingSystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CncDosingSystem")
            .field("cfg", &self.cfg)
            .field("cnc", &self.cnc.is_some())
            .field("doser", &self.doser.is_some())
            .finish()
    }
}

impl CncDosingSystem {
    pub fn new(cfg: DosingCfg) -> Self {
        info!(
            cnc_port = %cfg.cnc_port,
            spacing_mm = cfg.geometry.spacing_mm(),
            origin_x_mm = cfg.geometry.origin_mm().0,
            origin_y_mm = cfg.geometry.origin_mm().1,
            flow = %cfg.flow_rate,
            "cnc dosing system configured"
        );
        Self {
            cfg,
            cnc: None,
            doser: None,
        }
    }

    /// Take ownership of the drivers and home both, CNC first.
    ///
    /// Drivers are kept even when homing fails, so `shutdown` still releases them.
    pub fn initialize(
        &mut self,
        cnc: impl Cnc + 'static,
        doser: impl SolidDoser + 'static,
    ) -> Result<()> {
        info!("initializing cnc dosing system");
        self.cnc = Some(Box::new(cnc));
        self.doser = Some(Box::new(doser));
        self.cnc()?.home().via(Device::Cnc)?;
        self.doser()?.home().via(Device::SolidDoser)?;
        info!("cnc dosing system ready");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.cnc.is_some() && self.doser.is_some()
    }

    pub fn config(&self) -> &DosingCfg {
        &self.cfg
    }

    pub fn flow_rate(&self) -> FlowRate {
        self.cfg.flow_rate
    }

    /// Map a well id to XY (mm) for the given plate format.
    pub fn well_to_coords(
        &self,
        well: &str,
        plate_format: PlateFormat,
    ) -> std::result::Result<(f64, f64), DoserError> {
        self.cfg.geometry.well_to_coords(well, plate_format)
    }

    /// Dispense time for `target_mg` at the current flow estimate.
    pub fn estimate_duration(&self, target_mg: f64) -> std::result::Result<Duration, DoserError> {
        self.cfg.flow_rate.estimate_duration(target_mg)
    }

    fn cnc(&mut self) -> Result<&mut Box<dyn Cnc>> {
        self.cnc
            .as_mut()
            .ok_or_else(|| eyre::Report::new(DoserError::NotInitialized("cnc")))
    }

    fn doser(&mut self) -> Result<&mut Box<dyn SolidDoser>> {
        self.doser
            .as_mut()
            .ok_or_else(|| eyre::Report::new(DoserError::NotInitialized("solid doser")))
    }

    fn move_to_well(&mut self, well: &str) -> Result<()> {
        let (x, y) = self.well_to_coords(well, self.cfg.plate_format)?;
        info!(well, x_mm = x, y_mm = y, "positioning at well");
        self.cnc()?.move_to(x, y).via(Device::Cnc)
    }
}

impl DosingSystem for CncDosingSystem {
    fn name(&self) -> &'static str {
        "cnc solid doser"
    }

    fn position_at_well(&mut self, well: &str) -> Result<()> {
        self.move_to_well(well)
    }

    fn dose_to_well(
        &mut self,
        well: &str,
        target_mg: f64,
        gate_position: Option<f64>,
    ) -> Result<()> {
        info!(well, target_mg, "dosing to well");
        // Validate before anything moves.
        let duration = self.estimate_duration(target_mg)?;
        self.well_to_coords(well, self.cfg.plate_format)?;
        self.doser()?;

        self.move_to_well(well)?;
        let gate = gate_position.or(self.cfg.default_gate_position);
        self.doser()?
            .dispense(duration, gate)
            .via(Device::SolidDoser)?;
        info!(well, duration_s = duration.as_secs_f64(), "dose complete");
        Ok(())
    }

    fn calibrate_flow_rate(
        &mut self,
        duration: Duration,
        gate_position: Option<f64>,
    ) -> Result<()> {
        info!(
            duration_s = duration.as_secs_f64(),
            gate = ?gate_position,
            "calibration dispense"
        );
        self.doser()?
            .dispense(duration, gate_position)
            .via(Device::SolidDoser)
    }

    fn set_flow_rate(&mut self, flow_rate: FlowRate) {
        info!(old = %self.cfg.flow_rate, new = %flow_rate, "flow rate updated");
        self.cfg.flow_rate = flow_rate;
    }

    fn home(&mut self) -> Result<()> {
        info!("homing cnc dosing system");
        if let Some(cnc) = self.cnc.as_mut() {
            cnc.home().via(Device::Cnc)?;
        }
        if let Some(doser) = self.doser.as_mut() {
            doser.home().via(Device::SolidDoser)?;
        }
        Ok(())
    }

    /// Release the doser, then disconnect the CNC. Both are attempted even if
    /// the first fails; the first error is returned. A driver is dropped only
    /// once it shut down cleanly, so a second call retries the failed ones and
    /// does nothing otherwise.
    fn shutdown(&mut self) -> Result<()> {
        info!("shutting down cnc dosing system");
        let doser_res = match self.doser.as_mut() {
            Some(d) => d.shutdown().via(Device::SolidDoser),
            None => Ok(()),
        };
        if doser_res.is_ok() {
            self.doser = None;
        }
        let cnc_res = match self.cnc.as_mut() {
            Some(c) => c.disconnect().via(Device::Cnc),
            None => Ok(()),
        };
        if cnc_res.is_ok() {
            self.cnc = None;
        }
        if let Err(e) = &cnc_res
            && doser_res.is_err()
        {
            warn!(error = %e, "cnc disconnect also failed");
        }
        doser_res.and(cnc_res)?;
        info!("cnc dosing system shutdown complete");
        Ok(())
    }
}
