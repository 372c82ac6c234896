//! Station orchestrator: balance + plate loader + optional dosing system.
//!
//! Sequences load / weigh / dose / verify / unload. Every call blocks until
//! the drivers return; nothing is retried. Driver failures propagate with the
//! device attached (see `hw_error`).

use std::time::Duration;

use microdoser_traits::{Balance, HardwareAvailable, LoaderStatus, OperatorPrompt, PlateLoader};
use tracing::{debug, info, warn};

use crate::calibration::FlowCalibration;
use crate::config::DoseOptions;
use crate::dosing::DosingSystem;
use crate::error::{Device, DoserError, Result};
use crate::flow::FlowRate;
use crate::hw_error::DriverResultExt;
use crate::util::{ACCEPTABLE_ERROR_PCT, error_pct, grams_to_mg};
use crate::well::Well;

/// Outcome of one `dose_to_well` call. `well` is the canonical id ("A1"),
/// whatever spelling the caller used. Mass fields are only filled in when
/// the dose was verified on the balance.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseResult {
    pub well: String,
    pub target_mg: f64,
    pub initial_mg: Option<f64>,
    pub final_mg: Option<f64>,
    pub actual_mg: Option<f64>,
    pub error_mg: Option<f64>,
}

impl DoseResult {
    fn unverified(well: &str, target_mg: f64) -> Self {
        Self {
            well: well.to_string(),
            target_mg,
            initial_mg: None,
            final_mg: None,
            actual_mg: None,
            error_mg: None,
        }
    }

    /// Build a verified result from balance readings in milligrams.
    pub fn verified(well: &str, target_mg: f64, initial_mg: f64, final_mg: f64) -> Self {
        let actual_mg = final_mg - initial_mg;
        Self {
            well: well.to_string(),
            target_mg,
            initial_mg: Some(initial_mg),
            final_mg: Some(final_mg),
            actual_mg: Some(actual_mg),
            error_mg: Some(actual_mg - target_mg),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.error_mg.is_some()
    }

    /// Signed error in percent of the target; `None` when unverified.
    pub fn error_pct(&self) -> Option<f64> {
        self.error_mg.map(|e| error_pct(e, self.target_mg))
    }
}

/// Per-well results of `dose_plate`, in dosing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlateResults {
    results: Vec<DoseResult>,
    interrupted: bool,
}

impl PlateResults {
    /// Result for `well`; the last one if the well was dosed more than once.
    pub fn get(&self, well: &str) -> Option<&DoseResult> {
        self.results.iter().rev().find(|r| r.well == well)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DoseResult> {
        self.results.iter()
    }

    pub fn wells(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|r| r.well.as_str())
    }

    /// True when a stop request ended the run before every well was dosed.
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }
}

impl IntoIterator for PlateResults {
    type Item = DoseResult;
    type IntoIter = std::vec::IntoIter<DoseResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a PlateResults {
    type Item = &'a DoseResult;
    type IntoIter = std::slice::Iter<'a, DoseResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Snapshot returned by `Station::get_status`.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatus {
    pub plate_loaded: bool,
    pub balance_connected: bool,
    pub dosing_system_connected: bool,
    pub hardware_available: bool,
    pub loader_status: LoaderStatus,
}

/// A gravimetric dosing station. Build one with [`crate::StationBuilder`].
pub struct Station {
    pub(crate) balance: Box<dyn Balance>,
    pub(crate) loader: Box<dyn PlateLoader>,
    pub(crate) dosing: Option<Box<dyn DosingSystem>>,
    pub(crate) prompt: Box<dyn OperatorPrompt>,
    pub(crate) hardware: HardwareAvailable,
    pub(crate) plate_type: String,
    pub(crate) plate_loaded: bool,
    pub(crate) shut_down: bool,
}

impl core::fmt::Debug for Station {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Station")
            .field("plate_type", &self.plate_type)
            .field("plate_loaded", &self.plate_loaded)
            .field("dosing", &self.dosing.as_ref().map(|d| d.name()))
            .field("hardware", &self.hardware)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}

impl Station {
    pub fn builder() -> crate::builder::StationBuilder<crate::builder::Missing, crate::builder::Missing>
    {
        crate::builder::StationBuilder::default()
    }

    pub fn plate_loaded(&self) -> bool {
        self.plate_loaded
    }

    pub fn plate_type(&self) -> &str {
        &self.plate_type
    }

    pub fn hardware(&self) -> HardwareAvailable {
        self.hardware
    }

    pub fn has_dosing_system(&self) -> bool {
        self.dosing.is_some()
    }

    pub fn dosing_system_name(&self) -> Option<&'static str> {
        self.dosing.as_ref().map(|d| d.name())
    }

    fn dosing_mut(&mut self) -> Result<&mut Box<dyn DosingSystem>> {
        self.dosing
            .as_mut()
            .ok_or_else(|| eyre::Report::new(DoserError::NoDosingSystem))
    }

    /// Move the plate onto the balance and tare with the plate present, so
    /// later readings are relative to the empty plate.
    pub fn load_plate(&mut self) -> Result<()> {
        info!(plate_type = %self.plate_type, "loading plate");
        self.loader.load_plate().via(Device::PlateLoader)?;
        self.plate_loaded = true;
        self.balance.tare().via(Device::Balance)?;
        info!("plate loaded and balance tared");
        Ok(())
    }

    pub fn unload_plate(&mut self) -> Result<()> {
        info!("unloading plate");
        self.loader.unload_plate().via(Device::PlateLoader)?;
        self.plate_loaded = false;
        Ok(())
    }

    /// Raw balance reading in grams.
    pub fn read_balance(&mut self) -> Result<f64> {
        let g = self.balance.weigh().via(Device::Balance)?;
        debug!(grams = g, "balance reading");
        Ok(g)
    }

    pub fn tare_balance(&mut self) -> Result<()> {
        info!("taring balance");
        self.balance.tare().via(Device::Balance)
    }

    /// Position over `well` (or have the operator do it) and read the balance.
    pub fn weigh_well(&mut self, well: &str) -> Result<f64> {
        Well::parse(well)?;
        match self.dosing.as_mut() {
            Some(dosing) => dosing.position_at_well(well)?,
            None => {
                info!(well, "waiting for operator to position over well");
                self.prompt.confirm_position(well).via(Device::Operator)?;
            }
        }
        let g = self.read_balance()?;
        info!(well, grams = g, "well weighed");
        Ok(g)
    }

    /// Dose `target_mg` into `well`, optionally bracketing the dispense with
    /// balance readings.
    ///
    /// Fails with `NoDosingSystem` before any driver is touched when the
    /// station has no dosing system.
    pub fn dose_to_well(
        &mut self,
        well: &str,
        target_mg: f64,
        opts: DoseOptions,
    ) -> Result<DoseResult> {
        self.dosing_mut()?;
        if !(target_mg.is_finite() && target_mg > 0.0) {
            return Err(DoserError::InvalidTarget(target_mg).into());
        }
        let well = Well::parse(well)?.to_string();
        let well = well.as_str();

        info!(well, target_mg, verify = opts.verify, "dose requested");
        let initial_mg = if opts.verify {
            Some(grams_to_mg(self.read_balance()?))
        } else {
            None
        };

        self.dosing_mut()?
            .dose_to_well(well, target_mg, opts.gate_position)?;

        let Some(initial_mg) = initial_mg else {
            return Ok(DoseResult::unverified(well, target_mg));
        };
        let final_mg = grams_to_mg(self.read_balance()?);
        let result = DoseResult::verified(well, target_mg, initial_mg, final_mg);
        let pct = result.error_pct().unwrap_or_default();
        info!(
            well,
            target_mg,
            actual_mg = result.actual_mg.unwrap_or_default(),
            error_mg = result.error_mg.unwrap_or_default(),
            error_pct = pct,
            "dose verified"
        );
        if pct.abs() >= ACCEPTABLE_ERROR_PCT {
            warn!(well, error_pct = pct, "dose error above tolerance");
        }
        Ok(result)
    }

    /// Dose every (well, target) pair in order. The first error aborts the
    /// remaining wells and is returned.
    pub fn dose_plate<I, K>(&mut self, well_targets: I, verify: bool) -> Result<PlateResults>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let opts = DoseOptions {
            verify,
            ..DoseOptions::default()
        };
        self.dose_plate_until(well_targets, opts, || false)
    }

    /// Like [`Station::dose_plate`], but checks `stop` before each well and
    /// returns the partial results when it fires.
    pub fn dose_plate_until<I, K, F>(
        &mut self,
        well_targets: I,
        opts: DoseOptions,
        stop: F,
    ) -> Result<PlateResults>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
        F: Fn() -> bool,
    {
        self.dosing_mut()?;
        let mut out = PlateResults::default();
        for (well, target_mg) in well_targets {
            if stop() {
                warn!(done = out.len(), "plate run interrupted");
                out.interrupted = true;
                break;
            }
            let r = self.dose_to_well(well.as_ref(), target_mg, opts)?;
            out.results.push(r);
        }
        info!(wells = out.len(), "plate run finished");
        Ok(out)
    }

    /// Tare, dispense for `duration` at the current head position, weigh.
    pub fn calibrate_flow_rate(
        &mut self,
        duration: Duration,
        gate_position: Option<f64>,
    ) -> Result<FlowCalibration> {
        self.dosing_mut()?;
        if duration.is_zero() {
            return Err(DoserError::Config("calibration dispense duration must be > 0".into()).into());
        }
        self.tare_balance()?;
        self.dosing_mut()?
            .calibrate_flow_rate(duration, gate_position)?;
        let measured_mg = grams_to_mg(self.read_balance()?);
        let cal = FlowCalibration::from_measurement(duration, gate_position, measured_mg)?;
        info!(
            duration_s = duration.as_secs_f64(),
            measured_mg,
            flow = %cal.flow_rate(),
            "flow rate calibrated"
        );
        Ok(cal)
    }

    /// Use `flow_rate` for all further dose duration estimates.
    pub fn apply_flow_rate(&mut self, flow_rate: FlowRate) -> Result<()> {
        self.dosing_mut()?.set_flow_rate(flow_rate);
        Ok(())
    }

    pub fn home(&mut self) -> Result<()> {
        info!("homing station");
        // Gantry first, so the head is clear before the carriage moves.
        if let Some(dosing) = self.dosing.as_mut() {
            dosing.home()?;
        }
        self.loader.home().via(Device::PlateLoader)
    }

    /// Leave the hardware safe: unload a loaded plate, shut down the dosing
    /// system, release the loader. Every step runs even if an earlier one
    /// failed; the first error is returned. Once it succeeds, further calls
    /// do nothing.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            debug!("station already shut down");
            return Ok(());
        }
        info!("shutting down station");
        let mut first: Option<eyre::Report> = None;
        let mut keep = |res: Result<()>, step: &str| {
            if let Err(e) = res {
                warn!(step, error = %e, "shutdown step failed");
                first.get_or_insert(e);
            }
        };

        if self.plate_loaded {
            keep(self.unload_plate(), "unload plate");
        }
        if let Some(dosing) = self.dosing.as_mut() {
            keep(dosing.shutdown(), "dosing system");
        }
        keep(self.loader.shutdown().via(Device::PlateLoader), "plate loader");

        match first {
            Some(e) => Err(e),
            None => {
                self.shut_down = true;
                info!("station shutdown complete");
                Ok(())
            }
        }
    }

    pub fn get_status(&mut self) -> SystemStatus {
        let loader_status = self
            .loader
            .get_status()
            .unwrap_or_else(|e| LoaderStatus::Fault(e.to_string()));
        SystemStatus {
            plate_loaded: self.plate_loaded,
            balance_connected: true,
            dosing_system_connected: self.dosing.is_some(),
            hardware_available: self.hardware.get(),
            loader_status,
        }
    }
}

impl Drop for Station {
    fn drop(&mut self) {
        if !self.shut_down && self.plate_loaded {
            warn!("station dropped with a plate still loaded; call shutdown()");
        }
    }
}
