//! Simulated bench: balance, plate loader, CNC and solid doser sharing one
//! physical state, so material dispensed by the doser shows up on the balance.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use microdoser_traits::{
    Balance, Clock, Cnc, DriverResult, LoaderStatus, PlateLoader, SolidDoser,
};
use tracing::{debug, trace};

use crate::error::HwError;

/// Which simulated device a fault is injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimDevice {
    Balance,
    Loader,
    Cnc,
    Doser,
}

impl std::str::FromStr for SimDevice {
    type Err = HwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "balance" => Ok(SimDevice::Balance),
            "loader" => Ok(SimDevice::Loader),
            "cnc" => Ok(SimDevice::Cnc),
            "doser" => Ok(SimDevice::Doser),
            other => Err(HwError::Fault(format!("unknown simulated device '{other}'"))),
        }
    }
}

#[derive(Debug)]
struct BenchState {
    plate_mass_g: f64,
    plate_on: bool,
    material_g: f64,
    tare_g: f64,
    flow_mg_per_s: f64,
    head_mm: Option<(f64, f64)>,
    loader: LoaderStatus,
    faulty: Vec<SimDevice>,
    events: Vec<String>,
}

impl BenchState {
    fn pan_g(&self) -> f64 {
        if self.plate_on {
            self.plate_mass_g + self.material_g
        } else {
            0.0
        }
    }

    fn check(&mut self, device: SimDevice, event: String) -> DriverResult<()> {
        if self.faulty.contains(&device) {
            return Err(Box::new(HwError::Fault(format!(
                "simulated {device:?} fault during {event}"
            ))));
        }
        trace!(event = %event, "sim bench");
        self.events.push(event);
        Ok(())
    }
}

/// Shared handle to the simulated physical bench.
///
/// Cloning is cheap; all clones see the same plate, material and head position.
#[derive(Debug, Clone)]
pub struct SimBench {
    state: Rc<RefCell<BenchState>>,
}

impl Default for SimBench {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBench {
    /// Empty bench: 45 g plate, 2 mg/s material flow.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(BenchState {
                plate_mass_g: 45.0,
                plate_on: false,
                material_g: 0.0,
                tare_g: 0.0,
                flow_mg_per_s: 2.0,
                head_mm: None,
                loader: LoaderStatus::Unknown,
                faulty: Vec::new(),
                events: Vec::new(),
            })),
        }
    }

    /// Actual material flow produced by the simulated doser (mg/s).
    pub fn with_flow_mg_per_s(self, flow: f64) -> Self {
        self.state.borrow_mut().flow_mg_per_s = flow;
        self
    }

    /// Make every subsequent call on `device` fail.
    pub fn inject_fault(&self, device: SimDevice) {
        let mut st = self.state.borrow_mut();
        if !st.faulty.contains(&device) {
            st.faulty.push(device);
        }
    }

    /// Event journal in call order, e.g. `"cnc.move_to(18.00, 9.00)"`.
    pub fn events(&self) -> Vec<String> {
        self.state.borrow().events.clone()
    }

    /// Material on the plate so far, in milligrams.
    pub fn material_mg(&self) -> f64 {
        self.state.borrow().material_g * 1000.0
    }

    pub fn head_position(&self) -> Option<(f64, f64)> {
        self.state.borrow().head_mm
    }

    pub fn plate_on(&self) -> bool {
        self.state.borrow().plate_on
    }

    pub fn balance(&self) -> SimBalance {
        SimBalance {
            bench: self.clone(),
        }
    }

    pub fn loader(&self) -> SimPlateLoader {
        SimPlateLoader {
            bench: self.clone(),
        }
    }

    pub fn cnc(&self) -> SimCnc {
        SimCnc {
            bench: self.clone(),
            connected: true,
        }
    }

    pub fn doser_with_clock<C: Clock>(&self, clock: C) -> SimSolidDoser<C> {
        SimSolidDoser {
            bench: self.clone(),
            clock,
            last_gate: None,
        }
    }
}

/// Simulated balance; reads plate + material minus the tare point.
pub struct SimBalance {
    bench: SimBench,
}

impl Balance for SimBalance {
    fn tare(&mut self) -> DriverResult<()> {
        let mut st = self.bench.state.borrow_mut();
        st.check(SimDevice::Balance, "balance.tare".into())?;
        let pan = st.pan_g();
        st.tare_g = pan;
        Ok(())
    }

    fn weigh(&mut self) -> DriverResult<f64> {
        let mut st = self.bench.state.borrow_mut();
        st.check(SimDevice::Balance, "balance.weigh".into())?;
        let g = st.pan_g() - st.tare_g;
        debug!(grams = g, "sim balance reading");
        Ok(g)
    }
}

pub struct SimPlateLoader {
    bench: SimBench,
}

impl PlateLoader for SimPlateLoader {
    fn load_plate(&mut self) -> DriverResult<()> {
        let mut st = self.bench.state.borrow_mut();
        st.check(SimDevice::Loader, "loader.load_plate".into())?;
        st.plate_on = true;
        st.loader = LoaderStatus::Loaded;
        Ok(())
    }

    fn unload_plate(&mut self) -> DriverResult<()> {
        let mut st = self.bench.state.borrow_mut();
        st.check(SimDevice::Loader, "loader.unload_plate".into())?;
        st.plate_on = false;
        st.loader = LoaderStatus::Unloaded;
        Ok(())
    }

    fn home(&mut self) -> DriverResult<()> {
        let mut st = self.bench.state.borrow_mut();
        st.check(SimDevice::Loader, "loader.home".into())?;
        if !st.plate_on {
            st.loader = LoaderStatus::Homed;
        }
        Ok(())
    }

    fn get_status(&mut self) -> DriverResult<LoaderStatus> {
        let st = self.bench.state.borrow();
        if st.faulty.contains(&SimDevice::Loader) {
            return Ok(LoaderStatus::Fault("simulated loader fault".into()));
        }
        Ok(st.loader.clone())
    }

    fn shutdown(&mut self) -> DriverResult<()> {
        let mut st = self.bench.state.borrow_mut();
        st.check(SimDevice::Loader, "loader.shutdown".into())
    }
}

pub struct SimCnc {
    bench: SimBench,
    connected: bool,
}

impl Cnc for SimCnc {
    fn home(&mut self) -> DriverResult<()> {
        if !self.connected {
            return Err(Box::new(HwError::NotInitialized));
        }
        let mut st = self.bench.state.borrow_mut();
        st.check(SimDevice::Cnc, "cnc.home".into())?;
        st.head_mm = Some((0.0, 0.0));
        Ok(())
    }

    fn move_to(&mut self, x_mm: f64, y_mm: f64) -> DriverResult<()> {
        if !self.connected {
            return Err(Box::new(HwError::NotInitialized));
        }
        let mut st = self.bench.state.borrow_mut();
        st.check(SimDevice::Cnc, format!("cnc.move_to({x_mm:.2}, {y_mm:.2})"))?;
        st.head_mm = Some((x_mm, y_mm));
        Ok(())
    }

    fn disconnect(&mut self) -> DriverResult<()> {
        let mut st = self.bench.state.borrow_mut();
        st.check(SimDevice::Cnc, "cnc.disconnect".into())?;
        self.connected = false;
        Ok(())
    }
}

/// Simulated doser: every second of dispense adds the bench flow rate worth
/// of material to the plate, provided a plate is on the pan.
pub struct SimSolidDoser<C: Clock> {
    bench: SimBench,
    clock: C,
    last_gate: Option<f64>,
}

impl<C: Clock> SimSolidDoser<C> {
    pub fn last_gate(&self) -> Option<f64> {
        self.last_gate
    }
}

impl<C: Clock> SolidDoser for SimSolidDoser<C> {
    fn home(&mut self) -> DriverResult<()> {
        let mut st = self.bench.state.borrow_mut();
        st.check(SimDevice::Doser, "doser.home".into())
    }

    fn dispense(&mut self, duration: Duration, gate_position: Option<f64>) -> DriverResult<()> {
        {
            let mut st = self.bench.state.borrow_mut();
            st.check(
                SimDevice::Doser,
                format!("doser.dispense({:.3}s)", duration.as_secs_f64()),
            )?;
        }
        self.last_gate = gate_position;
        self.clock.sleep(duration);
        let mut st = self.bench.state.borrow_mut();
        if st.plate_on {
            let added_g = st.flow_mg_per_s * duration.as_secs_f64() / 1000.0;
            st.material_g += added_g;
        }
        Ok(())
    }

    fn shutdown(&mut self) -> DriverResult<()> {
        let mut st = self.bench.state.borrow_mut();
        st.check(SimDevice::Doser, "doser.shutdown".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microdoser_traits::ManualClock;

    #[test]
    fn tare_with_plate_makes_readings_plate_relative() {
        let bench = SimBench::new();
        let mut loader = bench.loader();
        let mut balance = bench.balance();
        loader.load_plate().unwrap();
        assert!((balance.weigh().unwrap() - 45.0).abs() < 1e-9);
        balance.tare().unwrap();
        assert!(balance.weigh().unwrap().abs() < 1e-12);
    }

    #[test]
    fn dispense_adds_material_at_bench_flow() {
        let bench = SimBench::new().with_flow_mg_per_s(2.0);
        let clock = ManualClock::new();
        let mut doser = bench.doser_with_clock(clock.clone());
        bench.loader().load_plate().unwrap();
        doser.dispense(Duration::from_millis(2500), Some(35.0)).unwrap();
        assert!((bench.material_mg() - 5.0).abs() < 1e-9);
        assert_eq!(clock.elapsed(), Duration::from_millis(2500));
        assert_eq!(doser.last_gate(), Some(35.0));
    }

    #[test]
    fn dispense_without_plate_spills() {
        let bench = SimBench::new();
        let mut doser = bench.doser_with_clock(ManualClock::new());
        doser.dispense(Duration::from_secs(1), None).unwrap();
        assert_eq!(bench.material_mg(), 0.0);
    }

    #[test]
    fn injected_fault_fails_calls() {
        let bench = SimBench::new();
        bench.inject_fault(SimDevice::Cnc);
        let err = bench.cnc().move_to(1.0, 2.0).unwrap_err();
        assert!(err.to_string().contains("fault"));
        assert!(bench.events().is_empty());
    }

    #[test]
    fn disconnected_cnc_refuses_motion() {
        let bench = SimBench::new();
        let mut cnc = bench.cnc();
        cnc.disconnect().unwrap();
        let err = cnc.move_to(0.0, 0.0).unwrap_err();
        assert!(err.downcast_ref::<HwError>().is_some());
    }

    #[test]
    fn parses_device_names() {
        assert_eq!("Balance".parse::<SimDevice>().unwrap(), SimDevice::Balance);
        assert!("pump".parse::<SimDevice>().is_err());
    }
}
