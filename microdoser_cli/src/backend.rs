//! Station assembly from config: simulated bench by default, the Pi solid
//! doser when it was compiled in and `[hardware] enabled = true`.

use std::io::{BufRead, Write};

use eyre::WrapErr;
use microdoser_config::Config;
use microdoser_core::{CncDosingSystem, DosingCfg, FlowRate, HardwareAvailable, Station};
use microdoser_hardware::{SimBench, SimDevice};
use microdoser_traits::{DriverResult, ManualClock, OperatorPrompt};
use tracing::{info, warn};

pub const ENV_SIM_FLOW: &str = "MICRODOSER_SIM_FLOW_MG_PER_S";
pub const ENV_SIM_FAIL: &str = "MICRODOSER_SIM_FAIL";

/// Asks on stderr and waits for Enter on stdin.
pub struct StdinPrompt {
    pub assume_yes: bool,
}

impl OperatorPrompt for StdinPrompt {
    fn confirm_position(&mut self, well: &str) -> DriverResult<()> {
        if self.assume_yes {
            return Ok(());
        }
        let mut err = std::io::stderr();
        write!(err, "Position the balance under well {well} and press Enter: ")?;
        err.flush()?;
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(format!("no operator input for well {well} (stdin closed)").into());
        }
        Ok(())
    }
}

/// Options resolved from the command line that shape the station.
pub struct StationOptions {
    pub dosing: bool,
    pub flow_rate: FlowRate,
    pub hardware: HardwareAvailable,
    pub assume_yes: bool,
}

fn sim_bench() -> eyre::Result<SimBench> {
    let mut bench = SimBench::new();
    if let Ok(v) = std::env::var(ENV_SIM_FLOW) {
        let flow: f64 = v
            .trim()
            .parse()
            .wrap_err_with(|| format!("{ENV_SIM_FLOW} must be a number, got '{v}'"))?;
        bench = bench.with_flow_mg_per_s(flow);
    }
    if let Ok(v) = std::env::var(ENV_SIM_FAIL) {
        for name in v.split(',').filter(|s| !s.trim().is_empty()) {
            let device: SimDevice = name
                .parse()
                .wrap_err_with(|| format!("{ENV_SIM_FAIL}: unknown device '{name}'"))?;
            warn!(?device, "simulated fault injected");
            bench.inject_fault(device);
        }
    }
    Ok(bench)
}

fn dosing_system(
    cfg: &Config,
    bench: &SimBench,
    opts: &StationOptions,
) -> eyre::Result<CncDosingSystem> {
    let mut dosing_cfg = DosingCfg::try_from(cfg).wrap_err("dosing configuration")?;
    dosing_cfg.flow_rate = opts.flow_rate;
    let mut dosing = CncDosingSystem::new(dosing_cfg);

    if opts.hardware.get() && cfg.hardware.enabled {
        attach_hardware_doser(&mut dosing, cfg, bench)?;
    } else {
        if cfg.hardware.enabled {
            warn!("hardware requested but not compiled in; using the simulated doser");
        }
        dosing.initialize(bench.cnc(), bench.doser_with_clock(ManualClock::new()))?;
    }
    Ok(dosing)
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn attach_hardware_doser(
    dosing: &mut CncDosingSystem,
    cfg: &Config,
    bench: &SimBench,
) -> eyre::Result<()> {
    use microdoser_hardware::pi_doser::{PiDoserParams, PiSolidDoser};

    let params = PiDoserParams {
        i2c_address: cfg.doser.i2c_address,
        motor_gpio_pin: cfg.doser.motor_gpio_pin,
        frequency: cfg.doser.frequency,
        ..PiDoserParams::default()
    };
    let doser = PiSolidDoser::open(params).wrap_err("open Pi solid doser")?;
    info!("using Pi solid doser; balance, loader and CNC stay simulated");
    dosing.initialize(bench.cnc(), doser)
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn attach_hardware_doser(
    _dosing: &mut CncDosingSystem,
    _cfg: &Config,
    _bench: &SimBench,
) -> eyre::Result<()> {
    eyre::bail!("hardware support not compiled in (rebuild with --features hardware)")
}

pub fn build_station(cfg: &Config, opts: &StationOptions) -> eyre::Result<Station> {
    let bench = sim_bench()?;
    let dosing = if opts.dosing {
        Some(Box::new(dosing_system(cfg, &bench, opts)?) as Box<dyn microdoser_core::DosingSystem>)
    } else {
        info!("dosing disabled; weighing station only");
        None
    };
    info!(
        balance_port = %cfg.balance.port,
        plate_type = %cfg.loader.plate_type,
        loader_params = cfg.loader.params.len(),
        "station backend: simulated bench"
    );
    Station::builder()
        .with_balance(bench.balance())
        .with_loader(bench.loader())
        .with_optional_dosing_system(dosing)
        .with_prompt(StdinPrompt {
            assume_yes: opts.assume_yes,
        })
        .with_hardware(opts.hardware)
        .with_plate_type(cfg.loader.plate_type.clone())
        .build()
}
