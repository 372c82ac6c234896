mod backend;
mod cli;
mod commands;
mod error_fmt;
mod logging;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use microdoser_config::Config;
use microdoser_core::{DoseOptions, FlowRate, Station};
use tracing::{error, info, warn};

use crate::backend::StationOptions;
use crate::cli::{Cli, Commands, JSON_MODE};
use crate::commands::CalibrateArgs;
use crate::error_fmt::{exit_code_for_clap, exit_code_for_error, format_error_json, humanize};

fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = microdoser_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// The persisted calibration wins over the config estimate.
fn resolve_flow_rate(cfg: &Config, calibration: Option<&Path>) -> eyre::Result<FlowRate> {
    match calibration {
        Some(path) => {
            let file = microdoser_config::load_calibration(path)?;
            let flow = FlowRate::try_from(&file)?;
            info!(path = %path.display(), flow = %flow, "using persisted flow calibration");
            Ok(flow)
        }
        None => Ok(FlowRate::new(cfg.dosing.flow_rate_mg_per_s)?),
    }
}

fn run_command(cli: &Cli, station: &mut Station, stop: &Arc<AtomicBool>) -> eyre::Result<()> {
    match &cli.cmd {
        Commands::Dose {
            well,
            target_mg,
            no_verify,
            gate,
        } => {
            let opts = DoseOptions {
                verify: !no_verify,
                gate_position: *gate,
            };
            commands::run_dose(station, well, *target_mg, opts, cli.json)
        }
        Commands::Plate { source, no_verify } => {
            let targets = commands::plate_targets(source)?;
            commands::run_plate(station, targets, !no_verify, stop, cli.json)
        }
        Commands::Weigh { wells, .. } => commands::run_weigh(station, wells, stop, cli.json),
        Commands::Calibrate {
            duration,
            gate,
            verify_mg,
            verify_well,
            save,
        } => commands::run_calibrate(
            station,
            CalibrateArgs {
                duration_s: *duration,
                gate: *gate,
                verify_mg: *verify_mg,
                verify_well,
                save: save.as_deref(),
            },
            cli.json,
        ),
        Commands::Status => commands::run_status(station, cli.json),
        Commands::SelfCheck => commands::run_self_check(station, cli.json),
    }
}

fn run(cli: &Cli) -> eyre::Result<()> {
    let cfg = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            // Still get console logs for the failure itself.
            let _ = logging::init(cli.json, cli.log_level.as_deref(), &Default::default());
            return Err(e);
        }
    };
    logging::init(cli.json, cli.log_level.as_deref(), &cfg.logging)?;

    let flow_rate = resolve_flow_rate(&cfg, cli.calibration.as_deref())?;
    let hardware = microdoser_hardware::probe();
    let assume_yes = matches!(cli.cmd, Commands::Weigh { yes: true, .. });
    let opts = StationOptions {
        dosing: cfg.dosing.enabled && !cli.no_dosing,
        flow_rate,
        hardware,
        assume_yes,
    };
    let mut station = backend::build_station(&cfg, &opts)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        if let Err(e) = ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        }) {
            warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let result = run_command(cli, &mut station, &stop);
    if stop.load(Ordering::Relaxed) {
        warn!("Ctrl-C received; shutting down");
    }

    // Guaranteed cleanup, whatever the command did.
    let shutdown = station.shutdown();
    match (result, shutdown) {
        (Err(e), Err(se)) => {
            error!(error = %se, "shutdown after failure also failed");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), res) => res,
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(exit_code_for_clap(&e));
        }
    };
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporter: {e}");
    }

    let code = match run(&cli) {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                println!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}
