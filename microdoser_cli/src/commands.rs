//! Subcommand runners. Each one leaves the plate unloaded on success;
//! `main` runs the station shutdown on every exit path.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use microdoser_config::FlowCalibrationFile;
use microdoser_core::atomic::write_atomic;
use microdoser_core::{DoseOptions, DoseResult, FlowCalibration, PlateResults, Station, SystemStatus};
use serde_json::{Value, json};
use tracing::info;

use crate::cli::PlateSource;

fn dose_json(r: &DoseResult) -> Value {
    json!({
        "well": r.well,
        "target_mg": r.target_mg,
        "initial_mg": r.initial_mg,
        "final_mg": r.final_mg,
        "actual_mg": r.actual_mg,
        "error_mg": r.error_mg,
        "error_pct": r.error_pct(),
    })
}

fn dose_line(r: &DoseResult) -> String {
    match (r.actual_mg, r.error_mg, r.error_pct()) {
        (Some(actual), Some(err), Some(pct)) => format!(
            "{:<4} target {:>8.3} mg  actual {:>8.3} mg  error {:>+8.3} mg ({:>+6.2}%)",
            r.well, r.target_mg, actual, err, pct
        ),
        _ => format!("{:<4} target {:>8.3} mg  (not verified)", r.well, r.target_mg),
    }
}

fn status_json(s: &SystemStatus) -> Value {
    json!({
        "plate_loaded": s.plate_loaded,
        "balance_connected": s.balance_connected,
        "dosing_system_connected": s.dosing_system_connected,
        "hardware_available": s.hardware_available,
        "loader_status": s.loader_status.to_string(),
    })
}

pub fn run_dose(
    station: &mut Station,
    well: &str,
    target_mg: f64,
    opts: DoseOptions,
    json: bool,
) -> eyre::Result<()> {
    station.load_plate()?;
    let r = station.dose_to_well(well, target_mg, opts)?;
    station.unload_plate()?;
    if json {
        println!("{}", dose_json(&r));
    } else {
        println!("{}", dose_line(&r));
        println!("dose complete");
    }
    Ok(())
}

/// Targets from the CSV file or the inline `--well` list, in order.
pub fn plate_targets(source: &PlateSource) -> eyre::Result<Vec<(String, f64)>> {
    if let Some(path) = &source.targets {
        let rows = microdoser_config::load_targets_csv(path)?;
        return Ok(rows.into_iter().map(|r| (r.well, r.target_mg)).collect());
    }
    Ok(source
        .wells
        .iter()
        .map(|w| (w.well.clone(), w.target_mg))
        .collect())
}

fn print_plate(results: &PlateResults, json: bool) {
    if json {
        let wells: Vec<Value> = results.iter().map(dose_json).collect();
        println!(
            "{}",
            json!({ "wells": wells, "interrupted": results.interrupted() })
        );
    } else {
        for r in results {
            println!("{}", dose_line(r));
        }
        println!("{} well(s) dosed", results.len());
    }
}

pub fn run_plate(
    station: &mut Station,
    targets: Vec<(String, f64)>,
    verify: bool,
    stop: &Arc<AtomicBool>,
    json: bool,
) -> eyre::Result<()> {
    info!(wells = targets.len(), verify, "plate run");
    station.load_plate()?;
    let opts = DoseOptions {
        verify,
        ..DoseOptions::default()
    };
    let results = station.dose_plate_until(targets, opts, || stop.load(Ordering::Relaxed))?;
    station.unload_plate()?;
    print_plate(&results, json);
    if results.interrupted() {
        eyre::bail!("interrupted after {} well(s)", results.len());
    }
    Ok(())
}

pub fn run_weigh(
    station: &mut Station,
    wells: &[String],
    stop: &Arc<AtomicBool>,
    json: bool,
) -> eyre::Result<()> {
    station.load_plate()?;
    let mut readings = Vec::with_capacity(wells.len());
    for well in wells {
        if stop.load(Ordering::Relaxed) {
            eyre::bail!("interrupted after {} well(s)", readings.len());
        }
        let g = station.weigh_well(well)?;
        readings.push((well.as_str(), g));
    }
    station.unload_plate()?;
    if json {
        let rows: Vec<Value> = readings
            .iter()
            .map(|(w, g)| json!({ "well": w, "grams": g }))
            .collect();
        println!("{}", json!({ "readings": rows }));
    } else {
        for (w, g) in &readings {
            println!("{w:<4} {g:>10.4} g");
        }
    }
    Ok(())
}

pub struct CalibrateArgs<'a> {
    pub duration_s: f64,
    pub gate: Option<f64>,
    pub verify_mg: Option<f64>,
    pub verify_well: &'a str,
    pub save: Option<&'a Path>,
}

pub fn run_calibrate(station: &mut Station, args: CalibrateArgs<'_>, json: bool) -> eyre::Result<()> {
    let duration = Duration::try_from_secs_f64(args.duration_s)
        .wrap_err_with(|| format!("invalid --duration {}", args.duration_s))?;
    station.load_plate()?;
    let cal = station.calibrate_flow_rate(duration, args.gate)?;
    station.apply_flow_rate(cal.flow_rate())?;

    let verification = match args.verify_mg {
        Some(mg) => {
            let r = station.dose_to_well(args.verify_well, mg, DoseOptions::default())?;
            let measured = r.actual_mg.unwrap_or_default();
            let pct = FlowCalibration::verification_error_pct(mg, measured);
            Some((r, pct, FlowCalibration::is_acceptable(pct)))
        }
        None => None,
    };
    station.unload_plate()?;

    if let Some(path) = args.save {
        let file = FlowCalibrationFile::from(&cal);
        write_atomic(path, file.to_toml()?.as_bytes())
            .wrap_err_with(|| format!("write calibration {}", path.display()))?;
        info!(path = %path.display(), "calibration saved");
    }

    if json {
        let mut obj = json!({
            "flow_rate_mg_per_s": cal.flow_rate().mg_per_s(),
            "duration_s": cal.duration().as_secs_f64(),
            "gate_position": cal.gate_position(),
            "measured_mg": cal.measured_mg(),
        });
        if let Some((r, pct, ok)) = &verification {
            obj["verification"] = json!({ "dose": dose_json(r), "error_pct": pct, "acceptable": ok });
        }
        println!("{obj}");
    } else {
        println!(
            "measured {:.3} mg in {:.3} s -> flow rate {}",
            cal.measured_mg(),
            cal.duration().as_secs_f64(),
            cal.flow_rate()
        );
        if let Some((r, pct, ok)) = &verification {
            println!("{}", dose_line(r));
            println!(
                "verification error {pct:+.2}% ({})",
                if *ok { "acceptable" } else { "recalibrate" }
            );
        }
    }
    Ok(())
}

pub fn run_status(station: &mut Station, json: bool) -> eyre::Result<()> {
    let s = station.get_status();
    if json {
        println!("{}", status_json(&s));
    } else {
        println!("plate loaded:     {}", s.plate_loaded);
        println!("balance:          {}", if s.balance_connected { "connected" } else { "missing" });
        println!(
            "dosing system:    {}",
            station.dosing_system_name().unwrap_or("none")
        );
        println!("hardware drivers: {}", s.hardware_available);
        println!("plate loader:     {}", s.loader_status);
    }
    Ok(())
}

pub fn run_self_check(station: &mut Station, json: bool) -> eyre::Result<()> {
    station.home()?;
    let s = station.get_status();
    if let microdoser_core::LoaderStatus::Fault(msg) = &s.loader_status {
        eyre::bail!("plate loader reports a fault: {msg}");
    }
    if json {
        println!("{}", json!({ "ok": true, "status": status_json(&s) }));
    } else {
        println!("self-check OK");
    }
    Ok(())
}
