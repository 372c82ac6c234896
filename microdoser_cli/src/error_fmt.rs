//! Human-readable error descriptions and structured JSON error formatting.

use microdoser_core::error::{BuildError, Device, DoserError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingBalance => {
                "What happened: No balance was provided to the station.\nLikely causes: The balance driver failed to initialize or was not wired into the builder.\nHow to fix: Check [balance] port in the config and that the balance is powered.".to_string()
            }
            BuildError::MissingLoader => {
                "What happened: No plate loader was provided to the station.\nLikely causes: The loader driver failed to initialize.\nHow to fix: Check the loader connection and [loader] settings.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DoserError>() {
        return match de {
            DoserError::NoDosingSystem => "What happened: A dose was requested but the station has no dosing system.\nLikely causes: [dosing] enabled = false in the config, or --no-dosing was given.\nHow to fix: Enable dosing, or use `weigh` for weighing-only runs.".to_string(),
            DoserError::InvalidWellFormat(w) => format!(
                "What happened: '{w}' is not a well identifier.\nLikely causes: Typo, or row and column swapped.\nHow to fix: Use a row letter followed by a column number, e.g. A1 or H12."
            ),
            DoserError::WellOutOfRange { well, format } => format!(
                "What happened: Well {well} does not exist on a {format} plate.\nLikely causes: Wrong plate.format in the config, or a typo in the well.\nHow to fix: Fix the well, or set plate.format / plate.strict_bounds."
            ),
            DoserError::InvalidTarget(mg) => format!(
                "What happened: Target mass {mg} mg is not a positive amount.\nLikely causes: Zero, negative or missing target in the command or CSV.\nHow to fix: Give a target greater than 0 mg."
            ),
            DoserError::Timeout { device } => format!(
                "What happened: The {device} did not answer in time.\nLikely causes: Cable unplugged, device powered off, or wrong port.\nHow to fix: {}",
                port_hint(*device)
            ),
            DoserError::Driver { device, source } => format!(
                "What happened: The {device} reported an error: {source}.\nLikely causes: Device fault or lost connection.\nHow to fix: {} Then rerun; the station was shut down safely.",
                port_hint(*device)
            ),
            // Fallback to generic for other domain errors
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("targets csv must have headers") {
        return "Invalid headers in targets CSV. Expected 'well,target_mg'.".to_string();
    }

    if lower.contains("must be") && (lower.contains('.') || lower.contains("config")) {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn port_hint(device: Device) -> &'static str {
    match device {
        Device::Balance => "Check [balance] port and the balance power.",
        Device::Cnc => "Check [cnc] port and that the gantry is not at a limit switch.",
        Device::SolidDoser => "Check the [doser] wiring (I2C address, motor GPIO pin).",
        Device::PlateLoader => "Check the plate loader and that nothing blocks the carriage.",
        Device::Operator => "Confirm positioning on the terminal, or pass --yes.",
    }
}

/// Command-line usage errors (unknown flag, missing argument).
pub const EXIT_USAGE: i32 = 64;

/// Exit code for a failed argument parse: `--help` and `--version` are not
/// failures, everything else is a usage error.
pub fn exit_code_for_clap(err: &clap::Error) -> i32 {
    if err.use_stderr() { EXIT_USAGE } else { 0 }
}

/// Stable exit codes: 2 no dosing system, 3 bad well, 4 bad target,
/// 5 driver failure or timeout, 64 usage error (see `exit_code_for_clap`),
/// 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<DoserError>() {
        Some(DoserError::NoDosingSystem) => 2,
        Some(DoserError::InvalidWellFormat(_) | DoserError::WellOutOfRange { .. }) => 3,
        Some(DoserError::InvalidTarget(_)) => 4,
        Some(DoserError::Timeout { .. } | DoserError::Driver { .. }) => 5,
        _ => 1,
    }
}

/// Stable machine-readable name of the error kind.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<DoserError>() {
        Some(DoserError::NoDosingSystem) => "NoDosingSystem",
        Some(DoserError::InvalidWellFormat(_)) => "InvalidWellFormat",
        Some(DoserError::WellOutOfRange { .. }) => "WellOutOfRange",
        Some(DoserError::InvalidTarget(_)) => "InvalidTarget",
        Some(DoserError::NotInitialized(_)) => "NotInitialized",
        Some(DoserError::Timeout { .. }) => "Timeout",
        Some(DoserError::Driver { .. }) => "Driver",
        Some(DoserError::Config(_)) => "Config",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let device = match err.downcast_ref::<DoserError>() {
        Some(DoserError::Timeout { device } | DoserError::Driver { device, .. }) => {
            Some(device.to_string())
        }
        _ => None,
    };
    let mut obj = json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    });
    if let Some(d) = device {
        obj["device"] = json!(d);
    }
    obj.to_string()
}
