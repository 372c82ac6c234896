use assert_cmd::prelude::*;
use rstest::rstest;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("cfg.toml");
    fs::write(
        &path,
        "[dosing]\nenabled = true\nflow_rate_mg_per_s = 2.0\n\n[logging]\nlevel = \"warn\"\n",
    )
    .unwrap();
    path
}

/// Runs the binary in --json mode and parses the single stdout line.
fn run_json(cfg: &Path, args: &[&str], envs: &[(&str, &str)]) -> (i32, Value) {
    let mut cmd = Command::cargo_bin("microdoser").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("MICRODOSER_SIM_FAIL")
        .env_remove("MICRODOSER_SIM_FLOW_MG_PER_S")
        .arg("--config")
        .arg(cfg)
        .arg("--json")
        .args(args);
    for (k, v) in envs {
        cmd.env(k, v);
    }
    let out = cmd.output().unwrap();
    let stdout = String::from_utf8_lossy(&out.stdout);
    let line = stdout
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_else(|| panic!("no JSON on stdout; stderr: {}", String::from_utf8_lossy(&out.stderr)));
    let v: Value = serde_json::from_str(line).expect("valid JSON line");
    (out.status.code().unwrap_or(-1), v)
}

#[test]
fn dose_result_fields() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    let (code, v) = run_json(
        &cfg,
        &["dose", "--well", "B3", "--target-mg", "5"],
        &[("MICRODOSER_SIM_FLOW_MG_PER_S", "2.2")],
    );
    assert_eq!(code, 0);

    for key in ["well", "target_mg", "initial_mg", "final_mg", "actual_mg", "error_mg", "error_pct"] {
        assert!(v.get(key).is_some(), "missing key {key}: {v}");
    }
    assert_eq!(v["well"], "B3");
    assert_eq!(v["target_mg"].as_f64(), Some(5.0));
    // Calibrated for 2.0 mg/s, material flows at 2.2 mg/s: 10% over.
    let actual = v["actual_mg"].as_f64().unwrap();
    assert!((actual - 5.5).abs() < 1e-6, "actual {actual}");
    assert!((v["error_pct"].as_f64().unwrap() - 10.0).abs() < 1e-6);
}

#[test]
fn unverified_dose_has_null_measurements() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    let (code, v) = run_json(&cfg, &["dose", "--well", "A1", "--target-mg", "5", "--no-verify"], &[]);
    assert_eq!(code, 0);
    assert!(v["actual_mg"].is_null());
    assert!(v["error_mg"].is_null());
}

#[test]
fn plate_output_lists_wells_in_order() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    let (code, v) = run_json(
        &cfg,
        &["plate", "--well", "C1=1.0", "--well", "A1=2.0", "--well", "C1=3.0"],
        &[],
    );
    assert_eq!(code, 0);
    let wells: Vec<&str> = v["wells"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["well"].as_str().unwrap())
        .collect();
    assert_eq!(wells, ["C1", "A1", "C1"]);
    assert_eq!(v["interrupted"], false);
}

#[test]
fn status_fields() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    let (code, v) = run_json(&cfg, &["status"], &[]);
    assert_eq!(code, 0);
    assert_eq!(v["plate_loaded"], false);
    assert_eq!(v["balance_connected"], true);
    assert_eq!(v["dosing_system_connected"], true);
    assert!(v["hardware_available"].is_boolean());
    assert!(v["loader_status"].is_string());

    let (_, v) = run_json(&cfg, &["--no-dosing", "status"], &[]);
    assert_eq!(v["dosing_system_connected"], false);
}

#[test]
fn calibration_fields() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    let (code, v) = run_json(
        &cfg,
        &["calibrate", "--duration", "4", "--verify-mg", "3"],
        &[("MICRODOSER_SIM_FLOW_MG_PER_S", "1.5")],
    );
    assert_eq!(code, 0);
    assert!((v["flow_rate_mg_per_s"].as_f64().unwrap() - 1.5).abs() < 1e-9);
    assert!((v["measured_mg"].as_f64().unwrap() - 6.0).abs() < 1e-9);
    assert_eq!(v["verification"]["acceptable"], true);
}

#[rstest]
#[case(&["--no-dosing", "dose", "--well", "A1", "--target-mg", "5"], &[], 2, "NoDosingSystem")]
#[case(&["dose", "--well", "Q", "--target-mg", "5"], &[], 3, "InvalidWellFormat")]
#[case(&["dose", "--well", "A1", "--target-mg", "0"], &[], 4, "InvalidTarget")]
#[case(&["dose", "--well", "A1", "--target-mg", "5"], &[("MICRODOSER_SIM_FAIL", "doser")], 5, "Driver")]
fn error_json_carries_reason_and_code(
    #[case] args: &[&str],
    #[case] envs: &[(&str, &str)],
    #[case] exit_code: i32,
    #[case] reason: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    let (code, v) = run_json(&cfg, args, envs);
    assert_eq!(code, exit_code);
    assert_eq!(v["reason"], reason);
    assert_eq!(v["exit_code"], exit_code);
    assert!(v["message"].as_str().unwrap().contains("What happened"));
}

#[test]
fn driver_error_json_names_device() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path());
    let (_, v) = run_json(
        &cfg,
        &["dose", "--well", "A1", "--target-mg", "5"],
        &[("MICRODOSER_SIM_FAIL", "balance")],
    );
    assert_eq!(v["device"], "balance");
}
