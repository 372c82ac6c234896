use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use assert_cmd::Command;
use tempfile::tempdir;

// Minimal valid config for the simulated bench
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[plate]
format = "96"
well_spacing_mm = 9.0
origin_mm = [0.0, 0.0]

[dosing]
enabled = true
flow_rate_mg_per_s = 2.0

[logging]
level = "warn"
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn microdoser(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("microdoser").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("MICRODOSER_SIM_FAIL")
        .env_remove("MICRODOSER_SIM_FLOW_MG_PER_S")
        .arg("--config")
        .arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["dose", "--well", "B3", "--target-mg", "5"], 0, "dose complete", "stdout")]
#[case(&["dose", "--well", "B3", "--target-mg", "5", "--no-verify"], 0, "not verified", "stdout")]
#[case(&["dose"], 64, "required", "stderr")]
#[case(&["dose", "--wel", "A1"], 64, "unexpected argument", "stderr")]
#[case(&["dose", "--well", "1A", "--target-mg", "5"], 3, "not a well identifier", "stderr")]
#[case(&["dose", "--well", "A1", "--target-mg", "0"], 4, "not a positive amount", "stderr")]
#[case(&["dose", "--well", "A1", "--target-mg", "-2"], 4, "not a positive amount", "stderr")]
#[case(&["--no-dosing", "dose", "--well", "A1", "--target-mg", "5"], 2, "no dosing system", "stderr")]
#[case(&["status"], 0, "plate loader:", "stdout")]
#[case(&["self-check"], 0, "self-check OK", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = microdoser(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
#[case("doser")]
#[case("cnc")]
#[case("balance")]
fn simulated_driver_faults_exit_with_driver_code(#[case] device: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    microdoser(&cfg)
        .env("MICRODOSER_SIM_FAIL", device)
        .args(["dose", "--well", "A1", "--target-mg", "1"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("What happened"));
}

#[test]
fn plate_with_inline_targets_keeps_order() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = microdoser(&cfg)
        .args(["plate", "--well", "A1=5.0", "--well", "A2=3.0"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&out);
    let a1 = stdout.find("A1").expect("A1 row");
    let a2 = stdout.find("A2").expect("A2 row");
    assert!(a1 < a2, "rows out of order: {stdout}");
    assert!(stdout.contains("2 well(s) dosed"));
}

#[test]
fn plate_from_csv() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let csv = dir.path().join("targets.csv");
    fs::write(&csv, "well,target_mg\nH12,1.5\nA1,2.0\n").unwrap();

    microdoser(&cfg)
        .arg("plate")
        .arg("--targets")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("H12").and(predicate::str::contains("2 well(s)")));
}

#[test]
fn plate_rejects_bad_csv_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let bad_csv = dir.path().join("targets.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "well,grams").unwrap();
    writeln!(f, "A1,0.005").unwrap();

    microdoser(&cfg)
        .arg("plate")
        .arg("--targets")
        .arg(&bad_csv)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[test]
fn plate_requires_a_target_source() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    microdoser(&cfg).arg("plate").assert().code(64);
}

#[test]
fn weighing_station_asks_operator() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    microdoser(&cfg)
        .args(["--no-dosing", "weigh", "--well", "A1", "--well", "B2"])
        .write_stdin("\n\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Position the balance under well A1"))
        .stdout(predicate::str::contains("B2"));

    // Nobody at the terminal: the operator prompt fails like a driver.
    microdoser(&cfg)
        .args(["--no-dosing", "weigh", "--well", "A1"])
        .write_stdin("")
        .assert()
        .code(5)
        .stderr(predicate::str::contains("operator"));

    microdoser(&cfg)
        .args(["--no-dosing", "weigh", "--well", "A1", "--yes"])
        .write_stdin("")
        .assert()
        .success();
}

#[test]
fn missing_config_file_fails() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    microdoser(&missing)
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("read config"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, "[plate]\nwell_spacing_mm = 0.0\n").unwrap();
    microdoser(&cfg)
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("plate.well_spacing_mm"));
}

#[test]
fn calibration_is_saved_and_reused() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let cal = dir.path().join("flow.toml");

    microdoser(&cfg)
        .env("MICRODOSER_SIM_FLOW_MG_PER_S", "2.4")
        .args(["calibrate", "--duration", "5", "--gate", "35"])
        .arg("--save")
        .arg(&cal)
        .assert()
        .success()
        .stdout(predicate::str::contains("2.400 mg/s"));

    let saved = microdoser_config::load_calibration(&cal).unwrap();
    assert!((saved.flow_rate_mg_per_s - 2.4).abs() < 1e-9);
    assert_eq!(saved.gate_position, Some(35.0));

    // With the saved calibration the dose lands on target.
    let out = microdoser(&cfg)
        .env("MICRODOSER_SIM_FLOW_MG_PER_S", "2.4")
        .arg("--calibration")
        .arg(&cal)
        .args(["--json", "dose", "--well", "A1", "--target-mg", "6"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_str(String::from_utf8_lossy(&out).trim()).unwrap();
    assert!(v["error_pct"].as_f64().unwrap().abs() < 1e-6);
}

#[test]
fn calibrate_with_verification_reports_acceptance() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    microdoser(&cfg)
        .env("MICRODOSER_SIM_FLOW_MG_PER_S", "3.0")
        .args(["calibrate", "--duration", "2", "--verify-mg", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acceptable"));
}

#[test]
fn calibrate_needs_dosing_system() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    microdoser(&cfg)
        .args(["--no-dosing", "calibrate"])
        .assert()
        .code(2);
}
