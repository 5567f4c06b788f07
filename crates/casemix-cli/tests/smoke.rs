//! End-to-end smoke test for the casemix binary.
//!
//! Builds a table directory from the demo set, packs a stay file, runs the
//! classify and dump subcommands and checks their output.
//!
//! Run with:
//!   cargo test -p casemix-cli --test smoke

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use casemix_core::{DiagnosisCode, Sex, UnitCode};
use casemix_stays::{Stay, StayEntry, StayExit, StaySet};
use casemix_tables::demo::{demo_authorizations_json, demo_prices_json, demo_tab_bytes};
use chrono::NaiveDate;

struct TempDir(PathBuf);

impl TempDir {
    fn new(label: &str) -> TempDir {
        let path = std::env::temp_dir().join(format!("casemix-{label}-{}", std::process::id()));
        fs::create_dir_all(&path).unwrap();
        TempDir(path)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

fn casemix() -> Command {
    Command::new(env!("CARGO_BIN_EXE_casemix"))
}

fn write_fixtures(dir: &TempDir) -> (PathBuf, PathBuf, PathBuf) {
    let tables = dir.0.join("tables");
    fs::create_dir_all(&tables).unwrap();
    fs::write(tables.join("fg.tab"), demo_tab_bytes()).unwrap();
    fs::write(tables.join("prices.json"), demo_prices_json()).unwrap();

    let auth_file = dir.0.join("authorizations.json");
    fs::write(&auth_file, demo_authorizations_json()).unwrap();

    // One pneumonia stay, age 55, 4 nights.
    let set = StaySet {
        stays: vec![Stay {
            admin_id: 1,
            bill_id: 1001,
            sex: Some(Sex::Female),
            birthdate: NaiveDate::from_ymd_opt(1964, 2, 14),
            entry: StayEntry {
                date: NaiveDate::from_ymd_opt(2019, 4, 2),
                mode: b'8',
                origin: 0,
            },
            exit: StayExit {
                date: NaiveDate::from_ymd_opt(2019, 4, 6),
                mode: b'8',
                destination: 0,
            },
            unit: UnitCode(210),
            main_diagnosis: "J181".parse::<DiagnosisCode>().unwrap(),
            ..Default::default()
        }],
    };
    let stay_file = dir.0.join("stays.dspak");
    let mut file = fs::File::create(&stay_file).unwrap();
    set.save_pack(&mut file).unwrap();

    (tables, auth_file, stay_file)
}

#[test]
fn classify_prints_expected_grouping() {
    let dir = TempDir::new("classify");
    let (tables, auth_file, stay_file) = write_fixtures(&dir);

    let output = casemix()
        .args(["classify", "-T"])
        .arg(&tables)
        .arg("-A")
        .arg(&auth_file)
        .arg("-v")
        .arg(&stay_file)
        .output()
        .expect("binary runs");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Summary:"), "missing summary in: {stdout}");
    assert!(stdout.contains("04M051"), "missing GHM in: {stdout}");
    assert!(stdout.contains("4005"), "missing GHS in: {stdout}");
    assert!(stdout.contains("have NOT been applied"), "coefficient note missing: {stdout}");
}

#[test]
fn pack_roundtrips_dspak_input() {
    let dir = TempDir::new("pack");
    let (_, _, stay_file) = write_fixtures(&dir);
    let repacked = dir.0.join("repacked.dspak");

    let status = casemix()
        .arg("pack")
        .arg("-O")
        .arg(&repacked)
        .arg(&stay_file)
        .status()
        .expect("binary runs");
    assert!(status.success());

    assert_eq!(fs::read(&stay_file).unwrap(), fs::read(&repacked).unwrap());
}

#[test]
fn dump_lists_tables_and_indexes() {
    let dir = TempDir::new("dump");
    let (tables, _, _) = write_fixtures(&dir);

    let output = casemix().args(["dump", "-T"]).arg(&tables).output().expect("binary runs");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("GHM decision tree"));
    assert!(stdout.contains("Indexes:"));
}

#[test]
fn classify_without_tables_fails() {
    let dir = TempDir::new("fail");
    let (_, _, stay_file) = write_fixtures(&dir);
    let empty = dir.0.join("empty");
    fs::create_dir_all(&empty).unwrap();

    let status = casemix()
        .args(["classify", "-T"])
        .arg(&empty)
        .arg(&stay_file)
        .status()
        .expect("binary runs");
    assert!(!status.success());
}
