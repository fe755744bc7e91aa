// End-to-end tests for `cflow run`, `cflow latest` and `cflow check-config`.
// Run with: cargo test -p caseflow-cli --test run_tests

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const PULL: &str = "2025-01-31";

fn cflow(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cflow"))
        .args(args)
        .env_remove("CASEFLOW_BASE")
        .env("RUST_LOG", "warn")
        .output()
        .expect("run cflow")
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A staging root with one pull of every bronze input.
fn staging() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let bronze = dir.path().join("Bronze Stage");

    write(
        &bronze.join("ProgramClientData").join(format!("ProgramClientData_{PULL}.csv")),
        "Clients Unique Identifier,Programs Full Name,Enrollments Active in Project,Enrollments Deleted (Yes / No),Enrollments Days in Project,Enrollments Project Start Date,Clients Client Full Name,List of Client File Name\n\
         1,Program A,Yes,No,100,2024-10-23,Ann,\"SSN Card, Health Insurance\"\n\
         1,Program A,No,No,300,2024-01-01,Ann,\n\
         1,Program B,Yes,No,20,2025-01-10,Ann,\n\
         2,Program A,Yes,No,10,2025-01-20,Bob,\n\
         3,Weingart Center Association - Downtown Access Center,Yes,No,5,2025-01-01,Cy,\n",
    );
    // An older pull that must not be picked up.
    write(
        &bronze.join("ProgramClientData").join("ProgramClientData_2024-12-31.csv"),
        "Clients Unique Identifier,Programs Full Name\n9,Program Z\n",
    );
    write(
        &bronze.join("CaseNotes").join(format!("CaseNotes_{PULL}.csv")),
        "Clients Unique Identifier,Programs Full Name,Client Notes - Enrollment Level Case Note Month,Client Notes - Enrollment Level Count\n\
         1,Program A,2025-01,3\n",
    );
    write(
        &bronze.join("Services").join(format!("Services_{PULL}.csv")),
        "Clients Unique Identifier,Programs Full Name,Services Start Date Month,Services Count\n\
         2,Program A,2024-12,1\n",
    );
    write(
        &bronze.join("CES").join("HMIS").join(format!("CES_HMIS_{PULL}.csv")),
        "Clients Unique Identifier,Client Assessments Assessment Date,Client Assessments Assessment Score,Client Assessments Name\n\
         1,2024-06-01,10,CES Survey\n",
    );
    write(
        &bronze.join("CES").join("External").join("Weingart CES Data_B7.csv"),
        "Clients Unique Identifier,Survey Name,Latest CES Assessment Date,Assessment Score\n\
         2,Los Angeles Housing Assessment Tool (LA HAT),2024-12-01,18\n",
    );
    write(
        &bronze.join("CES").join("External").join("archive").join("Weingart CES Data_old.csv"),
        "not,a,valid\nfile\n",
    );
    dir
}

fn read_csv(path: &Path) -> String {
    let text = fs::read_to_string(path).unwrap();
    text.trim_start_matches('\u{feff}').to_string()
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_publishes_silver_gold_and_summary() {
    let dir = staging();
    let base = dir.path().to_str().unwrap();

    let output = cflow(&["run", "--pull-date", PULL, "--base", base, "--json"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("JSON summary");
    assert_eq!(report["pull_date"], PULL);
    assert_eq!(report["external_files"], 1);
    let summary = &report["summary"];
    assert_eq!(summary["enrollment_rows"], 5);
    assert_eq!(summary["excluded_rows"], 1);
    assert_eq!(summary["duplicate_keys"], 1);
    assert_eq!(summary["fact_rows"], 3);
    assert_eq!(summary["client_rows"], 2);
    assert_eq!(summary["assessments_unified"], 2);
    assert_eq!(summary["active_multi_program_clients"], 1);

    let silver = dir.path().join("Silver Stage").join(format!("pull_date={PULL}"));
    for stem in ["program_client_data_current_client_program", "case_notes_monthly", "ces_unified_latest_by_client"] {
        assert!(silver.join(format!("{stem}.csv")).is_file(), "missing silver {stem}");
    }

    let gold = dir.path().join("Gold Stage").join(format!("pull_date={PULL}"));
    let current = dir.path().join("Gold Stage").join("current");
    for name in [
        "client_program_readiness_current.csv",
        "client_readiness_current.csv",
        "duplicate_enrollments.csv",
        "_manifest.json",
        "_quality.json",
    ] {
        assert!(gold.join(name).is_file(), "missing gold {name}");
        assert!(current.join(name).is_file(), "missing current {name}");
    }
    assert!(gold.join(format!("gold_extracts_{PULL}.xlsx")).is_file());
    assert!(current.join("gold_extracts_current.xlsx").is_file());

    let facts = read_csv(&gold.join("client_program_readiness_current.csv"));
    let header = facts.lines().next().unwrap();
    assert!(header.starts_with("client_id,program_name,"));
    assert!(header.contains("List of Client File Name"));
    assert!(!header.contains("Clients Active ROI?"), "absent spine columns are not published");
    assert_eq!(facts.lines().count(), 4);
}

#[test]
fn manifest_records_inputs_and_hashes() {
    let dir = staging();
    let base = dir.path().to_str().unwrap();
    let output = cflow(&["run", "--pull-date", PULL, "--base", base]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty(), "human summary goes to stderr");

    let manifest_path = dir.path().join("Gold Stage").join(format!("pull_date={PULL}")).join("_manifest.json");
    let manifest: serde_json::Value = serde_json::from_str(&fs::read_to_string(manifest_path).unwrap()).unwrap();
    assert_eq!(manifest["pull_date"], PULL);
    assert_eq!(manifest["ces_external_files_count"], 1);
    assert!(manifest["bronze_used"]["enrollment_spine"]
        .as_str()
        .unwrap()
        .ends_with(&format!("ProgramClientData_{PULL}.csv")));
    let hashes = manifest["bronze_hashes"].as_object().unwrap();
    assert_eq!(hashes.len(), 4);
    assert!(hashes.values().all(|h| h.as_str().unwrap().len() == 64));

    let quality_path = dir.path().join("Gold Stage").join("current").join("_quality.json");
    let quality: serde_json::Value = serde_json::from_str(&fs::read_to_string(quality_path).unwrap()).unwrap();
    assert_eq!(quality["silver"].as_array().unwrap().len(), 4);
    assert_eq!(quality["gold"][1]["name"], "client_readiness_current");
    assert_eq!(quality["gold"][1]["duplicate_key_rows"], 0);
}

#[test]
fn base_from_environment() {
    let dir = staging();
    let output = Command::new(env!("CARGO_BIN_EXE_cflow"))
        .args(["run", "--pull-date", PULL])
        .env("CASEFLOW_BASE", dir.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn config_from_ops_folder_changes_exclusions() {
    let dir = staging();
    write(&dir.path().join("_ops").join("caseflow.toml"), "excluded_programs = []\n");
    let base = dir.path().to_str().unwrap();

    let output = cflow(&["run", "--pull-date", PULL, "--base", base, "--json"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["excluded_rows"], 0);
    assert_eq!(report["summary"]["fact_rows"], 4);
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

#[test]
fn bad_pull_date_is_usage_error() {
    let output = cflow(&["run", "--pull-date", "31/01/2025", "--base", "."]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid pull date"));
}

#[test]
fn missing_input_is_input_error() {
    let dir = staging();
    let base = dir.path().to_str().unwrap();
    let output = cflow(&["run", "--pull-date", "2025-03-01", "--base", base]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("2025-03-01"));
}

#[test]
fn missing_column_is_schema_error() {
    let dir = staging();
    write(
        &dir.path().join("Bronze Stage").join("Services").join(format!("Services_{PULL}.csv")),
        "Clients Unique Identifier,Programs Full Name,Services Start Date Month\n2,Program A,2024-12\n",
    );
    let output = cflow(&["run", "--pull-date", PULL, "--base", dir.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Services Count"));
}

#[test]
fn invalid_config_is_config_error() {
    let dir = staging();
    let config = dir.path().join("bad.toml");
    write(&config, "[rules]\nassessment_expiry_days = 0\n");

    let output = cflow(&["check-config", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(6));

    let run = cflow(&[
        "run",
        "--pull-date",
        PULL,
        "--base",
        dir.path().to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert_eq!(run.status.code(), Some(6));
}

// ---------------------------------------------------------------------------
// latest / check-config
// ---------------------------------------------------------------------------

#[test]
fn latest_prints_newest_pull_date() {
    let dir = staging();
    let output = cflow(&["latest", "--base", dir.path().to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), PULL);

    let empty = tempfile::tempdir().unwrap();
    let output = cflow(&["latest", "--base", empty.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn check_config_accepts_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("ok.toml");
    write(&config, "name = \"weekly\"\n[rules]\ncase_note_cap = 4\n");

    let output = cflow(&["check-config", config.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("weekly"));
}
