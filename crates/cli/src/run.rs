//! `cflow run` and `cflow latest`: bronze discovery, the core run, and
//! silver/gold publishing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use caseflow_io::{csv, json, read_table, sha256_file, xlsx};
use caseflow_recon::engine::{ReconMeta, ReconSummary};
use caseflow_recon::{reconcile, Dataset, ReconInput, ReconResult, Table};

use crate::discover::{latest_pull_date, resolve_inputs, BronzeInputs};
use crate::paths::{load_config, Layout};
use crate::CliError;

/// Gold file names shared by the archive and `current` folders.
const GOLD_FACTS: &str = "client_program_readiness_current.csv";
const GOLD_CLIENTS: &str = "client_readiness_current.csv";
const GOLD_DUPLICATES: &str = "duplicate_enrollments.csv";
const MANIFEST: &str = "_manifest.json";
const QUALITY: &str = "_quality.json";

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Manifest {
    pull_date: String,
    created_at: String,
    config: Option<String>,
    meta: ReconMeta,
    paths: ManifestPaths,
    bronze_used: BTreeMap<&'static str, String>,
    bronze_hashes: BTreeMap<&'static str, String>,
    ces_external_files: Vec<String>,
    ces_external_files_count: usize,
    ces_external_skipped: Vec<SkippedFile>,
    outputs: ManifestOutputs,
}

#[derive(Debug, Serialize)]
struct ManifestPaths {
    base: String,
    bronze: String,
    silver_out: String,
    gold_out: String,
    gold_current: String,
}

#[derive(Debug, Serialize)]
struct ManifestOutputs {
    silver: Vec<String>,
    extract_workbook: String,
}

#[derive(Debug, Clone, Serialize)]
struct SkippedFile {
    path: String,
    reason: String,
}

/// What `--json` prints on stdout.
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    pull_date: &'a str,
    config: Option<String>,
    gold_out: String,
    gold_current: String,
    external_files: usize,
    external_skipped: &'a [SkippedFile],
    summary: &'a ReconSummary,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Accept only `YYYY-MM-DD`.
pub fn parse_pull_date(text: &str) -> Result<NaiveDate, CliError> {
    let trimmed = text.trim();
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .filter(|d| d.format("%Y-%m-%d").to_string() == trimmed);
    date.ok_or_else(|| CliError::usage(format!("invalid pull date '{text}'")).with_hint("expected YYYY-MM-DD"))
}

pub fn cmd_latest(base: Option<PathBuf>) -> Result<(), CliError> {
    let layout = Layout::new(base);
    let date = latest_pull_date(&layout.bronze())
        .map_err(|e| CliError::input(e).with_hint("set --base or CASEFLOW_BASE to the staging root"))?;
    println!("{date}");
    Ok(())
}

pub fn cmd_run(pull_date: &str, base: Option<PathBuf>, config: Option<PathBuf>, json_output: bool) -> Result<(), CliError> {
    let reference_date = parse_pull_date(pull_date)?;
    let pull = reference_date.format("%Y-%m-%d").to_string();
    let layout = Layout::new(base);
    let (config, config_path) = load_config(config.as_deref(), &layout)?;

    let bronze = resolve_inputs(&layout.bronze(), &pull)
        .map_err(|e| CliError::input(e).with_hint("set --base or CASEFLOW_BASE to the staging root"))?;
    let (input, external) = load_inputs(&bronze)?;

    let result = reconcile(reference_date, &input, &config).map_err(CliError::recon)?;

    let silver_out = layout.silver_out(&pull);
    let silver_files = write_silver(&result, &silver_out)?;

    let gold_out = layout.gold_out(&pull);
    let gold_current = layout.gold_current();
    let extract_path = gold_out.join(format!("gold_extracts_{pull}.xlsx"));

    let manifest = Manifest {
        pull_date: pull.clone(),
        created_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        config: config_path.as_ref().map(|p| p.display().to_string()),
        meta: result.meta.clone(),
        paths: ManifestPaths {
            base: layout.base.display().to_string(),
            bronze: layout.bronze().display().to_string(),
            silver_out: silver_out.display().to_string(),
            gold_out: gold_out.display().to_string(),
            gold_current: gold_current.display().to_string(),
        },
        bronze_used: bronze
            .singles
            .iter()
            .map(|(dataset, path)| (dataset.name(), path.display().to_string()))
            .collect(),
        bronze_hashes: hash_inputs(&bronze)?,
        ces_external_files: external.used.iter().map(|p| p.display().to_string()).collect(),
        ces_external_files_count: external.used.len(),
        ces_external_skipped: external.skipped.clone(),
        outputs: ManifestOutputs {
            silver: silver_files,
            extract_workbook: extract_path.display().to_string(),
        },
    };
    let quality = result.quality().map_err(CliError::recon)?;

    // Archive, then the stable `current` copies.
    write_gold(&result, &gold_out, &extract_path)?;
    write_json(&manifest, &gold_out.join(MANIFEST))?;
    write_json(&quality, &gold_out.join(QUALITY))?;

    write_gold(&result, &gold_current, &gold_current.join("gold_extracts_current.xlsx"))?;
    write_json(&manifest, &gold_current.join(MANIFEST))?;
    write_json(&quality, &gold_current.join(QUALITY))?;

    let s = &result.summary;
    if json_output {
        let report = RunReport {
            pull_date: &pull,
            config: manifest.config.clone(),
            gold_out: manifest.paths.gold_out.clone(),
            gold_current: manifest.paths.gold_current.clone(),
            external_files: external.used.len(),
            external_skipped: &external.skipped,
            summary: s,
        };
        let text = serde_json::to_string_pretty(&report).map_err(|e| CliError::general(e.to_string()))?;
        println!("{text}");
    } else {
        eprintln!("pull date:  {pull}");
        eprintln!("facts:      {} client-program rows, {} clients", s.fact_rows, s.client_rows);
        eprintln!("duplicates: {} enrollment keys", s.duplicate_keys);
        eprintln!("ready:      {} document-ready, {} housing-matching-ready", s.document_ready, s.housing_matching_ready);
        eprintln!("silver:     {}", silver_out.display());
        eprintln!("gold:       {}", gold_out.display());
        eprintln!("current:    {}", gold_current.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ExternalLoad {
    used: Vec<PathBuf>,
    skipped: Vec<SkippedFile>,
}

fn load_inputs(bronze: &BronzeInputs) -> Result<(ReconInput, ExternalLoad), CliError> {
    let mut input = ReconInput::new();
    for (dataset, path) in &bronze.singles {
        let table = read_table(*dataset, path).map_err(CliError::input)?;
        log::info!("{dataset}: {} rows from {}", table.len(), path.display());
        input.insert(*dataset, table);
    }

    let (table, external) = merge_external(&bronze.external);
    log::info!(
        "{}: {} rows from {} files ({} skipped)",
        Dataset::AssessmentPrimary,
        table.len(),
        external.used.len(),
        external.skipped.len()
    );
    input.insert(Dataset::AssessmentPrimary, table);
    Ok((input, external))
}

/// Stack every readable, non-empty external export. Bad files are skipped.
fn merge_external(paths: &[PathBuf]) -> (Table, ExternalLoad) {
    let mut tables = Vec::new();
    let mut load = ExternalLoad::default();
    for path in paths {
        let reason = match read_table(Dataset::AssessmentPrimary, path) {
            Ok(table) if !table.is_empty() => {
                tables.push(table);
                load.used.push(path.clone());
                continue;
            }
            Ok(_) => "no data rows".to_string(),
            Err(e) => e,
        };
        log::warn!("skipping external assessment file {}: {reason}", path.display());
        load.skipped.push(SkippedFile { path: path.display().to_string(), reason });
    }
    (Table::concat(&tables), load)
}

fn hash_inputs(bronze: &BronzeInputs) -> Result<BTreeMap<&'static str, String>, CliError> {
    bronze
        .singles
        .iter()
        .map(|(dataset, path)| Ok((dataset.name(), sha256_file(path).map_err(CliError::input)?)))
        .collect()
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

fn write_csv(table: &Table, path: &Path) -> Result<(), CliError> {
    csv::export(table, path).map_err(CliError::write)?;
    log::debug!("wrote {} ({} rows)", path.display(), table.len());
    Ok(())
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), CliError> {
    json::export(value, path).map_err(CliError::write)
}

fn write_silver(result: &ReconResult, dir: &Path) -> Result<Vec<String>, CliError> {
    let mut written = Vec::new();
    for (stem, table) in result.silver_tables() {
        let path = dir.join(format!("{stem}.csv"));
        write_csv(&table, &path)?;
        written.push(path.display().to_string());
    }
    Ok(written)
}

fn write_gold(result: &ReconResult, dir: &Path, workbook: &Path) -> Result<(), CliError> {
    let duplicates = Table::from_records(&result.audit.enrollment_duplicate_detail);
    write_csv(&result.fact_table(), &dir.join(GOLD_FACTS))?;
    write_csv(&result.client_table(), &dir.join(GOLD_CLIENTS))?;
    write_csv(&duplicates, &dir.join(GOLD_DUPLICATES))?;

    let multi = &result.audit.active_multi_programs;
    let multi_detail = multi.detail_table(&result.schema);
    let multi_summary = Table::from_records(&multi.summary);
    let client_duplicates = result.client_duplicate_table();
    xlsx::export_sheets(
        workbook,
        &[
            ("Active_Multi_Programs_Detail", &multi_detail),
            ("Active_Multi_Programs_Summary", &multi_summary),
            ("Duplicate_Enrollments_Detail", &duplicates),
            ("Gold_Duplicate_ClientID", &client_duplicates),
        ],
    )
    .map_err(CliError::write)?;
    log::info!("published gold outputs to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn pull_date_must_be_iso() {
        assert_eq!(parse_pull_date("2025-01-31").unwrap(), NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        assert!(parse_pull_date("2025-1-31").is_err());
        assert!(parse_pull_date("01/31/2025").is_err());
        assert_eq!(parse_pull_date("2025-02-30").unwrap_err().code, crate::exit_codes::EXIT_USAGE);
    }

    #[test]
    fn external_merge_unions_headers_and_skips_bad_files() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("Weingart CES Data_A.csv");
        let b = dir.path().join("Weingart CES Data_B.csv");
        let empty = dir.path().join("Weingart CES Data_C.csv");
        fs::write(&a, "Clients Unique Identifier,Assessment Score\n1,9\n").unwrap();
        fs::write(&b, "Clients Unique Identifier,Survey Name\n2,CES Survey\n").unwrap();
        fs::write(&empty, "Clients Unique Identifier\n").unwrap();
        let missing = dir.path().join("Weingart CES Data_D.xlsx");

        let (table, load) = merge_external(&[a, b, empty, missing]);
        assert_eq!(table.headers, vec!["Clients Unique Identifier", "Assessment Score", "Survey Name"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, 2), "CES Survey");
        assert_eq!(table.cell(1, 1), "");
        assert_eq!(load.used.len(), 2);
        assert_eq!(load.skipped.len(), 2);
        assert_eq!(load.skipped[0].reason, "no data rows");
    }
}
