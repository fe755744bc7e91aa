//! Bronze input discovery for a pull date.

use std::path::{Path, PathBuf};

use caseflow_io::TABLE_EXTENSIONS;
use caseflow_recon::Dataset;
use regex::Regex;

/// Bronze sub-folder of each single-file dataset.
pub const SINGLE_INPUTS: [(Dataset, &[&str]); 4] = [
    (Dataset::EnrollmentSpine, &["ProgramClientData"]),
    (Dataset::CaseNoteEvents, &["CaseNotes"]),
    (Dataset::ServiceEvents, &["Services"]),
    (Dataset::AssessmentSecondary, &["CES", "HMIS"]),
];

pub const EXTERNAL_FOLDER: &[&str] = &["CES", "External"];
pub const EXTERNAL_PREFIX: &str = "weingart ces data_";

#[derive(Debug, Clone)]
pub struct BronzeInputs {
    pub singles: Vec<(Dataset, PathBuf)>,
    pub external: Vec<PathBuf>,
}

pub fn resolve_inputs(bronze: &Path, pull_date: &str) -> Result<BronzeInputs, String> {
    let mut singles = Vec::with_capacity(SINGLE_INPUTS.len());
    for (dataset, parts) in SINGLE_INPUTS {
        let folder = join_all(bronze, parts);
        singles.push((dataset, select_one_for_pull_date(&folder, pull_date)?));
    }
    let external = discover_external(&join_all(bronze, EXTERNAL_FOLDER));
    Ok(BronzeInputs { singles, external })
}

fn join_all(root: &Path, parts: &[&str]) -> PathBuf {
    parts.iter().fold(root.to_path_buf(), |p, part| p.join(part))
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn has_table_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TABLE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// The first table file (by case-insensitive name) in `folder` whose name
/// carries the pull date, as `*_<date>.*`, `<date>_*` or anywhere.
pub fn select_one_for_pull_date(folder: &Path, pull_date: &str) -> Result<PathBuf, String> {
    if !folder.is_dir() {
        return Err(format!("bronze folder not found: {}", folder.display()));
    }
    let entries = std::fs::read_dir(folder).map_err(|e| format!("{}: {e}", folder.display()))?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_table_extension(p))
        .collect();
    candidates.sort_by_key(|p| file_name_lower(p));

    candidates
        .into_iter()
        .find(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            name.contains(pull_date)
        })
        .ok_or_else(|| {
            format!(
                "no file for pull date {pull_date} in {} (expected names like '*_{pull_date}.csv' or '{pull_date}_*.xlsx')",
                folder.display()
            )
        })
}

/// Every external assessment export below `folder`, sorted by
/// case-insensitive name. A missing folder yields no files.
pub fn discover_external(folder: &Path) -> Vec<PathBuf> {
    if !folder.is_dir() {
        log::warn!("external assessment folder not found: {}", folder.display());
        return Vec::new();
    }
    let pattern = format!("{}/**/*", glob::Pattern::escape(&folder.to_string_lossy()));
    let paths = match glob::glob(&pattern) {
        Ok(paths) => paths,
        Err(e) => {
            log::warn!("cannot scan {}: {e}", folder.display());
            return Vec::new();
        }
    };

    let mut out: Vec<PathBuf> = paths
        .filter_map(|entry| match entry {
            Ok(p) => Some(p),
            Err(e) => {
                log::warn!("skipping unreadable path: {e}");
                None
            }
        })
        .filter(|p| p.is_file() && is_external_export(folder, p))
        .collect();
    out.sort_by_key(|p| file_name_lower(p));
    out
}

fn is_external_export(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let archived = relative.components().any(|c| {
        let part = c.as_os_str().to_string_lossy().to_lowercase();
        part == "archive" || part == "_archive"
    });
    if archived {
        return false;
    }
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    !name.starts_with("~$") && name.to_lowercase().starts_with(EXTERNAL_PREFIX) && has_table_extension(path)
}

/// Latest date among `ProgramClientData_YYYY-MM-DD.*` files.
pub fn latest_pull_date(bronze: &Path) -> Result<String, String> {
    let folder = join_all(bronze, SINGLE_INPUTS[0].1);
    if !folder.is_dir() {
        return Err(format!("bronze folder not found: {}", folder.display()));
    }
    let date = Regex::new(r"(\d{4}-\d{2}-\d{2})").map_err(|e| e.to_string())?;
    let entries = std::fs::read_dir(&folder).map_err(|e| format!("{}: {e}", folder.display()))?;

    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with("ProgramClientData_") {
                return None;
            }
            date.captures(&name).map(|c| c[1].to_string())
        })
        .max()
        .ok_or_else(|| {
            format!(
                "no pull-dated files in {} (expected names like ProgramClientData_YYYY-MM-DD.csv)",
                folder.display()
            )
        })
}
