// File I/O operations

pub mod csv;
pub mod hash;
pub mod json;
pub mod xlsx;

use std::path::Path;

use caseflow_recon::{Dataset, Table};

pub use hash::sha256_file;

/// File extensions `read_table` accepts, lowercase.
pub const TABLE_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls"];

/// Load a CSV or Excel file into a table, choosing the reader by extension.
pub fn read_table(dataset: Dataset, path: &Path) -> Result<Table, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => csv::import(dataset, path),
        "xlsx" | "xls" => xlsx::import(path).map_err(|e| format!("{}: {e}", path.display())),
        _ => Err(format!("{}: unsupported file type", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn dispatch_by_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Services_2025-01-31.CSV");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        let table = read_table(Dataset::ServiceEvents, &path).unwrap();
        assert_eq!(table.len(), 1);

        let err = read_table(Dataset::ServiceEvents, &dir.path().join("notes.txt")).unwrap_err();
        assert!(err.contains("unsupported file type"));
    }
}
