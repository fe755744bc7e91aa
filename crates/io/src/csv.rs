// CSV table import/export

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use caseflow_recon::{Dataset, Table};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn import(dataset: Dataset, path: &Path) -> Result<Table, String> {
    let content = read_file_as_utf8(path)?;
    Table::from_csv_str(dataset, &content).map_err(|e| e.to_string())
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
/// A leading byte-order mark is dropped.
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| format!("{}: {e}", path.display()))?;

    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            log::debug!("{}: not UTF-8, decoded as Windows-1252", path.display());
            decoded.into_owned()
        }
    };

    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Write a table as UTF-8 CSV with a byte-order mark, creating parent folders.
pub fn export(table: &Table, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("{}: {e}", parent.display()))?;
    }
    let file = File::create(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut out = BufWriter::new(file);
    out.write_all(UTF8_BOM).map_err(|e| e.to_string())?;

    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);
    writer.write_record(&table.headers).map_err(|e| e.to_string())?;
    for row in &table.rows {
        writer.write_record(row).map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())?;
    Ok(())
}
