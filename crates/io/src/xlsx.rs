// Excel table import (xlsx, xls) and multi-sheet workbook export (xlsx only)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};
use rust_xlsxwriter::Workbook;

use caseflow_recon::Table;

/// Excel caps sheet names at 31 characters.
const MAX_SHEET_NAME: usize = 31;

/// Import the first sheet. The first row holds the headers; blank rows are skipped.
pub fn import(path: &Path) -> Result<Table, String> {
    let mut workbook = open_workbook_auto(path).map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let Some(first) = sheet_names.first() else {
        return Err("Excel file contains no sheets".to_string());
    };
    let range = workbook
        .worksheet_range(first)
        .map_err(|e| format!("Failed to read sheet '{}': {}", first, e))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(row) => row.iter().map(cell_to_string).collect(),
        None => return Ok(Table::default()),
    };

    let mut table = Table::new(headers);
    for row in rows {
        let cells: Vec<String> = row.iter().map(cell_to_string).collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        table.rows.push(cells);
    }
    Ok(table)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Format nicely: integers without decimals
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => format!("{}", n),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        // Error cells carry no usable value
        Data::Error(_) => String::new(),
        Data::DateTime(dt) => excel_serial_to_string(dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Render an Excel serial date (1900 system) as `YYYY-MM-DD`, or
/// `YYYY-MM-DD HH:MM:SS` when it has a time part.
pub fn excel_serial_to_string(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0)) else {
        return serial.to_string();
    };
    let seconds = (serial * 86_400.0).round() as i64;
    let dt = epoch + Duration::seconds(seconds);
    if seconds % 86_400 == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Write one sheet per table, headers in the first row, creating parent folders.
pub fn export_sheets(path: &Path, sheets: &[(&str, &Table)]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("{}: {e}", parent.display()))?;
    }

    let mut workbook = Workbook::new();
    for &(name, table) in sheets {
        let safe: String = if name.is_empty() { "Sheet1" } else { name }.chars().take(MAX_SHEET_NAME).collect();
        let worksheet = workbook
            .add_worksheet()
            .set_name(&safe)
            .map_err(|e| format!("Failed to create sheet '{}': {}", safe, e))?;

        for (col, header) in table.headers.iter().enumerate() {
            worksheet
                .write_string(0, col as u16, header)
                .map_err(|e| format!("Failed to write header in '{}': {}", safe, e))?;
        }
        for (r, row) in table.rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                worksheet
                    .write_string((r + 1) as u32, col as u16, value)
                    .map_err(|e| format!("Failed to write cell in '{}': {}", safe, e))?;
            }
        }
    }

    workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {}", e))?;
    Ok(())
}
