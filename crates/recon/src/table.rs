//! String tables exchanged with collaborators, and the typed-record -> table rendering.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ReconError;
use crate::normalize::canon_id;

// ---------------------------------------------------------------------------
// Dataset names
// ---------------------------------------------------------------------------

/// The named input datasets a run consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    EnrollmentSpine,
    CaseNoteEvents,
    ServiceEvents,
    AssessmentPrimary,
    AssessmentSecondary,
}

impl Dataset {
    pub const ALL: [Dataset; 5] = [
        Dataset::EnrollmentSpine,
        Dataset::CaseNoteEvents,
        Dataset::ServiceEvents,
        Dataset::AssessmentPrimary,
        Dataset::AssessmentSecondary,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::EnrollmentSpine => "enrollment_spine",
            Self::CaseNoteEvents => "case_note_events",
            Self::ServiceEvents => "service_events",
            Self::AssessmentPrimary => "assessment_primary",
            Self::AssessmentSecondary => "assessment_secondary",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A loaded row-and-column table with string headers and string cells.
///
/// Rows may be ragged; missing trailing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self { headers, rows: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column, matching on canonicalized header text
    /// (BOM / zero-width / NBSP stripped, whitespace collapsed).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = canon_id(name);
        self.headers.iter().position(|h| canon_id(h) == wanted)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Parse CSV text with a header row.
    pub fn from_csv_str(dataset: Dataset, data: &str) -> Result<Self, ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_bytes());

        let parse_err = |e: csv::Error| ReconError::TableParse {
            dataset,
            message: e.to_string(),
        };

        let headers: Vec<String> = reader
            .headers()
            .map_err(parse_err)?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(parse_err)?;
            if record.iter().all(|v| v.trim().is_empty()) {
                continue;
            }
            rows.push(record.iter().map(|v| v.to_string()).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Stack tables vertically. The result's headers are the union of all
    /// headers in first-seen order; cells for columns a table lacks are empty.
    pub fn concat(tables: &[Table]) -> Table {
        let mut headers: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for t in tables {
            for h in &t.headers {
                let key = canon_id(h);
                if !positions.contains_key(&key) {
                    positions.insert(key, headers.len());
                    headers.push(h.clone());
                }
            }
        }

        let mut rows = Vec::new();
        for t in tables {
            let mapping: Vec<usize> = t.headers.iter().map(|h| positions[&canon_id(h)]).collect();
            for src in &t.rows {
                let mut row = vec![String::new(); headers.len()];
                for (i, value) in src.iter().enumerate() {
                    if let Some(&target) = mapping.get(i) {
                        row[target] = value.clone();
                    }
                }
                rows.push(row);
            }
        }

        Table { headers, rows }
    }

    /// Render typed records with a fixed header set.
    pub fn from_records<T: IntoRow>(records: &[T]) -> Table {
        Table {
            headers: T::HEADERS.iter().map(|h| h.to_string()).collect(),
            rows: records.iter().map(IntoRow::cells).collect(),
        }
    }
}

/// A typed record that renders to a fixed-schema table row.
pub trait IntoRow {
    const HEADERS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// Cell formatting
// ---------------------------------------------------------------------------

pub fn fmt_date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

/// Integral values render without a fractional part (`12`, not `12.0`).
pub fn fmt_number(n: Option<f64>) -> String {
    match n {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        Some(v) => format!("{v}"),
        None => String::new(),
    }
}

pub fn fmt_text(s: Option<&String>) -> String {
    s.cloned().unwrap_or_default()
}
