use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ReconError;
use crate::table::Table;

/// Duplicated keys listed in a report, most frequent first.
const SAMPLE_DUPLICATE_KEYS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyCount {
    #[serde(flatten)]
    pub key: BTreeMap<String, String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    /// Share of empty cells per column, rounded to 4 places.
    pub null_rates: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_key_rows: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub duplicate_key_sample: Vec<KeyCount>,
}

pub fn quality_report(name: &str, table: &Table, key_columns: &[&str]) -> Result<QualityReport, ReconError> {
    let null_rates = table
        .headers
        .iter()
        .enumerate()
        .map(|(c, header)| {
            let rate = if table.is_empty() {
                0.0
            } else {
                let empty = (0..table.len()).filter(|&r| table.cell(r, c).trim().is_empty()).count();
                empty as f64 / table.len() as f64
            };
            (header.clone(), (rate * 10_000.0).round() / 10_000.0)
        })
        .collect();

    let mut report = QualityReport {
        name: name.to_string(),
        rows: table.len(),
        cols: table.headers.len(),
        null_rates,
        duplicate_key_rows: None,
        duplicate_key_sample: Vec::new(),
    };
    if key_columns.is_empty() {
        return Ok(report);
    }

    let mut missing: Vec<String> = key_columns
        .iter()
        .filter(|k| !table.has_column(k))
        .map(|k| k.to_string())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(ReconError::MissingKeyColumn {
            table: name.to_string(),
            columns: missing,
        });
    }

    let idx: Vec<usize> = key_columns.iter().filter_map(|k| table.column_index(k)).collect();
    let mut counts: BTreeMap<Vec<&str>, usize> = BTreeMap::new();
    for r in 0..table.len() {
        let key: Vec<&str> = idx.iter().map(|&c| table.cell(r, c)).collect();
        *counts.entry(key).or_default() += 1;
    }

    let mut dupes: Vec<(Vec<&str>, usize)> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
    report.duplicate_key_rows = Some(dupes.iter().map(|(_, n)| n).sum());
    // Stable sort: equal counts stay in key order.
    dupes.sort_by(|a, b| b.1.cmp(&a.1));
    report.duplicate_key_sample = dupes
        .into_iter()
        .take(SAMPLE_DUPLICATE_KEYS)
        .map(|(values, count)| KeyCount {
            key: key_columns
                .iter()
                .zip(values)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            count,
        })
        .collect();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table {
            headers: vec!["client_id".into(), "program_name".into(), "note".into()],
            rows: vec![
                vec!["1".into(), "A".into(), "".into()],
                vec!["1".into(), "A".into(), "x".into()],
                vec!["2".into(), "A".into(), "".into()],
                vec!["3".into(), "B".into(), "".into()],
                vec!["3".into(), "B".into(), "y".into()],
                vec!["3".into(), "B".into(), "z".into()],
            ],
        }
    }

    #[test]
    fn null_rates_and_duplicate_keys() {
        let report = quality_report("facts", &table(), &["client_id", "program_name"]).unwrap();
        assert_eq!(report.rows, 6);
        assert_eq!(report.cols, 3);
        assert_eq!(report.null_rates["client_id"], 0.0);
        assert_eq!(report.null_rates["note"], 0.5);
        assert_eq!(report.duplicate_key_rows, Some(5));
        assert_eq!(report.duplicate_key_sample.len(), 2);
        assert_eq!(report.duplicate_key_sample[0].count, 3);
        assert_eq!(report.duplicate_key_sample[0].key["client_id"], "3");
        assert_eq!(report.duplicate_key_sample[1].key["client_id"], "1");
    }

    #[test]
    fn duplicate_sample_serializes_flat() {
        let report = quality_report("facts", &table(), &["client_id", "program_name"]).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["duplicate_key_rows"], 5);
        let first = &json["duplicate_key_sample"][0];
        assert_eq!(first["client_id"], "3");
        assert_eq!(first["program_name"], "B");
        assert_eq!(first["count"], 3);
        assert!(first.get("key").is_none());

        let bare = serde_json::to_value(quality_report("empty", &Table::new(vec!["a".into()]), &[]).unwrap()).unwrap();
        assert!(bare.get("duplicate_key_rows").is_none());
        assert!(bare.get("duplicate_key_sample").is_none());
    }

    #[test]
    fn missing_key_column_is_an_error() {
        let err = quality_report("facts", &table(), &["client_id", "month"]).unwrap_err();
        assert_eq!(
            err,
            ReconError::MissingKeyColumn {
                table: "facts".into(),
                columns: vec!["month".into()],
            }
        );
    }

    #[test]
    fn no_keys_means_no_duplicate_section() {
        let report = quality_report("empty", &Table::new(vec!["a".into()]), &[]).unwrap();
        assert_eq!(report.rows, 0);
        assert_eq!(report.null_rates["a"], 0.0);
        assert_eq!(report.duplicate_key_rows, None);
    }
}
