use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{EnrollmentRecord, EntityKey};
use crate::table::IntoRow;

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Total order over enrollment rows; the greater rank is the better row.
///
/// Active beats inactive, not-deleted beats deleted, longer tenure beats
/// shorter (absent tenure is -1), later start beats earlier (absent is
/// lowest). Equal ranks are left to input order by the callers.
#[derive(Debug, Clone, Copy)]
pub struct EnrollmentRank {
    active: bool,
    not_deleted: bool,
    days: f64,
    start: Option<NaiveDate>,
}

impl EnrollmentRank {
    pub fn of(record: &EnrollmentRecord) -> Self {
        Self {
            active: record.is_active(),
            not_deleted: !record.is_deleted(),
            days: record.days_in_project.unwrap_or(-1.0),
            start: record.project_start_date,
        }
    }
}

impl Ord for EnrollmentRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.active
            .cmp(&other.active)
            .then(self.not_deleted.cmp(&other.not_deleted))
            .then(self.days.total_cmp(&other.days))
            .then(self.start.cmp(&other.start))
    }
}

impl PartialOrd for EnrollmentRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EnrollmentRank {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EnrollmentRank {}

/// Index of the best-ranked item; the earliest one wins a tie.
pub(crate) fn best_index<T>(items: &[T], rank: impl Fn(&T) -> EnrollmentRank) -> Option<usize> {
    let mut best: Option<(usize, EnrollmentRank)> = None;
    for (i, item) in items.iter().enumerate() {
        let r = rank(item);
        match best {
            Some((_, b)) if r <= b => {}
            _ => best = Some((i, r)),
        }
    }
    best.map(|(i, _)| i)
}

// ---------------------------------------------------------------------------
// Audit artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateSummary {
    pub client_id: String,
    pub program_name: String,
    pub duplicate_row_count: usize,
}

impl IntoRow for DuplicateSummary {
    const HEADERS: &'static [&'static str] = &["client_id", "program_name", "duplicate_row_count"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.client_id.clone(),
            self.program_name.clone(),
            self.duplicate_row_count.to_string(),
        ]
    }
}

/// Every raw row of a duplicate group, winners included.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateDetail {
    pub record: EnrollmentRecord,
    pub row_count: usize,
}

impl IntoRow for DuplicateDetail {
    const HEADERS: &'static [&'static str] = &[
        "client_id",
        "active_in_project",
        "client_full_name",
        "roi_active",
        "days_in_project",
        "project_start_date",
        "Client Custom Point of Contact Name",
        "Client Custom Point of Contact Phone",
        "Client Custom Point of Contact Email",
        "Client Custom Point of Contact Date",
        "Clients DoB Data Quality",
        "Clients SSN Data Quality",
        "Clients SSN - Last 4",
        "enrollment_deleted",
        "Client Assessment Custom TB Clearance Date",
        "program_name",
        "last_assessment_id",
        "last_assessment_date",
        "file_list",
        "assigned_staff",
        "row_count",
        "roi_active_flag",
        "enrollment_deleted_flag",
    ];

    fn cells(&self) -> Vec<String> {
        let mut cells = self.record.cells();
        cells.push(self.row_count.to_string());
        cells.push(u8::from(self.record.roi_active()).to_string());
        cells.push(u8::from(self.record.is_deleted()).to_string());
        cells
    }
}

// ---------------------------------------------------------------------------
// Deduplicate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Deduplicated {
    /// One row per key, sorted by key.
    pub current: Vec<EnrollmentRecord>,
    pub summary: Vec<DuplicateSummary>,
    pub detail: Vec<DuplicateDetail>,
}

pub fn deduplicate(records: &[EnrollmentRecord]) -> Deduplicated {
    let mut groups: BTreeMap<EntityKey, Vec<&EnrollmentRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.key()).or_default().push(record);
    }

    let mut out = Deduplicated::default();
    for (key, rows) in groups {
        let Some(winner) = best_index(&rows, |r| EnrollmentRank::of(r)) else {
            continue;
        };
        out.current.push(rows[winner].clone());

        if rows.len() > 1 {
            out.summary.push(DuplicateSummary {
                client_id: key.client_id.clone(),
                program_name: key.program_name.clone(),
                duplicate_row_count: rows.len(),
            });
            out.detail.extend(rows.iter().map(|r| DuplicateDetail {
                record: (*r).clone(),
                row_count: rows.len(),
            }));
        }
    }

    out.summary.sort_by(|a, b| {
        b.duplicate_row_count
            .cmp(&a.duplicate_row_count)
            .then_with(|| a.client_id.cmp(&b.client_id))
            .then_with(|| a.program_name.cmp(&b.program_name))
    });
    out.detail.sort_by(|a, b| {
        a.record
            .client_id
            .cmp(&b.record.client_id)
            .then_with(|| a.record.program_name.cmp(&b.record.program_name))
            .then_with(|| b.record.project_start_date.cmp(&a.record.project_start_date))
    });

    if !out.summary.is_empty() {
        log::warn!(
            "enrollment_spine: {} keys had duplicate rows ({} rows resolved)",
            out.summary.len(),
            out.detail.len()
        );
    }
    out
}
