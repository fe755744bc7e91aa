//! Canonicalization of identifiers, text, dates and numbers, and the
//! table -> typed record conversion for every input dataset.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::config::{AssessmentColumns, EnrollmentColumns, MonthlyColumns};
use crate::error::ReconError;
use crate::model::{AnomalyKind, AssessmentRecord, EnrollmentRecord, MonthlyEvent, ParseAnomaly, SourceTag};
use crate::table::{Dataset, Table};

// ---------------------------------------------------------------------------
// Value canonicalization
// ---------------------------------------------------------------------------

/// Canonical identifier: strips byte-order marks and zero-width characters,
/// folds non-breaking spaces and whitespace runs to one space, trims.
pub fn canon_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.chars() {
        match ch {
            '\u{feff}' | '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{2060}' => {}
            c if c == '\u{a0}' || c.is_whitespace() => pending_space = true,
            c => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            }
        }
    }
    out
}

/// Trimmed free text; empty means absent.
pub fn canon_text(raw: &str) -> Option<String> {
    let s = raw.replace('\u{feff}', "");
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%d-%b-%Y", "%b %d, %Y", "%B %d, %Y"];

/// Exclusive bound for fractional counts; `i64::MAX as f64` rounds up to 2^63.
const MAX_COUNT: f64 = i64::MAX as f64;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

/// Permissive date parser. Never fails: unparseable input is `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            // %Y happily reads "24" as year 24; leave two-digit years to %y.
            if d.year() >= 1000 {
                return Some(d);
            }
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%m/%d/%y") {
        return Some(d);
    }
    parse_datetime(s).map(|dt| dt.date())
}

/// Permissive timestamp parser; a bare date reads as midnight.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .filter(|d| d.year() >= 1000)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Finite number or `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

/// Resolves mapped source headers against one table, collecting every missing
/// required column before failing.
struct Columns<'a> {
    dataset: Dataset,
    table: &'a Table,
    missing: Vec<String>,
}

impl<'a> Columns<'a> {
    fn new(dataset: Dataset, table: &'a Table) -> Self {
        Self { dataset, table, missing: Vec::new() }
    }

    fn required(&mut self, header: &str) -> usize {
        match self.table.column_index(header) {
            Some(i) => i,
            None => {
                self.missing.push(header.to_string());
                usize::MAX
            }
        }
    }

    fn optional(&self, header: Option<&str>) -> Option<usize> {
        header.and_then(|h| self.table.column_index(h))
    }

    fn finish(mut self) -> Result<(), ReconError> {
        if self.missing.is_empty() {
            return Ok(());
        }
        self.missing.sort();
        Err(ReconError::MissingRequiredColumn {
            dataset: self.dataset,
            columns: self.missing,
        })
    }
}

/// Reads typed cells from one row and records parse anomalies.
struct RowReader<'a> {
    dataset: Dataset,
    table: &'a Table,
    row: usize,
    anomalies: &'a mut Vec<ParseAnomaly>,
}

impl RowReader<'_> {
    fn raw(&self, col: Option<usize>) -> &str {
        col.map(|c| self.table.cell(self.row, c)).unwrap_or("")
    }

    fn id(&self, col: usize) -> String {
        canon_id(self.table.cell(self.row, col))
    }

    fn text(&self, col: Option<usize>) -> Option<String> {
        canon_text(self.raw(col))
    }

    fn date(&mut self, col: Option<usize>) -> Option<NaiveDate> {
        let raw = self.raw(col).trim().to_string();
        let parsed = parse_date(&raw);
        if parsed.is_none() {
            self.note(col, raw, AnomalyKind::UnparseableDate);
        }
        parsed
    }

    fn datetime(&mut self, col: Option<usize>) -> Option<NaiveDateTime> {
        let raw = self.raw(col).trim().to_string();
        let parsed = parse_datetime(&raw);
        if parsed.is_none() {
            self.note(col, raw, AnomalyKind::UnparseableDate);
        }
        parsed
    }

    fn number(&mut self, col: Option<usize>) -> Option<f64> {
        let raw = self.raw(col).trim().to_string();
        let parsed = parse_number(&raw);
        if parsed.is_none() {
            self.note(col, raw, AnomalyKind::UnparseableNumber);
        }
        parsed
    }

    /// Non-negative whole count that fits in i64; anything else counts as zero.
    fn count(&mut self, col: usize) -> i64 {
        let raw = self.table.cell(self.row, col).trim().to_string();
        if let Ok(n) = raw.parse::<i64>() {
            if n >= 0 {
                return n;
            }
        }
        match parse_number(&raw) {
            Some(v) if v >= 0.0 && v < MAX_COUNT => v.trunc() as i64,
            _ => {
                self.note(Some(col), raw, AnomalyKind::UnparseableNumber);
                0
            }
        }
    }

    fn note(&mut self, col: Option<usize>, raw: String, kind: AnomalyKind) {
        let Some(c) = col else { return };
        if raw.is_empty() {
            return;
        }
        self.anomalies.push(ParseAnomaly {
            dataset: self.dataset,
            column: self.table.headers.get(c).cloned().unwrap_or_default(),
            row: self.row,
            value: raw,
            kind,
        });
    }
}

/// Typed records plus the anomalies met while producing them.
#[derive(Debug, Clone)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub anomalies: Vec<ParseAnomaly>,
}

impl<T> Default for Normalized<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            anomalies: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Enrollment spine
// ---------------------------------------------------------------------------

/// Optional enrollment columns; the fact schema omits the ones a source lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnrollmentField {
    ActiveInProject,
    ClientFullName,
    RoiActive,
    DaysInProject,
    ProjectStartDate,
    ContactName,
    ContactPhone,
    ContactEmail,
    ContactDate,
    DobDataQuality,
    SsnDataQuality,
    SsnLast4,
    Deleted,
    TbClearanceDate,
    LastAssessmentId,
    LastAssessmentDate,
    FileList,
    AssignedStaff,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedEnrollments {
    pub records: Vec<EnrollmentRecord>,
    pub anomalies: Vec<ParseAnomaly>,
    pub present: BTreeSet<EnrollmentField>,
}

pub fn normalize_enrollments(table: &Table, cols: &EnrollmentColumns) -> Result<NormalizedEnrollments, ReconError> {
    let dataset = Dataset::EnrollmentSpine;
    let mut resolver = Columns::new(dataset, table);
    let client_idx = resolver.required(&cols.client_id);
    let program_idx = resolver.required(&cols.program_name);

    use EnrollmentField as F;
    let optional = [
        (F::ActiveInProject, &cols.active_in_project),
        (F::ClientFullName, &cols.client_full_name),
        (F::RoiActive, &cols.roi_active),
        (F::DaysInProject, &cols.days_in_project),
        (F::ProjectStartDate, &cols.project_start_date),
        (F::ContactName, &cols.contact_name),
        (F::ContactPhone, &cols.contact_phone),
        (F::ContactEmail, &cols.contact_email),
        (F::ContactDate, &cols.contact_date),
        (F::DobDataQuality, &cols.dob_data_quality),
        (F::SsnDataQuality, &cols.ssn_data_quality),
        (F::SsnLast4, &cols.ssn_last4),
        (F::Deleted, &cols.deleted),
        (F::TbClearanceDate, &cols.tb_clearance_date),
        (F::LastAssessmentId, &cols.last_assessment_id),
        (F::LastAssessmentDate, &cols.last_assessment_date),
        (F::FileList, &cols.file_list),
        (F::AssignedStaff, &cols.assigned_staff),
    ];
    let idx: Vec<(EnrollmentField, Option<usize>)> = optional
        .iter()
        .map(|(field, header)| (*field, resolver.optional(Some(header.as_str()))))
        .collect();
    resolver.finish()?;

    let col = |field: EnrollmentField| idx.iter().find(|(f, _)| *f == field).and_then(|(_, i)| *i);
    let present: BTreeSet<EnrollmentField> = idx.iter().filter(|(_, i)| i.is_some()).map(|(f, _)| *f).collect();

    let mut anomalies = Vec::new();
    let mut records = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let mut r = RowReader { dataset, table, row, anomalies: &mut anomalies };
        records.push(EnrollmentRecord {
            client_id: r.id(client_idx),
            program_name: r.id(program_idx),
            active_in_project: r.text(col(F::ActiveInProject)),
            deleted: r.text(col(F::Deleted)),
            days_in_project: r.number(col(F::DaysInProject)),
            project_start_date: r.date(col(F::ProjectStartDate)),
            client_full_name: r.text(col(F::ClientFullName)),
            roi_active: r.text(col(F::RoiActive)),
            contact_name: r.text(col(F::ContactName)),
            contact_phone: r.text(col(F::ContactPhone)),
            contact_email: r.text(col(F::ContactEmail)),
            contact_date: r.date(col(F::ContactDate)),
            dob_data_quality: r.text(col(F::DobDataQuality)),
            ssn_data_quality: r.text(col(F::SsnDataQuality)),
            ssn_last4: r.text(col(F::SsnLast4)),
            tb_clearance_date: r.text(col(F::TbClearanceDate)),
            last_assessment_id: r.text(col(F::LastAssessmentId)),
            last_assessment_date: r.date(col(F::LastAssessmentDate)),
            file_list: r.text(col(F::FileList)),
            assigned_staff: r.text(col(F::AssignedStaff)),
            source_row: row,
        });
    }

    log::debug!("{dataset}: normalized {} rows ({} anomalies)", records.len(), anomalies.len());
    Ok(NormalizedEnrollments { records, anomalies, present })
}

// ---------------------------------------------------------------------------
// Monthly event extracts
// ---------------------------------------------------------------------------

pub fn normalize_monthly_events(
    dataset: Dataset,
    table: &Table,
    cols: &MonthlyColumns,
) -> Result<Normalized<MonthlyEvent>, ReconError> {
    let mut resolver = Columns::new(dataset, table);
    let client_idx = resolver.required(&cols.client_id);
    let program_idx = resolver.required(&cols.program_name);
    let month_idx = resolver.required(&cols.month);
    let count_idx = resolver.required(&cols.count);
    let staff_idx = resolver.optional(cols.staff.as_deref());
    resolver.finish()?;

    let mut anomalies = Vec::new();
    let mut records = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let mut r = RowReader { dataset, table, row, anomalies: &mut anomalies };
        records.push(MonthlyEvent {
            client_id: r.id(client_idx),
            program_name: r.id(program_idx),
            month: r.id(month_idx),
            count: r.count(count_idx),
            staff: r.text(staff_idx),
            source_row: row,
        });
    }

    log::debug!("{dataset}: normalized {} rows ({} anomalies)", records.len(), anomalies.len());
    Ok(Normalized { records, anomalies })
}

// ---------------------------------------------------------------------------
// Assessment extracts
// ---------------------------------------------------------------------------

/// A table without data rows is an empty source, whatever its headers.
pub fn normalize_assessments(
    dataset: Dataset,
    table: &Table,
    cols: &AssessmentColumns,
    source_tag: SourceTag,
) -> Result<Normalized<AssessmentRecord>, ReconError> {
    if table.is_empty() {
        log::debug!("{dataset}: empty source");
        return Ok(Normalized::default());
    }

    let mut resolver = Columns::new(dataset, table);
    let client_idx = resolver.required(&cols.client_id);
    let survey_idx = resolver.required(&cols.survey_name);
    let date_idx = resolver.required(&cols.assessment_date);
    let score_idx = resolver.required(&cols.assessment_score);
    let id_idx = resolver.optional(cols.assessment_id.as_deref());
    let updated_idx = resolver.optional(cols.last_updated.as_deref());
    let ce_idx = resolver.optional(cols.is_coordinated_entry.as_deref());
    let agency_idx = resolver.optional(cols.assessing_agency.as_deref());
    resolver.finish()?;

    let mut anomalies = Vec::new();
    let mut records = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let mut r = RowReader { dataset, table, row, anomalies: &mut anomalies };
        records.push(AssessmentRecord {
            client_id: r.id(client_idx),
            survey_name: r.text(Some(survey_idx)),
            assessment_date: r.date(Some(date_idx)),
            assessment_score: r.number(Some(score_idx)),
            assessment_id: r.number(id_idx),
            last_updated: r.datetime(updated_idx),
            is_coordinated_entry: r.text(ce_idx),
            assessing_agency: r.text(agency_idx),
            source_tag,
            source_row: row,
        });
    }

    log::debug!("{dataset}: normalized {} rows ({} anomalies)", records.len(), anomalies.len());
    Ok(Normalized { records, anomalies })
}
