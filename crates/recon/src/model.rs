use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::table::{fmt_date, fmt_number, fmt_text, Dataset, IntoRow};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Join / group key. Both parts are canonicalized before construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityKey {
    pub client_id: String,
    pub program_name: String,
}

impl EntityKey {
    pub fn new(client_id: impl Into<String>, program_name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            program_name: program_name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Enrollment
// ---------------------------------------------------------------------------

/// One client-in-program row from the enrollment spine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrollmentRecord {
    pub client_id: String,
    pub program_name: String,
    pub active_in_project: Option<String>,
    pub deleted: Option<String>,
    pub days_in_project: Option<f64>,
    pub project_start_date: Option<NaiveDate>,
    pub client_full_name: Option<String>,
    pub roi_active: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub contact_date: Option<NaiveDate>,
    pub dob_data_quality: Option<String>,
    pub ssn_data_quality: Option<String>,
    pub ssn_last4: Option<String>,
    pub tb_clearance_date: Option<String>,
    pub last_assessment_id: Option<String>,
    pub last_assessment_date: Option<NaiveDate>,
    pub file_list: Option<String>,
    pub assigned_staff: Option<String>,
    /// Zero-based position in the source table; the final tiebreak.
    pub source_row: usize,
}

impl EnrollmentRecord {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.client_id.clone(), self.program_name.clone())
    }

    pub fn is_active(&self) -> bool {
        is_yes(self.active_in_project.as_deref())
    }

    pub fn is_deleted(&self) -> bool {
        is_yes(self.deleted.as_deref())
    }

    pub fn roi_active(&self) -> bool {
        is_yes(self.roi_active.as_deref())
    }
}

fn is_yes(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("yes"))
}

impl IntoRow for EnrollmentRecord {
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
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.client_id.clone(),
            fmt_text(self.active_in_project.as_ref()),
            fmt_text(self.client_full_name.as_ref()),
            fmt_text(self.roi_active.as_ref()),
            fmt_number(self.days_in_project),
            fmt_date(self.project_start_date),
            fmt_text(self.contact_name.as_ref()),
            fmt_text(self.contact_phone.as_ref()),
            fmt_text(self.contact_email.as_ref()),
            fmt_date(self.contact_date),
            fmt_text(self.dob_data_quality.as_ref()),
            fmt_text(self.ssn_data_quality.as_ref()),
            fmt_text(self.ssn_last4.as_ref()),
            fmt_text(self.deleted.as_ref()),
            fmt_text(self.tb_clearance_date.as_ref()),
            self.program_name.clone(),
            fmt_text(self.last_assessment_id.as_ref()),
            fmt_date(self.last_assessment_date),
            fmt_text(self.file_list.as_ref()),
            fmt_text(self.assigned_staff.as_ref()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Monthly counts
// ---------------------------------------------------------------------------

/// One normalized event-level row (before summation).
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyEvent {
    pub client_id: String,
    pub program_name: String,
    pub month: String,
    pub count: i64,
    pub staff: Option<String>,
    pub source_row: usize,
}

impl MonthlyEvent {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.client_id.clone(), self.program_name.clone())
    }
}

/// Summed count per (client, program, month).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyCount {
    pub client_id: String,
    pub program_name: String,
    pub month: String,
    pub count: i64,
    /// Distinct staff names for the month, sorted and comma-joined.
    pub staff_list: Option<String>,
}

impl MonthlyCount {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.client_id.clone(), self.program_name.clone())
    }
}

impl IntoRow for MonthlyCount {
    const HEADERS: &'static [&'static str] = &["client_id", "program_name", "month", "count", "staff_list"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.client_id.clone(),
            self.program_name.clone(),
            self.month.clone(),
            self.count.to_string(),
            fmt_text(self.staff_list.as_ref()),
        ]
    }
}

/// The latest monthly count on or before the reference month.
pub type AsOfSnapshot = MonthlyCount;

/// A (client, program, month) that arrived on more than one raw row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyDuplicate {
    pub client_id: String,
    pub program_name: String,
    pub month: String,
    pub raw_row_count: usize,
}

impl IntoRow for MonthlyDuplicate {
    const HEADERS: &'static [&'static str] = &["client_id", "program_name", "month", "raw_row_count"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.client_id.clone(),
            self.program_name.clone(),
            self.month.clone(),
            self.raw_row_count.to_string(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Assessments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Primary,
    Secondary,
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentRecord {
    pub client_id: String,
    pub survey_name: Option<String>,
    pub assessment_date: Option<NaiveDate>,
    pub assessment_score: Option<f64>,
    pub assessment_id: Option<f64>,
    pub last_updated: Option<NaiveDateTime>,
    pub is_coordinated_entry: Option<String>,
    pub assessing_agency: Option<String>,
    pub source_tag: SourceTag,
    pub source_row: usize,
}

impl IntoRow for AssessmentRecord {
    const HEADERS: &'static [&'static str] = &[
        "client_id",
        "survey_name",
        "assessment_date",
        "assessment_score",
        "is_coordinated_entry",
        "assessing_agency",
        "ces_source",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.client_id.clone(),
            fmt_text(self.survey_name.as_ref()),
            fmt_date(self.assessment_date),
            fmt_number(self.assessment_score),
            fmt_text(self.is_coordinated_entry.as_ref()),
            fmt_text(self.assessing_agency.as_ref()),
            self.source_tag.to_string(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Anomalies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    UnparseableDate,
    UnparseableNumber,
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnparseableDate => write!(f, "unparseable_date"),
            Self::UnparseableNumber => write!(f, "unparseable_number"),
        }
    }
}

/// A non-empty value that could not be parsed and was treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseAnomaly {
    pub dataset: Dataset,
    pub column: String,
    pub row: usize,
    pub value: String,
    pub kind: AnomalyKind,
}

impl IntoRow for ParseAnomaly {
    const HEADERS: &'static [&'static str] = &["dataset", "column", "row", "value", "kind"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.dataset.to_string(),
            self.column.clone(),
            self.row.to_string(),
            self.value.clone(),
            self.kind.to_string(),
        ]
    }
}
