use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::RuleConfig;
use crate::flags::{flag_cell, DocumentFlags};
use crate::model::{AsOfSnapshot, AssessmentRecord, EnrollmentRecord, EntityKey};
use crate::normalize::EnrollmentField;
use crate::table::{fmt_date, fmt_number, fmt_text, Table};

// ---------------------------------------------------------------------------
// Status fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssessmentStatus {
    NotDone,
    Expired,
    Current,
}

impl AssessmentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotDone => "Assessment Not Done",
            Self::Expired => "Over 2 Years, Review for life change",
            Self::Current => "Current",
        }
    }

    /// Expired or never done.
    pub fn needs_assessment(&self) -> bool {
        !matches!(self, Self::Current)
    }
}

impl fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn assessment_status(date: Option<NaiveDate>, reference_date: NaiveDate, expiry_days: i64) -> AssessmentStatus {
    match date {
        None => AssessmentStatus::NotDone,
        Some(d) if (reference_date - d).num_days() > expiry_days => AssessmentStatus::Expired,
        Some(_) => AssessmentStatus::Current,
    }
}

/// Score a survey must reach for housing matching; `None` when the survey
/// has no threshold.
pub fn matching_threshold(survey_name: Option<&str>, rules: &RuleConfig) -> Option<f64> {
    let name = survey_name.map(str::trim).filter(|s| !s.is_empty())?;
    if name.to_uppercase().contains("CES") {
        Some(rules.ces_threshold)
    } else if name == rules.lahat_survey_name {
        Some(rules.lahat_threshold)
    } else {
        None
    }
}

/// A defined threshold the score does not reach. A missing score is below.
pub fn below_threshold(score: Option<f64>, threshold: Option<f64>) -> bool {
    match (score, threshold) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(s), Some(t)) => s < t,
    }
}

pub fn housing_matching_ready(document_ready: bool, score: Option<f64>, threshold: Option<f64>) -> bool {
    match (score, threshold) {
        (Some(s), Some(t)) => document_ready && s >= t,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InterventionAlert {
    EscalateMissingDocs,
    EscalateAssessment,
    EscalateScore,
    Monitor,
    ActionMissingDocs,
    ActionAssessmentRisk,
    NoActionNeeded,
}

impl InterventionAlert {
    pub fn label(&self) -> &'static str {
        match self {
            Self::EscalateMissingDocs => "≥120 days & missing docs – ESCALATE",
            Self::EscalateAssessment => {
                "≥120 days in interim housing & CES assessment >2 years old — ESCALATE for review"
            }
            Self::EscalateScore => "≥120 days & score below threshold – ESCALATE",
            Self::Monitor => "≥120 days & docs/assessment OK – monitor",
            Self::ActionMissingDocs => "75–119 days & missing docs – ACTION",
            Self::ActionAssessmentRisk => "75–119 days & assessment risk – ACTION",
            Self::NoActionNeeded => "No Action Needed",
        }
    }
}

impl fmt::Display for InterventionAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// First matching rule wins. Absent tenure never reaches a stay window.
pub fn intervention_alert(
    days: Option<f64>,
    document_ready: bool,
    status: AssessmentStatus,
    below: bool,
    rules: &RuleConfig,
) -> InterventionAlert {
    use InterventionAlert::*;
    let Some(d) = days else { return NoActionNeeded };

    if d >= rules.long_stay_days {
        if !document_ready {
            EscalateMissingDocs
        } else if status.needs_assessment() {
            EscalateAssessment
        } else if below {
            EscalateScore
        } else {
            Monitor
        }
    } else if d >= rules.mid_stay_days {
        if !document_ready {
            ActionMissingDocs
        } else if status.needs_assessment() || below {
            ActionAssessmentRisk
        } else {
            NoActionNeeded
        }
    } else {
        NoActionNeeded
    }
}

/// `"{n} case note(s)"`, capped at `"{cap} or more case notes"`.
pub fn case_count_category(count: Option<i64>, cap: i64) -> String {
    let n = count.unwrap_or(0);
    if n >= cap {
        format!("{cap} or more case notes")
    } else if n == 1 {
        "1 case note".to_string()
    } else {
        format!("{n} case notes")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TenureTier {
    Under60,
    Days60To120,
    Days120To365,
    Over365,
}

impl TenureTier {
    pub fn of(days: Option<f64>) -> Option<Self> {
        let d = days?;
        Some(if d < 60.0 {
            Self::Under60
        } else if d <= 120.0 {
            Self::Days60To120
        } else if d <= 365.0 {
            Self::Days120To365
        } else {
            Self::Over365
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Under60 => "Tier 1 - <60 Days",
            Self::Days60To120 => "Tier 2 - 60-120 Days",
            Self::Days120To365 => "Tier 3 - 120-365 Days",
            Self::Over365 => "Tier 4 - >365 Days",
        }
    }
}

/// Text after the first `" - "`, trimmed; the whole name when there is none.
pub fn program_short_name(program_name: &str) -> String {
    let name = program_name.trim();
    match name.split_once(" - ") {
        Some((_, rest)) => rest.trim().to_string(),
        None => name.to_string(),
    }
}

// ---------------------------------------------------------------------------
// FactRow
// ---------------------------------------------------------------------------

/// One assembled (client, program) row with its derived status fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub enrollment: EnrollmentRecord,
    pub case_notes: Option<AsOfSnapshot>,
    pub services: Option<AsOfSnapshot>,
    pub assessment: Option<AssessmentRecord>,
    pub flags: DocumentFlags,
    pub assessment_status: AssessmentStatus,
    pub matching_threshold: Option<f64>,
    pub document_ready: bool,
    pub housing_matching_ready: bool,
    pub alert: InterventionAlert,
    pub case_count_category: String,
    pub tenure_tier: Option<TenureTier>,
    pub program_short_name: String,
}

impl FactRow {
    pub fn key(&self) -> EntityKey {
        self.enrollment.key()
    }

    pub fn client_id(&self) -> &str {
        &self.enrollment.client_id
    }

    pub fn assessment_score(&self) -> Option<f64> {
        self.assessment.as_ref().and_then(|a| a.assessment_score)
    }

    pub fn cell(&self, column: FactColumn) -> String {
        use FactColumn as C;
        let e = &self.enrollment;
        let a = self.assessment.as_ref();
        match column {
            C::ClientId => e.client_id.clone(),
            C::ProgramName => e.program_name.clone(),
            C::ProgramShortName => self.program_short_name.clone(),
            C::ActiveInProject => fmt_text(e.active_in_project.as_ref()),
            C::ClientFullName => fmt_text(e.client_full_name.as_ref()),
            C::RoiActive => fmt_text(e.roi_active.as_ref()),
            C::DaysInProject => fmt_number(e.days_in_project),
            C::ProjectStartDate => fmt_date(e.project_start_date),
            C::ContactName => fmt_text(e.contact_name.as_ref()),
            C::ContactPhone => fmt_text(e.contact_phone.as_ref()),
            C::ContactEmail => fmt_text(e.contact_email.as_ref()),
            C::ContactDate => fmt_date(e.contact_date),
            C::DobDataQuality => fmt_text(e.dob_data_quality.as_ref()),
            C::SsnDataQuality => fmt_text(e.ssn_data_quality.as_ref()),
            C::SsnLast4 => fmt_text(e.ssn_last4.as_ref()),
            C::Deleted => fmt_text(e.deleted.as_ref()),
            C::TbClearanceDate => fmt_text(e.tb_clearance_date.as_ref()),
            C::LastAssessmentId => fmt_text(e.last_assessment_id.as_ref()),
            C::LastAssessmentDate => fmt_date(e.last_assessment_date),
            C::FileList => fmt_text(e.file_list.as_ref()),
            C::AssignedStaff => fmt_text(e.assigned_staff.as_ref()),
            C::CaseNotesMonth => self.case_notes.as_ref().map(|s| s.month.clone()).unwrap_or_default(),
            C::CaseNotesCount => self.case_notes.as_ref().map(|s| s.count.to_string()).unwrap_or_default(),
            C::ServicesMonth => self.services.as_ref().map(|s| s.month.clone()).unwrap_or_default(),
            C::ServicesCount => self.services.as_ref().map(|s| s.count.to_string()).unwrap_or_default(),
            C::SurveyName => fmt_text(a.and_then(|a| a.survey_name.as_ref())),
            C::AssessmentDate => fmt_date(a.and_then(|a| a.assessment_date)),
            C::AssessmentScore => fmt_number(self.assessment_score()),
            C::CesSource => a.map(|a| a.source_tag.to_string()).unwrap_or_default(),
            C::CesStatus | C::AssessmentStatus => self.assessment_status.to_string(),
            C::SsnCard => flag_cell(self.flags.ssn_card),
            C::CdlOrStateId => flag_cell(self.flags.cdl_or_state_id),
            C::HomelessnessVerification => flag_cell(self.flags.homelessness_verification),
            C::DisabilityVerification => flag_cell(self.flags.disability_verification),
            C::HealthInsurance => self.flags.health_insurance.to_string(),
            C::ProofOfIncome => self.flags.proof_of_income.to_string(),
            C::DocumentReady => yes_no(self.document_ready, "Document Ready", "Not Document Ready"),
            C::HousingMatchingReady => {
                yes_no(self.housing_matching_ready, "Housing Matching Ready", "Not Housing Matching Ready")
            }
            C::InterventionAlert => self.alert.to_string(),
            C::CaseCountCategory => self.case_count_category.clone(),
            C::TenureTier => self.tenure_tier.map(|t| t.label().to_string()).unwrap_or_default(),
            C::MissingDocuments => self.flags.missing_documents(),
        }
    }
}

fn yes_no(flag: bool, yes: &str, no: &str) -> String {
    let label = if flag { yes } else { no };
    label.to_string()
}

// ---------------------------------------------------------------------------
// Output schema
// ---------------------------------------------------------------------------

/// Gold fact columns in their published order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FactColumn {
    ClientId,
    ProgramName,
    ProgramShortName,
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
    CaseNotesMonth,
    CaseNotesCount,
    ServicesMonth,
    ServicesCount,
    SurveyName,
    AssessmentDate,
    AssessmentScore,
    CesSource,
    CesStatus,
    AssessmentStatus,
    SsnCard,
    CdlOrStateId,
    HomelessnessVerification,
    DisabilityVerification,
    HealthInsurance,
    ProofOfIncome,
    DocumentReady,
    HousingMatchingReady,
    InterventionAlert,
    CaseCountCategory,
    TenureTier,
    MissingDocuments,
}

impl FactColumn {
    pub const ALL: [FactColumn; 43] = [
        Self::ClientId,
        Self::ProgramName,
        Self::ProgramShortName,
        Self::ActiveInProject,
        Self::ClientFullName,
        Self::RoiActive,
        Self::DaysInProject,
        Self::ProjectStartDate,
        Self::ContactName,
        Self::ContactPhone,
        Self::ContactEmail,
        Self::ContactDate,
        Self::DobDataQuality,
        Self::SsnDataQuality,
        Self::SsnLast4,
        Self::Deleted,
        Self::TbClearanceDate,
        Self::LastAssessmentId,
        Self::LastAssessmentDate,
        Self::FileList,
        Self::AssignedStaff,
        Self::CaseNotesMonth,
        Self::CaseNotesCount,
        Self::ServicesMonth,
        Self::ServicesCount,
        Self::SurveyName,
        Self::AssessmentDate,
        Self::AssessmentScore,
        Self::CesSource,
        Self::CesStatus,
        Self::AssessmentStatus,
        Self::SsnCard,
        Self::CdlOrStateId,
        Self::HomelessnessVerification,
        Self::DisabilityVerification,
        Self::HealthInsurance,
        Self::ProofOfIncome,
        Self::DocumentReady,
        Self::HousingMatchingReady,
        Self::InterventionAlert,
        Self::CaseCountCategory,
        Self::TenureTier,
        Self::MissingDocuments,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Self::ClientId => "client_id",
            Self::ProgramName => "program_name",
            Self::ProgramShortName => "Programs Name",
            Self::ActiveInProject => "Enrollments Active in Project",
            Self::ClientFullName => "Clients Client Full Name",
            Self::RoiActive => "Clients Active ROI?",
            Self::DaysInProject => "Enrollments Days in Project",
            Self::ProjectStartDate => "Enrollments Project Start Date",
            Self::ContactName => "Client Custom Point of Contact Name",
            Self::ContactPhone => "Client Custom Point of Contact Phone",
            Self::ContactEmail => "Client Custom Point of Contact Email",
            Self::ContactDate => "Client Custom Point of Contact Date",
            Self::DobDataQuality => "Clients DoB Data Quality",
            Self::SsnDataQuality => "Clients SSN Data Quality",
            Self::SsnLast4 => "Clients SSN - Last 4",
            Self::Deleted => "Enrollments Deleted (Yes / No)",
            Self::TbClearanceDate => "Client Assessment Custom TB Clearance Date",
            Self::LastAssessmentId => "Client Assessments Last Assessment ID",
            Self::LastAssessmentDate => "Client Assessments Last Assessment Date",
            Self::FileList => "List of Client File Name",
            Self::AssignedStaff => "List of Assigned Staff",
            Self::CaseNotesMonth => "case_notes_month",
            Self::CaseNotesCount => "case_notes_count",
            Self::ServicesMonth => "services_month",
            Self::ServicesCount => "services_count",
            Self::SurveyName => "Survey Name",
            Self::AssessmentDate => "Latest CES Assessment Date",
            Self::AssessmentScore => "Assessment Score",
            Self::CesSource => "CES Source",
            Self::CesStatus => "CES Status",
            Self::AssessmentStatus => "Assessment Status",
            Self::SsnCard => "SSN Card",
            Self::CdlOrStateId => "CDL or State ID",
            Self::HomelessnessVerification => "Homelessness Verification",
            Self::DisabilityVerification => "Disability Verification",
            Self::HealthInsurance => "Health Insurance Column Flag",
            Self::ProofOfIncome => "Proof of Income",
            Self::DocumentReady => "Document Ready",
            Self::HousingMatchingReady => "Housing Matching Ready",
            Self::InterventionAlert => "Intervention Alert",
            Self::CaseCountCategory => "Case Count Category",
            Self::TenureTier => "Enrollment Days Tier",
            Self::MissingDocuments => "Missing Documents",
        }
    }

    /// The optional spine column this one passes through, if any.
    fn spine_field(&self) -> Option<EnrollmentField> {
        use EnrollmentField as F;
        Some(match self {
            Self::ActiveInProject => F::ActiveInProject,
            Self::ClientFullName => F::ClientFullName,
            Self::RoiActive => F::RoiActive,
            Self::DaysInProject => F::DaysInProject,
            Self::ProjectStartDate => F::ProjectStartDate,
            Self::ContactName => F::ContactName,
            Self::ContactPhone => F::ContactPhone,
            Self::ContactEmail => F::ContactEmail,
            Self::ContactDate => F::ContactDate,
            Self::DobDataQuality => F::DobDataQuality,
            Self::SsnDataQuality => F::SsnDataQuality,
            Self::SsnLast4 => F::SsnLast4,
            Self::Deleted => F::Deleted,
            Self::TbClearanceDate => F::TbClearanceDate,
            Self::LastAssessmentId => F::LastAssessmentId,
            Self::LastAssessmentDate => F::LastAssessmentDate,
            Self::AssignedStaff => F::AssignedStaff,
            _ => return None,
        })
    }
}

/// The published fact columns: the fixed order, minus spine columns the
/// source did not carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactSchema {
    pub columns: Vec<FactColumn>,
}

impl FactSchema {
    pub fn full() -> Self {
        Self { columns: FactColumn::ALL.to_vec() }
    }

    pub fn project(present: &BTreeSet<EnrollmentField>) -> Self {
        let columns = FactColumn::ALL
            .iter()
            .copied()
            .filter(|c| c.spine_field().map_or(true, |f| present.contains(&f)))
            .collect();
        Self { columns }
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header().to_string()).collect()
    }

    pub fn render(&self, rows: &[FactRow]) -> Table {
        Table {
            headers: self.headers(),
            rows: rows
                .iter()
                .map(|r| self.columns.iter().map(|c| r.cell(*c)).collect())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Assemble
// ---------------------------------------------------------------------------

/// Left-join the spine with the as-of snapshots (by key) and the unified
/// assessment (by client), then derive the status fields. One row per
/// spine row, in spine order.
pub fn assemble_facts(
    spine: &[EnrollmentRecord],
    case_notes: &[AsOfSnapshot],
    services: &[AsOfSnapshot],
    assessments: &[AssessmentRecord],
    reference_date: NaiveDate,
    rules: &RuleConfig,
) -> Vec<FactRow> {
    let case_by_key: BTreeMap<EntityKey, &AsOfSnapshot> = case_notes.iter().map(|s| (s.key(), s)).collect();
    let service_by_key: BTreeMap<EntityKey, &AsOfSnapshot> = services.iter().map(|s| (s.key(), s)).collect();
    let assessment_by_client: BTreeMap<&str, &AssessmentRecord> =
        assessments.iter().map(|a| (a.client_id.as_str(), a)).collect();

    spine
        .iter()
        .map(|enrollment| {
            let key = enrollment.key();
            let case_notes = case_by_key.get(&key).map(|s| (*s).clone());
            let services = service_by_key.get(&key).map(|s| (*s).clone());
            let assessment = assessment_by_client.get(enrollment.client_id.as_str()).map(|a| (*a).clone());

            let flags = DocumentFlags::derive(enrollment.file_list.as_deref());
            let document_ready = flags.document_ready();
            let survey = assessment.as_ref().and_then(|a| a.survey_name.as_deref());
            let score = assessment.as_ref().and_then(|a| a.assessment_score);
            let status = assessment_status(
                assessment.as_ref().and_then(|a| a.assessment_date),
                reference_date,
                rules.assessment_expiry_days,
            );
            let threshold = matching_threshold(survey, rules);
            let alert = intervention_alert(
                enrollment.days_in_project,
                document_ready,
                status,
                below_threshold(score, threshold),
                rules,
            );

            FactRow {
                case_count_category: case_count_category(case_notes.as_ref().map(|s| s.count), rules.case_note_cap),
                tenure_tier: TenureTier::of(enrollment.days_in_project),
                program_short_name: program_short_name(&enrollment.program_name),
                housing_matching_ready: housing_matching_ready(document_ready, score, threshold),
                enrollment: enrollment.clone(),
                case_notes,
                services,
                assessment,
                flags,
                assessment_status: status,
                matching_threshold: threshold,
                document_ready,
                alert,
            }
        })
        .collect()
}
