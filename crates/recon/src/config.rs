use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Run configuration. Every field has a default, so an empty TOML document
/// is a valid config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub name: String,
    /// Programs removed from the enrollment spine before deduplication.
    pub excluded_programs: Vec<String>,
    pub columns: ColumnConfig,
    pub rules: RuleConfig,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: "caseflow".into(),
            excluded_programs: vec![
                "Weingart Center Association - Downtown Access Center".into(),
                "Weingart Center Association - Problem-Solving Families".into(),
                "Weingart Center Association - Problem-Solving Individuals".into(),
            ],
            columns: ColumnConfig::default(),
            rules: RuleConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Column mappings (source header per field)
// ---------------------------------------------------------------------------

/// Monthly and assessment sections replace the whole dataset mapping when
/// present, so they must name every required column.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub enrollment: EnrollmentColumns,
    pub case_notes: MonthlyColumns,
    pub services: MonthlyColumns,
    pub assessment_primary: AssessmentColumns,
    pub assessment_secondary: AssessmentColumns,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            enrollment: EnrollmentColumns::default(),
            case_notes: MonthlyColumns::case_notes(),
            services: MonthlyColumns::services(),
            assessment_primary: AssessmentColumns::external(),
            assessment_secondary: AssessmentColumns::hmis(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrollmentColumns {
    pub client_id: String,
    pub program_name: String,
    pub active_in_project: String,
    pub deleted: String,
    pub days_in_project: String,
    pub project_start_date: String,
    pub client_full_name: String,
    pub roi_active: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub contact_date: String,
    pub dob_data_quality: String,
    pub ssn_data_quality: String,
    pub ssn_last4: String,
    pub tb_clearance_date: String,
    pub last_assessment_id: String,
    pub last_assessment_date: String,
    pub file_list: String,
    pub assigned_staff: String,
}

impl Default for EnrollmentColumns {
    fn default() -> Self {
        Self {
            client_id: "Clients Unique Identifier".into(),
            program_name: "Programs Full Name".into(),
            active_in_project: "Enrollments Active in Project".into(),
            deleted: "Enrollments Deleted (Yes / No)".into(),
            days_in_project: "Enrollments Days in Project".into(),
            project_start_date: "Enrollments Project Start Date".into(),
            client_full_name: "Clients Client Full Name".into(),
            roi_active: "Clients Active ROI?".into(),
            contact_name: "Client Custom Point of Contact Name".into(),
            contact_phone: "Client Custom Point of Contact Phone".into(),
            contact_email: "Client Custom Point of Contact Email".into(),
            contact_date: "Client Custom Point of Contact Date".into(),
            dob_data_quality: "Clients DoB Data Quality".into(),
            ssn_data_quality: "Clients SSN Data Quality".into(),
            ssn_last4: "Clients SSN - Last 4".into(),
            tb_clearance_date: "Client Assessment Custom TB Clearance Date".into(),
            last_assessment_id: "Client Assessments Last Assessment ID".into(),
            last_assessment_date: "Client Assessments Last Assessment Date".into(),
            file_list: "List of Client File Name".into(),
            assigned_staff: "List of Assigned Staff".into(),
        }
    }
}

/// Event-level monthly count extract (case notes, services).
#[derive(Debug, Clone, Deserialize)]
pub struct MonthlyColumns {
    pub client_id: String,
    pub program_name: String,
    pub month: String,
    pub count: String,
    #[serde(default)]
    pub staff: Option<String>,
}

impl MonthlyColumns {
    pub fn case_notes() -> Self {
        Self {
            client_id: "Clients Unique Identifier".into(),
            program_name: "Programs Full Name".into(),
            month: "Client Notes - Enrollment Level Case Note Month".into(),
            count: "Client Notes - Enrollment Level Count".into(),
            staff: Some("List of Staff Full Name".into()),
        }
    }

    pub fn services() -> Self {
        Self {
            client_id: "Clients Unique Identifier".into(),
            program_name: "Programs Full Name".into(),
            month: "Services Start Date Month".into(),
            count: "Services Count".into(),
            staff: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssessmentColumns {
    pub client_id: String,
    pub survey_name: String,
    pub assessment_date: String,
    pub assessment_score: String,
    #[serde(default)]
    pub assessment_id: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub is_coordinated_entry: Option<String>,
    #[serde(default)]
    pub assessing_agency: Option<String>,
}

impl AssessmentColumns {
    /// Program-level external assessment export.
    pub fn external() -> Self {
        Self {
            client_id: "Clients Unique Identifier".into(),
            survey_name: "Survey Name".into(),
            assessment_date: "Latest CES Assessment Date".into(),
            assessment_score: "Assessment Score".into(),
            assessment_id: None,
            last_updated: Some("Last Updated".into()),
            is_coordinated_entry: None,
            assessing_agency: None,
        }
    }

    /// Assessment export from the case-management system itself.
    pub fn hmis() -> Self {
        Self {
            client_id: "Clients Unique Identifier".into(),
            survey_name: "Client Assessments Name".into(),
            assessment_date: "Client Assessments Assessment Date".into(),
            assessment_score: "Client Assessments Assessment Score".into(),
            assessment_id: Some("Client Assessments Assessment ID".into()),
            last_updated: None,
            is_coordinated_entry: Some("Client Assessments Is Coordinated Entry".into()),
            assessing_agency: Some("Client Assessments Assessing Agency Name".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Business rule constants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Assessments older than this many days need review.
    pub assessment_expiry_days: i64,
    pub long_stay_days: f64,
    pub mid_stay_days: f64,
    /// Threshold for any survey whose name contains "CES".
    pub ces_threshold: f64,
    /// Exact survey name that uses `lahat_threshold`.
    pub lahat_survey_name: String,
    pub lahat_threshold: f64,
    /// Case-note counts at or above this collapse into one category.
    pub case_note_cap: i64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            assessment_expiry_days: 730,
            long_stay_days: 120.0,
            mid_stay_days: 75.0,
            ces_threshold: 8.0,
            lahat_survey_name: "Los Angeles Housing Assessment Tool (LA HAT)".into(),
            lahat_threshold: 17.0,
            case_note_cap: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let r = &self.rules;
        if r.assessment_expiry_days <= 0 {
            return Err(ReconError::ConfigValidation(format!(
                "assessment_expiry_days must be positive, got {}",
                r.assessment_expiry_days
            )));
        }
        if r.mid_stay_days >= r.long_stay_days {
            return Err(ReconError::ConfigValidation(format!(
                "mid_stay_days ({}) must be below long_stay_days ({})",
                r.mid_stay_days, r.long_stay_days
            )));
        }
        if r.case_note_cap < 1 {
            return Err(ReconError::ConfigValidation("case_note_cap must be at least 1".into()));
        }

        let c = &self.columns;
        let required = [
            ("columns.enrollment.client_id", &c.enrollment.client_id),
            ("columns.enrollment.program_name", &c.enrollment.program_name),
            ("columns.case_notes.month", &c.case_notes.month),
            ("columns.case_notes.count", &c.case_notes.count),
            ("columns.services.month", &c.services.month),
            ("columns.services.count", &c.services.count),
            ("columns.assessment_primary.client_id", &c.assessment_primary.client_id),
            ("columns.assessment_secondary.client_id", &c.assessment_secondary.client_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!("{field} must not be empty")));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
