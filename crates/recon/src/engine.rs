use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::assemble::{assemble_facts, FactRow, FactSchema};
use crate::collapse::{active_multi_programs, collapse_to_clients, MultiProgramReport};
use crate::config::ReconConfig;
use crate::dedup::{deduplicate, DuplicateDetail, DuplicateSummary};
use crate::error::ReconError;
use crate::model::{AsOfSnapshot, AssessmentRecord, EnrollmentRecord, MonthlyCount, MonthlyDuplicate, ParseAnomaly, SourceTag};
use crate::monthly::{aggregate_monthly, latest_as_of};
use crate::normalize::{canon_id, normalize_assessments, normalize_enrollments, normalize_monthly_events};
use crate::quality::{quality_report, QualityReport};
use crate::table::{Dataset, Table};
use crate::unify::{latest_per_client, unify_sources};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Loaded tables, one per named dataset. Missing datasets are empty tables.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    tables: BTreeMap<Dataset, Table>,
}

impl ReconInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dataset: Dataset, table: Table) -> Self {
        self.tables.insert(dataset, table);
        self
    }

    pub fn insert(&mut self, dataset: Dataset, table: Table) {
        self.tables.insert(dataset, table);
    }

    pub fn table(&self, dataset: Dataset) -> &Table {
        static EMPTY: Table = Table {
            headers: Vec::new(),
            rows: Vec::new(),
        };
        self.tables.get(&dataset).unwrap_or(&EMPTY)
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub reference_date: NaiveDate,
    pub engine_version: String,
}

/// Cleaned intermediates, published as the silver layer.
#[derive(Debug, Clone, Default)]
pub struct SilverTables {
    /// Every enrollment row left after program exclusion.
    pub enrollments_clean: Vec<EnrollmentRecord>,
    pub enrollments_current: Vec<EnrollmentRecord>,
    pub case_notes_monthly: Vec<MonthlyCount>,
    pub case_notes_latest: Vec<AsOfSnapshot>,
    pub services_monthly: Vec<MonthlyCount>,
    pub services_latest: Vec<AsOfSnapshot>,
    pub assessments_primary_latest: Vec<AssessmentRecord>,
    pub assessments_secondary_latest: Vec<AssessmentRecord>,
    pub assessments_unified: Vec<AssessmentRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditReports {
    pub enrollment_duplicate_summary: Vec<DuplicateSummary>,
    pub enrollment_duplicate_detail: Vec<DuplicateDetail>,
    pub case_note_duplicates: Vec<MonthlyDuplicate>,
    pub service_duplicates: Vec<MonthlyDuplicate>,
    /// Client rows sharing a client id; empty unless collapse is broken.
    pub client_duplicates: Vec<FactRow>,
    pub active_multi_programs: MultiProgramReport,
    pub anomalies: Vec<ParseAnomaly>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconSummary {
    pub enrollment_rows: usize,
    pub excluded_rows: usize,
    pub duplicate_keys: usize,
    pub fact_rows: usize,
    pub client_rows: usize,
    pub assessments_primary: usize,
    pub assessments_secondary: usize,
    pub assessments_unified: usize,
    pub document_ready: usize,
    pub housing_matching_ready: usize,
    pub active_multi_program_clients: usize,
    pub parse_anomalies: usize,
    pub alert_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityBundle {
    pub silver: Vec<QualityReport>,
    pub gold: Vec<QualityReport>,
}

#[derive(Debug, Clone)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub silver: SilverTables,
    pub facts: Vec<FactRow>,
    pub clients: Vec<FactRow>,
    pub schema: FactSchema,
    pub audit: AuditReports,
    pub summary: ReconSummary,
}

impl ReconResult {
    /// Gold fact table at (client, program) grain.
    pub fn fact_table(&self) -> Table {
        self.schema.render(&self.facts)
    }

    /// Gold table at client grain, same columns as the fact table.
    pub fn client_table(&self) -> Table {
        self.schema.render(&self.clients)
    }

    pub fn client_duplicate_table(&self) -> Table {
        self.schema.render(&self.audit.client_duplicates)
    }

    /// Silver tables keyed by their published file stem.
    pub fn silver_tables(&self) -> Vec<(&'static str, Table)> {
        let s = &self.silver;
        let a = &self.audit;
        vec![
            ("program_client_data_clean", Table::from_records(&s.enrollments_clean)),
            ("program_client_data_current_client_program", Table::from_records(&s.enrollments_current)),
            ("qa_enrollment_duplicates_summary", Table::from_records(&a.enrollment_duplicate_summary)),
            ("qa_enrollment_duplicates_detail", Table::from_records(&a.enrollment_duplicate_detail)),
            ("case_notes_monthly", Table::from_records(&s.case_notes_monthly)),
            ("qa_case_notes_duplicates", Table::from_records(&a.case_note_duplicates)),
            ("case_notes_latest_asof_pull", Table::from_records(&s.case_notes_latest)),
            ("services_monthly", Table::from_records(&s.services_monthly)),
            ("qa_services_duplicates", Table::from_records(&a.service_duplicates)),
            ("services_latest_asof_pull", Table::from_records(&s.services_latest)),
            ("ces_hmis_latest_by_client", Table::from_records(&s.assessments_secondary_latest)),
            ("ces_external_latest_by_client", Table::from_records(&s.assessments_primary_latest)),
            ("ces_unified_latest_by_client", Table::from_records(&s.assessments_unified)),
            ("qa_parse_anomalies", Table::from_records(&a.anomalies)),
        ]
    }

    /// Quality reports over the keyed silver and gold tables.
    pub fn quality(&self) -> Result<QualityBundle, ReconError> {
        let s = &self.silver;
        let pair = ["client_id", "program_name"];
        let monthly = ["client_id", "program_name", "month"];
        Ok(QualityBundle {
            silver: vec![
                quality_report(
                    "program_client_data_current_client_program",
                    &Table::from_records(&s.enrollments_current),
                    &pair,
                )?,
                quality_report("case_notes_monthly", &Table::from_records(&s.case_notes_monthly), &monthly)?,
                quality_report("services_monthly", &Table::from_records(&s.services_monthly), &monthly)?,
                quality_report(
                    "ces_unified_latest_by_client",
                    &Table::from_records(&s.assessments_unified),
                    &["client_id"],
                )?,
            ],
            gold: vec![
                quality_report("client_program_readiness_current", &self.fact_table(), &pair)?,
                quality_report("client_readiness_current", &self.client_table(), &["client_id"])?,
            ],
        })
    }
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

/// Run the whole pipeline for one reference date. Pure: the same inputs,
/// date and config always produce the same result.
pub fn reconcile(reference_date: NaiveDate, input: &ReconInput, config: &ReconConfig) -> Result<ReconResult, ReconError> {
    let cols = &config.columns;

    // Schema checks first: a contract violation anywhere aborts the run.
    let enrollments = normalize_enrollments(input.table(Dataset::EnrollmentSpine), &cols.enrollment)?;
    let case_events = normalize_monthly_events(
        Dataset::CaseNoteEvents,
        input.table(Dataset::CaseNoteEvents),
        &cols.case_notes,
    )?;
    let service_events = normalize_monthly_events(
        Dataset::ServiceEvents,
        input.table(Dataset::ServiceEvents),
        &cols.services,
    )?;
    let primary = normalize_assessments(
        Dataset::AssessmentPrimary,
        input.table(Dataset::AssessmentPrimary),
        &cols.assessment_primary,
        SourceTag::Primary,
    )?;
    let secondary = normalize_assessments(
        Dataset::AssessmentSecondary,
        input.table(Dataset::AssessmentSecondary),
        &cols.assessment_secondary,
        SourceTag::Secondary,
    )?;
    let case_monthly = aggregate_monthly(Dataset::CaseNoteEvents, &case_events.records)?;
    let service_monthly = aggregate_monthly(Dataset::ServiceEvents, &service_events.records)?;

    // Enrollment spine
    let excluded: BTreeSet<String> = config.excluded_programs.iter().map(|p| canon_id(p)).collect();
    let enrollment_rows = enrollments.records.len();
    let clean: Vec<EnrollmentRecord> = enrollments
        .records
        .into_iter()
        .filter(|r| !excluded.contains(&r.program_name))
        .collect();
    let excluded_rows = enrollment_rows - clean.len();
    if excluded_rows > 0 {
        log::info!("enrollment_spine: excluded {excluded_rows} rows from {} programs", excluded.len());
    }
    let dedup = deduplicate(&clean);

    // Activity snapshots
    let case_latest = latest_as_of(&case_monthly.counts, reference_date);
    let service_latest = latest_as_of(&service_monthly.counts, reference_date);

    // Assessments
    let primary_latest = latest_per_client(&primary.records, reference_date);
    let secondary_latest = latest_per_client(&secondary.records, reference_date);
    let unified = unify_sources(&primary_latest, &secondary_latest);

    // Gold
    let facts = assemble_facts(
        &dedup.current,
        &case_latest,
        &service_latest,
        &unified,
        reference_date,
        &config.rules,
    );
    let clients = collapse_to_clients(&facts);
    let multi = active_multi_programs(&facts);
    let client_duplicates = duplicated_clients(&clients);

    let mut anomalies = enrollments.anomalies;
    anomalies.extend(case_events.anomalies);
    anomalies.extend(service_events.anomalies);
    anomalies.extend(primary.anomalies);
    anomalies.extend(secondary.anomalies);
    if !anomalies.is_empty() {
        log::warn!("{} values could not be parsed and were treated as absent", anomalies.len());
    }

    let mut alert_counts: BTreeMap<String, usize> = BTreeMap::new();
    for f in &facts {
        *alert_counts.entry(f.alert.to_string()).or_default() += 1;
    }
    let summary = ReconSummary {
        enrollment_rows,
        excluded_rows,
        duplicate_keys: dedup.summary.len(),
        fact_rows: facts.len(),
        client_rows: clients.len(),
        assessments_primary: primary_latest.len(),
        assessments_secondary: secondary_latest.len(),
        assessments_unified: unified.len(),
        document_ready: facts.iter().filter(|f| f.document_ready).count(),
        housing_matching_ready: facts.iter().filter(|f| f.housing_matching_ready).count(),
        active_multi_program_clients: multi.summary.len(),
        parse_anomalies: anomalies.len(),
        alert_counts,
    };
    log::info!(
        "reconciled {}: {} fact rows, {} clients, {} duplicate keys",
        reference_date,
        summary.fact_rows,
        summary.client_rows,
        summary.duplicate_keys
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            reference_date,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        },
        silver: SilverTables {
            enrollments_clean: clean,
            enrollments_current: dedup.current,
            case_notes_monthly: case_monthly.counts,
            case_notes_latest: case_latest,
            services_monthly: service_monthly.counts,
            services_latest: service_latest,
            assessments_primary_latest: primary_latest,
            assessments_secondary_latest: secondary_latest,
            assessments_unified: unified,
        },
        facts,
        clients,
        schema: FactSchema::project(&enrollments.present),
        audit: AuditReports {
            enrollment_duplicate_summary: dedup.summary,
            enrollment_duplicate_detail: dedup.detail,
            case_note_duplicates: case_monthly.duplicates,
            service_duplicates: service_monthly.duplicates,
            client_duplicates,
            active_multi_programs: multi,
            anomalies,
        },
        summary,
    })
}

fn duplicated_clients(clients: &[FactRow]) -> Vec<FactRow> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for c in clients {
        *counts.entry(c.client_id()).or_default() += 1;
    }
    clients
        .iter()
        .filter(|c| counts.get(c.client_id()).is_some_and(|n| *n > 1))
        .cloned()
        .collect()
}
