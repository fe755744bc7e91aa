use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::assemble::{FactRow, FactSchema};
use crate::dedup::{best_index, EnrollmentRank};
use crate::table::{IntoRow, Table};

/// One fact row per client: the best-ranked of the client's programs, using
/// the same ranking as enrollment deduplication. Sorted by client.
pub fn collapse_to_clients(facts: &[FactRow]) -> Vec<FactRow> {
    let mut by_client: BTreeMap<&str, Vec<&FactRow>> = BTreeMap::new();
    for fact in facts {
        by_client.entry(fact.client_id()).or_default().push(fact);
    }

    by_client
        .into_values()
        .filter_map(|rows| best_index(&rows, |r| EnrollmentRank::of(&r.enrollment)).map(|i| rows[i].clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Active multi-program extract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MultiProgramDetail {
    pub fact: FactRow,
    pub active_program_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiProgramSummary {
    pub client_id: String,
    pub active_program_count: usize,
}

impl IntoRow for MultiProgramSummary {
    const HEADERS: &'static [&'static str] = &["client_id", "active_program_count"];

    fn cells(&self) -> Vec<String> {
        vec![self.client_id.clone(), self.active_program_count.to_string()]
    }
}

#[derive(Debug, Clone, Default)]
pub struct MultiProgramReport {
    pub detail: Vec<MultiProgramDetail>,
    pub summary: Vec<MultiProgramSummary>,
}

impl MultiProgramReport {
    pub fn detail_table(&self, schema: &FactSchema) -> Table {
        let mut headers = schema.headers();
        headers.push("active_program_count".to_string());
        let rows = self
            .detail
            .iter()
            .map(|d| {
                let mut cells: Vec<String> = schema.columns.iter().map(|c| d.fact.cell(*c)).collect();
                cells.push(d.active_program_count.to_string());
                cells
            })
            .collect();
        Table { headers, rows }
    }
}

/// Clients active in more than one distinct program.
pub fn active_multi_programs(facts: &[FactRow]) -> MultiProgramReport {
    let active: Vec<&FactRow> = facts.iter().filter(|f| f.enrollment.is_active()).collect();

    let mut programs: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for fact in &active {
        programs
            .entry(fact.client_id())
            .or_default()
            .insert(fact.enrollment.program_name.as_str());
    }
    let multi: BTreeMap<&str, usize> = programs
        .into_iter()
        .map(|(client, set)| (client, set.len()))
        .filter(|(_, n)| *n > 1)
        .collect();

    let mut detail: Vec<MultiProgramDetail> = active
        .iter()
        .filter_map(|f| {
            multi.get(f.client_id()).map(|n| MultiProgramDetail {
                fact: (*f).clone(),
                active_program_count: *n,
            })
        })
        .collect();
    detail.sort_by(|a, b| {
        b.active_program_count
            .cmp(&a.active_program_count)
            .then_with(|| a.fact.client_id().cmp(b.fact.client_id()))
            .then_with(|| a.fact.enrollment.program_name.cmp(&b.fact.enrollment.program_name))
    });

    let mut summary: Vec<MultiProgramSummary> = multi
        .into_iter()
        .map(|(client, n)| MultiProgramSummary {
            client_id: client.to_string(),
            active_program_count: n,
        })
        .collect();
    summary.sort_by(|a, b| {
        b.active_program_count
            .cmp(&a.active_program_count)
            .then_with(|| a.client_id.cmp(&b.client_id))
    });

    MultiProgramReport { detail, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::assemble_facts;
    use crate::config::RuleConfig;
    use crate::model::EnrollmentRecord;
    use chrono::NaiveDate;

    fn enrollment(client: &str, program: &str, active: &str, days: Option<f64>) -> EnrollmentRecord {
        EnrollmentRecord {
            client_id: client.into(),
            program_name: program.into(),
            active_in_project: Some(active.into()),
            days_in_project: days,
            ..Default::default()
        }
    }

    fn facts(spine: &[EnrollmentRecord]) -> Vec<FactRow> {
        let reference = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assemble_facts(spine, &[], &[], &[], reference, &RuleConfig::default())
    }

    #[test]
    fn activity_outranks_tenure_across_programs() {
        let rows = facts(&[
            enrollment("1", "A", "Yes", Some(30.0)),
            enrollment("1", "B", "No", Some(400.0)),
            enrollment("2", "C", "No", Some(5.0)),
        ]);
        let clients = collapse_to_clients(&rows);
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].enrollment.program_name, "A");
        assert_eq!(clients[1].client_id(), "2");
    }

    #[test]
    fn equal_rank_keeps_first_program() {
        let rows = facts(&[enrollment("1", "B", "Yes", Some(10.0)), enrollment("1", "A", "Yes", Some(10.0))]);
        assert_eq!(collapse_to_clients(&rows)[0].enrollment.program_name, "B");
    }

    #[test]
    fn multi_program_extract() {
        let rows = facts(&[
            enrollment("1", "A", "Yes", None),
            enrollment("1", "B", "Yes", None),
            enrollment("1", "C", "No", None),
            enrollment("2", "A", "Yes", None),
            enrollment("3", "A", "YES", None),
            enrollment("3", "B", "yes", None),
            enrollment("3", "C", "Yes", None),
        ]);
        let report = active_multi_programs(&rows);

        assert_eq!(
            report.summary,
            vec![
                MultiProgramSummary { client_id: "3".into(), active_program_count: 3 },
                MultiProgramSummary { client_id: "1".into(), active_program_count: 2 },
            ]
        );
        let keys: Vec<(&str, &str)> = report
            .detail
            .iter()
            .map(|d| (d.fact.client_id(), d.fact.enrollment.program_name.as_str()))
            .collect();
        assert_eq!(keys, vec![("3", "A"), ("3", "B"), ("3", "C"), ("1", "A"), ("1", "B")]);

        let table = report.detail_table(&FactSchema::full());
        assert_eq!(table.headers.last().map(String::as_str), Some("active_program_count"));
        assert_eq!(table.rows[0].last().map(String::as_str), Some("3"));
    }

    #[test]
    fn no_active_clients_yields_empty_report() {
        let report = active_multi_programs(&facts(&[enrollment("1", "A", "No", None)]));
        assert!(report.detail.is_empty());
        assert!(report.summary.is_empty());
    }
}
