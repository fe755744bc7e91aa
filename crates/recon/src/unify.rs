use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::model::AssessmentRecord;

/// Absent sorts below every number.
fn cmp_score(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

/// Newest first: date, assessment id, last updated, score. Absent is oldest.
fn newest_first(a: &AssessmentRecord, b: &AssessmentRecord) -> Ordering {
    b.assessment_date
        .cmp(&a.assessment_date)
        .then_with(|| cmp_score(b.assessment_id, a.assessment_id))
        .then_with(|| b.last_updated.cmp(&a.last_updated))
        .then_with(|| cmp_score(b.assessment_score, a.assessment_score))
}

/// Reduce one assessment source to its latest row per client, ignoring rows
/// with no date or dated after the reference date. Sorted by client.
pub fn latest_per_client(records: &[AssessmentRecord], reference_date: NaiveDate) -> Vec<AssessmentRecord> {
    let mut eligible: Vec<&AssessmentRecord> = records
        .iter()
        .filter(|r| !r.client_id.is_empty())
        .filter(|r| r.assessment_date.is_some_and(|d| d <= reference_date))
        .collect();
    eligible.sort_by(|a, b| newest_first(a, b));

    let mut latest: BTreeMap<&str, &AssessmentRecord> = BTreeMap::new();
    for r in eligible {
        latest.entry(r.client_id.as_str()).or_insert(r);
    }
    latest.into_values().cloned().collect()
}

/// One row per client present in either source. A client the primary source
/// knows about takes the primary row whole; the secondary fills the rest.
pub fn unify_sources(primary: &[AssessmentRecord], secondary: &[AssessmentRecord]) -> Vec<AssessmentRecord> {
    if primary.is_empty() {
        return secondary.to_vec();
    }
    if secondary.is_empty() {
        return primary.to_vec();
    }

    let covered: BTreeSet<&str> = primary.iter().map(|r| r.client_id.as_str()).collect();
    let mut unified: Vec<AssessmentRecord> = primary.to_vec();
    unified.extend(
        secondary
            .iter()
            .filter(|r| !covered.contains(r.client_id.as_str()))
            .cloned(),
    );
    unified.sort_by(|a, b| a.client_id.cmp(&b.client_id));

    log::debug!(
        "assessments: {} primary + {} secondary-only = {} unified",
        primary.len(),
        unified.len() - primary.len(),
        unified.len()
    );
    unified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceTag;

    fn assessment(client: &str, date: Option<&str>, score: Option<f64>, tag: SourceTag) -> AssessmentRecord {
        AssessmentRecord {
            client_id: client.into(),
            survey_name: Some("CES Full Assessment".into()),
            assessment_date: date.map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()),
            assessment_score: score,
            assessment_id: None,
            last_updated: None,
            is_coordinated_entry: None,
            assessing_agency: None,
            source_tag: tag,
            source_row: 0,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn latest_ignores_future_and_undated_rows() {
        let rows = vec![
            assessment("1", Some("2024-01-01"), Some(5.0), SourceTag::Secondary),
            assessment("1", Some("2024-08-01"), Some(9.0), SourceTag::Secondary),
            assessment("1", None, Some(12.0), SourceTag::Secondary),
            assessment("2", Some("2025-01-01"), Some(3.0), SourceTag::Secondary),
        ];
        let latest = latest_per_client(&rows, date("2024-06-30"));
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].assessment_score, Some(5.0));
    }

    #[test]
    fn same_day_ties_break_on_id_then_score() {
        let mut a = assessment("1", Some("2024-01-01"), Some(20.0), SourceTag::Secondary);
        a.assessment_id = Some(100.0);
        let mut b = assessment("1", Some("2024-01-01"), Some(4.0), SourceTag::Secondary);
        b.assessment_id = Some(200.0);
        let latest = latest_per_client(&[a.clone(), b], date("2024-06-30"));
        assert_eq!(latest[0].assessment_id, Some(200.0));

        let c = assessment("1", Some("2024-01-01"), None, SourceTag::Primary);
        let d = assessment("1", Some("2024-01-01"), Some(2.0), SourceTag::Primary);
        let latest = latest_per_client(&[c, d], date("2024-06-30"));
        assert_eq!(latest[0].assessment_score, Some(2.0));
    }

    #[test]
    fn primary_overrides_secondary_whole_row() {
        let primary = vec![assessment("7", Some("2023-01-01"), Some(10.0), SourceTag::Primary)];
        let secondary = vec![
            assessment("7", Some("2024-01-01"), Some(99.0), SourceTag::Secondary),
            assessment("3", Some("2024-01-01"), Some(1.0), SourceTag::Secondary),
        ];
        let unified = unify_sources(&primary, &secondary);
        assert_eq!(unified.len(), 2);
        assert_eq!(unified[0].client_id, "3");
        assert_eq!(unified[1].client_id, "7");
        assert_eq!(unified[1].assessment_score, Some(10.0));
        assert_eq!(unified[1].source_tag, SourceTag::Primary);
    }

    #[test]
    fn empty_side_returns_other() {
        let secondary = vec![assessment("3", Some("2024-01-01"), Some(1.0), SourceTag::Secondary)];
        assert_eq!(unify_sources(&[], &secondary), secondary);
        assert_eq!(unify_sources(&secondary, &[]), secondary);
        assert!(unify_sources(&[], &[]).is_empty());
    }
}
