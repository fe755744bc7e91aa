// Property tests for the reconciliation pipeline.
// Run with: PROPTEST_CASES=1000 cargo test -p caseflow-recon --test properties

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use proptest::prelude::*;

use caseflow_recon::dedup::{deduplicate, EnrollmentRank};
use caseflow_recon::model::{EnrollmentRecord, MonthlyCount};
use caseflow_recon::monthly::{latest_as_of, month_token};
use caseflow_recon::{reconcile, Dataset, ReconConfig, ReconInput, Table};

fn config_128() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(128),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (2023i32..=2025, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn arb_flag() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), Just(Some("Yes".to_string())), Just(Some("No".to_string()))]
}

fn arb_enrollment() -> impl Strategy<Value = EnrollmentRecord> {
    (
        0u8..4,
        0u8..3,
        arb_flag(),
        arb_flag(),
        prop::option::of(0u32..500),
        prop::option::of(arb_date()),
    )
        .prop_map(|(client, program, active, deleted, days, start)| EnrollmentRecord {
            client_id: format!("C{client}"),
            program_name: format!("Program {program}"),
            active_in_project: active,
            deleted,
            days_in_project: days.map(f64::from),
            project_start_date: start,
            ..Default::default()
        })
}

fn arb_enrollments() -> impl Strategy<Value = Vec<EnrollmentRecord>> {
    prop::collection::vec(arb_enrollment(), 0..30).prop_map(|mut rows| {
        for (i, r) in rows.iter_mut().enumerate() {
            r.source_row = i;
        }
        rows
    })
}

fn arb_counts() -> impl Strategy<Value = Vec<MonthlyCount>> {
    prop::collection::btree_map((0u8..4, 0u8..2, arb_date()), 0i64..10, 0..40).prop_map(|buckets| {
        let mut out: BTreeMap<(String, String, String), i64> = BTreeMap::new();
        for ((client, program, date), count) in buckets {
            *out.entry((format!("C{client}"), format!("P{program}"), month_token(date))).or_default() += count;
        }
        out.into_iter()
            .map(|((client_id, program_name, month), count)| MonthlyCount {
                client_id,
                program_name,
                month,
                count,
                staff_list: None,
            })
            .collect()
    })
}

fn spine_table(rows: &[EnrollmentRecord]) -> Table {
    let cell = |v: &Option<String>| v.clone().unwrap_or_default();
    Table {
        headers: [
            "Clients Unique Identifier",
            "Programs Full Name",
            "Enrollments Active in Project",
            "Enrollments Deleted (Yes / No)",
            "Enrollments Days in Project",
            "Enrollments Project Start Date",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect(),
        rows: rows
            .iter()
            .map(|r| {
                vec![
                    r.client_id.clone(),
                    r.program_name.clone(),
                    cell(&r.active_in_project),
                    cell(&r.deleted),
                    r.days_in_project.map(|d| d.to_string()).unwrap_or_default(),
                    r.project_start_date.map(|d| d.to_string()).unwrap_or_default(),
                ]
            })
            .collect(),
    }
}

fn empty_monthly(month_header: &str, count_header: &str) -> Table {
    Table::new(
        ["Clients Unique Identifier", "Programs Full Name", month_header, count_header]
            .iter()
            .map(|h| h.to_string())
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Dedup
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_128())]
    #[test]
    fn dedup_keeps_one_best_row_per_key(rows in arb_enrollments()) {
        let result = deduplicate(&rows);

        let keys: BTreeSet<_> = rows.iter().map(|r| r.key()).collect();
        let kept: Vec<_> = result.current.iter().map(|r| r.key()).collect();
        prop_assert_eq!(kept.len(), keys.len());
        prop_assert_eq!(kept.iter().cloned().collect::<BTreeSet<_>>(), keys);

        for winner in &result.current {
            let best = EnrollmentRank::of(winner);
            for r in rows.iter().filter(|r| r.key() == winner.key()) {
                prop_assert!(EnrollmentRank::of(r) <= best);
            }
        }
    }

    #[test]
    fn dedup_reports_every_duplicated_row(rows in arb_enrollments()) {
        let result = deduplicate(&rows);

        let mut groups: BTreeMap<_, usize> = BTreeMap::new();
        for r in &rows {
            *groups.entry(r.key()).or_default() += 1;
        }
        let duplicated: usize = groups.values().filter(|&&n| n > 1).sum();
        prop_assert_eq!(result.summary.len(), groups.values().filter(|&&n| n > 1).count());
        prop_assert_eq!(result.detail.len(), duplicated);
        prop_assert_eq!(result.summary.iter().map(|s| s.duplicate_row_count).sum::<usize>(), duplicated);
    }
}

// ---------------------------------------------------------------------------
// As-of snapshots
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_128())]
    #[test]
    fn as_of_never_looks_past_reference_month(counts in arb_counts(), date in arb_date()) {
        let reference = month_token(date);
        for snap in latest_as_of(&counts, date) {
            prop_assert!(snap.month <= reference);
            let latest_eligible = counts
                .iter()
                .filter(|c| c.key() == snap.key() && c.month <= reference)
                .map(|c| c.month.clone())
                .max();
            prop_assert_eq!(Some(snap.month.clone()), latest_eligible);
        }
    }

    #[test]
    fn as_of_is_monotonic_in_reference_date(counts in arb_counts(), a in arb_date(), b in arb_date()) {
        let (early, late) = if a <= b { (a, b) } else { (b, a) };
        let before: BTreeMap<_, _> = latest_as_of(&counts, early).into_iter().map(|s| (s.key(), s.month)).collect();
        let after: BTreeMap<_, _> = latest_as_of(&counts, late).into_iter().map(|s| (s.key(), s.month)).collect();

        for (key, month) in &before {
            let later = after.get(key);
            prop_assert!(later.is_some());
            prop_assert!(later.map_or(false, |m| m >= month));
        }
    }
}

// ---------------------------------------------------------------------------
// Whole pipeline
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_128())]
    #[test]
    fn reconcile_is_deterministic_and_keyed(rows in arb_enrollments(), date in arb_date()) {
        let input = ReconInput::new()
            .with(Dataset::EnrollmentSpine, spine_table(&rows))
            .with(
                Dataset::CaseNoteEvents,
                empty_monthly("Client Notes - Enrollment Level Case Note Month", "Client Notes - Enrollment Level Count"),
            )
            .with(Dataset::ServiceEvents, empty_monthly("Services Start Date Month", "Services Count"));
        let config = ReconConfig::default();

        let first = reconcile(date, &input, &config).unwrap();
        let second = reconcile(date, &input, &config).unwrap();
        prop_assert_eq!(first.fact_table(), second.fact_table());
        prop_assert_eq!(first.client_table(), second.client_table());

        let keys: BTreeSet<_> = rows.iter().map(|r| r.key()).collect();
        let clients: BTreeSet<_> = rows.iter().map(|r| r.client_id.clone()).collect();
        prop_assert_eq!(first.facts.len(), keys.len());
        prop_assert_eq!(first.clients.len(), clients.len());
        prop_assert!(first.audit.client_duplicates.is_empty());
    }
}
