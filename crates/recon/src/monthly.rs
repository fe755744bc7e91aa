use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use regex::Regex;

use crate::error::ReconError;
use crate::model::{AsOfSnapshot, EntityKey, MonthlyCount, MonthlyDuplicate, MonthlyEvent};
use crate::table::Dataset;

/// Offending month tokens shown in an `InvalidMonthToken` error.
const MONTH_EXAMPLES: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct MonthlyAggregate {
    /// One row per (key, month), sorted by key then month.
    pub counts: Vec<MonthlyCount>,
    /// (key, month) pairs that arrived on more than one raw row.
    pub duplicates: Vec<MonthlyDuplicate>,
}

#[derive(Default)]
struct Bucket {
    count: i64,
    rows: usize,
    staff: BTreeSet<String>,
}

/// Sum event counts per (client, program, month).
pub fn aggregate_monthly(dataset: Dataset, events: &[MonthlyEvent]) -> Result<MonthlyAggregate, ReconError> {
    let month_re = Regex::new(r"^\d{4}-\d{2}$").map_err(|e| ReconError::TableParse {
        dataset,
        message: e.to_string(),
    })?;

    let mut bad: BTreeSet<&str> = BTreeSet::new();
    for e in events {
        if !month_re.is_match(&e.month) {
            bad.insert(e.month.as_str());
        }
    }
    if !bad.is_empty() {
        return Err(ReconError::InvalidMonthToken {
            dataset,
            examples: bad.into_iter().take(MONTH_EXAMPLES).map(str::to_string).collect(),
        });
    }

    let mut buckets: BTreeMap<(EntityKey, String), Bucket> = BTreeMap::new();
    for e in events {
        let bucket = buckets.entry((e.key(), e.month.clone())).or_default();
        bucket.count = match bucket.count.checked_add(e.count) {
            Some(total) => total,
            None => {
                log::warn!(
                    "{}: count for {} / {} in {} saturated at i64::MAX",
                    dataset, e.client_id, e.program_name, e.month
                );
                i64::MAX
            }
        };
        bucket.rows += 1;
        if let Some(staff) = e.staff.as_ref().filter(|s| !s.eq_ignore_ascii_case("nan")) {
            bucket.staff.insert(staff.clone());
        }
    }

    let mut out = MonthlyAggregate::default();
    for ((key, month), bucket) in buckets {
        if bucket.rows > 1 {
            out.duplicates.push(MonthlyDuplicate {
                client_id: key.client_id.clone(),
                program_name: key.program_name.clone(),
                month: month.clone(),
                raw_row_count: bucket.rows,
            });
        }
        let staff_list =
            (!bucket.staff.is_empty()).then(|| bucket.staff.into_iter().collect::<Vec<_>>().join(", "));
        out.counts.push(MonthlyCount {
            client_id: key.client_id,
            program_name: key.program_name,
            month,
            count: bucket.count,
            staff_list,
        });
    }

    if !out.duplicates.is_empty() {
        log::info!("{dataset}: {} (key, month) pairs summed from multiple rows", out.duplicates.len());
    }
    log::debug!("{dataset}: {} events -> {} monthly rows", events.len(), out.counts.len());
    Ok(out)
}

/// Zero-padded `YYYY-MM` of a date.
pub fn month_token(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Per key, the row with the greatest month not after the reference month.
pub fn latest_as_of(counts: &[MonthlyCount], reference_date: NaiveDate) -> Vec<AsOfSnapshot> {
    let reference_month = month_token(reference_date);
    let mut latest: BTreeMap<EntityKey, &MonthlyCount> = BTreeMap::new();
    for row in counts.iter().filter(|r| r.month <= reference_month) {
        latest
            .entry(row.key())
            .and_modify(|cur| {
                if row.month > cur.month {
                    *cur = row;
                }
            })
            .or_insert(row);
    }
    latest.into_values().cloned().collect()
}
