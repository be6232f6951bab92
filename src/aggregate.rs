use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{ALL_PROVINCES, CanonicalRecord, Metric};

pub const DEFAULT_CARVED_OUT_COUNTRY: &str = "China";

type GroupKey = (String, String, NaiveDate, Metric);

#[derive(Default)]
struct Accumulator {
    total: i64,
    lats: Vec<f64>,
    longs: Vec<f64>,
}

impl Accumulator {
    fn push(&mut self, record: &CanonicalRecord) {
        self.total = self.total.saturating_add(record.cum_value);
        self.lats.push(record.lat);
        self.longs.push(record.long);
    }
}

/// Collapses GLOBAL-schema rows into one `"<all>"` row per (country, date).
///
/// Rows of `carved_out` are additionally kept per province. Its blank-province
/// (mainland) row is kept under the country's own name.
pub fn aggregate_to_country(
    records: Vec<CanonicalRecord>,
    carved_out: &str,
) -> Vec<CanonicalRecord> {
    let mut preserved = Vec::new();
    let mut groups = BTreeMap::<GroupKey, Accumulator>::new();

    for record in records {
        groups
            .entry((
                record.country.clone(),
                ALL_PROVINCES.to_string(),
                record.date,
                record.metric,
            ))
            .or_default()
            .push(&record);
        if record.country == carved_out {
            let mut record = record;
            if record.province == ALL_PROVINCES {
                record.province = record.country.clone();
            }
            preserved.push(record);
        }
    }

    let mut output = collapse(groups);
    output.extend(preserved);
    output
}

pub fn aggregate_to_province(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let mut groups = BTreeMap::<GroupKey, Accumulator>::new();
    for record in &records {
        groups
            .entry((
                record.country.clone(),
                record.province.clone(),
                record.date,
                record.metric,
            ))
            .or_default()
            .push(record);
    }
    collapse(groups)
}

fn collapse(groups: BTreeMap<GroupKey, Accumulator>) -> Vec<CanonicalRecord> {
    groups
        .into_iter()
        .map(|((country, province, date, metric), mut acc)| CanonicalRecord {
            country,
            province,
            date,
            metric,
            cum_value: acc.total,
            lat: median(&mut acc.lats),
            long: median(&mut acc.longs),
        })
        .collect()
}

pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
