use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;

use crate::domain::{CanonicalRecord, Metric, UnifiedRow};
use crate::error::HistoryError;

type Key = (String, String, NaiveDate);

/// Inner-joins per-metric tables on (country, province, date).
pub fn merge(tables: &[Vec<CanonicalRecord>]) -> Result<Vec<UnifiedRow>, HistoryError> {
    merge_step("metric join", tables)
}

pub(crate) fn merge_step(
    step: &str,
    tables: &[Vec<CanonicalRecord>],
) -> Result<Vec<UnifiedRow>, HistoryError> {
    if tables.is_empty() || tables.iter().any(Vec::is_empty) {
        return Err(HistoryError::EmptyMergeResult {
            step: step.to_string(),
        });
    }

    let mut by_metric = BTreeMap::<Metric, HashMap<Key, &CanonicalRecord>>::new();
    for record in tables.iter().flatten() {
        let slot = by_metric.entry(record.metric).or_default();
        let key = (record.country.clone(), record.province.clone(), record.date);
        if slot.insert(key, record).is_some() {
            tracing::warn!(
                country = %record.country,
                province = %record.province,
                date = %record.date,
                metric = %record.metric,
                "duplicate key in metric table; keeping the last value"
            );
        }
    }

    let confirmed = by_metric
        .get(&Metric::Confirmed)
        .ok_or(HistoryError::MissingMetric(Metric::Confirmed))?;
    let deaths = by_metric
        .get(&Metric::Deaths)
        .ok_or(HistoryError::MissingMetric(Metric::Deaths))?;
    let recovered = by_metric.get(&Metric::Recovered);

    let mut keys = confirmed.keys().collect::<Vec<_>>();
    keys.sort();

    let mut rows = Vec::with_capacity(keys.len());
    for key in keys {
        let Some(death) = deaths.get(key) else {
            continue;
        };
        let cum_recovered = match recovered {
            Some(table) => match table.get(key) {
                Some(record) => Some(record.cum_value),
                None => continue,
            },
            None => None,
        };
        let base = confirmed[key];
        rows.push(UnifiedRow {
            country: key.0.clone(),
            province: key.1.clone(),
            date: key.2,
            lat: base.lat,
            long: base.long,
            cum_confirmed: base.cum_value,
            cum_deaths: death.cum_value,
            cum_recovered,
        });
    }

    if rows.is_empty() {
        return Err(HistoryError::EmptyMergeResult {
            step: step.to_string(),
        });
    }
    tracing::debug!(step, rows = rows.len(), "merged metric tables");
    Ok(rows)
}

pub fn union(families: Vec<Vec<UnifiedRow>>) -> Result<Vec<UnifiedRow>, HistoryError> {
    let mut seen = HashSet::<Key>::new();
    let mut rows = Vec::with_capacity(families.iter().map(Vec::len).sum());
    for row in families.into_iter().flatten() {
        let key = (row.country.clone(), row.province.clone(), row.date);
        if !seen.insert(key) {
            tracing::warn!(
                country = %row.country,
                province = %row.province,
                date = %row.date,
                "row present in more than one schema family; keeping the first"
            );
            continue;
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(HistoryError::EmptyMergeResult {
            step: "schema union".to_string(),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::ALL_PROVINCES;

    fn record(country: &str, day: u32, metric: Metric, value: i64) -> CanonicalRecord {
        CanonicalRecord {
            country: country.to_string(),
            province: ALL_PROVINCES.to_string(),
            date: NaiveDate::from_ymd_opt(2020, 4, day).unwrap(),
            metric,
            cum_value: value,
            lat: 1.0,
            long: 2.0,
        }
    }

    #[test]
    fn join_keeps_only_shared_keys() {
        let confirmed = vec![
            record("Italy", 1, Metric::Confirmed, 10),
            record("Italy", 2, Metric::Confirmed, 12),
        ];
        let deaths = vec![record("Italy", 2, Metric::Deaths, 1)];

        let rows = merge(&[confirmed, deaths]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cum_confirmed, 12);
        assert_eq!(rows[0].cum_deaths, 1);
        assert_eq!(rows[0].cum_recovered, None);
    }

    #[test]
    fn recovered_joins_when_supplied() {
        let rows = merge(&[
            vec![record("Spain", 1, Metric::Confirmed, 5)],
            vec![record("Spain", 1, Metric::Deaths, 0)],
            vec![record("Spain", 1, Metric::Recovered, 2)],
        ])
        .unwrap();
        assert_eq!(rows[0].cum_recovered, Some(2));
    }

    #[test]
    fn disjoint_keys_are_an_error() {
        let err = merge(&[
            vec![record("Italy", 1, Metric::Confirmed, 5)],
            vec![record("Italia", 1, Metric::Deaths, 0)],
        ])
        .unwrap_err();
        assert_matches!(err, HistoryError::EmptyMergeResult { .. });
    }

    #[test]
    fn missing_deaths_table_is_reported() {
        let err = merge(&[vec![record("Italy", 1, Metric::Confirmed, 5)]]).unwrap_err();
        assert_matches!(err, HistoryError::MissingMetric(Metric::Deaths));
    }

    #[test]
    fn union_drops_colliding_keys() {
        let global = merge(&[
            vec![record("US", 1, Metric::Confirmed, 5)],
            vec![record("US", 1, Metric::Deaths, 0)],
        ])
        .unwrap();
        let duplicate = global.clone();
        let rows = union(vec![global, duplicate]).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn empty_union_is_an_error() {
        assert_matches!(
            union(vec![Vec::new(), Vec::new()]),
            Err(HistoryError::EmptyMergeResult { .. })
        );
    }
}
