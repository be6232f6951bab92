use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::aggregate::median;
use crate::domain::{
    ALL_PROVINCES, DerivedRow, Metric, MetricPair, Selection, Snapshot, UnifiedRow,
};

pub fn list_countries(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .rows
        .iter()
        .map(|row| row.country.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn list_provinces(snapshot: &Snapshot, country: &str) -> Vec<String> {
    let provinces = snapshot
        .rows_for(country)
        .map(|row| row.province.as_str())
        .filter(|province| *province != ALL_PROVINCES)
        .collect::<BTreeSet<_>>();
    std::iter::once(ALL_PROVINCES)
        .chain(provinces)
        .map(str::to_string)
        .collect()
}

/// An unknown country or province yields an empty result.
pub fn query(snapshot: &Snapshot, selection: &Selection, metrics: &[Metric]) -> Vec<DerivedRow> {
    let series = if selection.is_all() {
        country_series(snapshot, &selection.country)
    } else {
        let mut rows = snapshot
            .rows_for(&selection.country)
            .filter(|row| row.province == selection.province)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by_key(|row| row.date);
        rows
    };

    let mut derived = series
        .iter()
        .map(|row| DerivedRow {
            country: row.country.clone(),
            province: selection.province.clone(),
            date: row.date,
            confirmed: None,
            deaths: None,
            recovered: None,
        })
        .collect::<Vec<_>>();

    let requested = metrics.iter().copied().collect::<BTreeSet<_>>();
    for metric in requested {
        let mut previous: Option<i64> = None;
        for (row, out) in series.iter().zip(derived.iter_mut()) {
            let Some(cum) = row.cum(metric) else {
                continue;
            };
            let new = previous.map_or(0, |prev| cum.saturating_sub(prev));
            out.set(metric, MetricPair { cum, new });
            previous = Some(cum);
        }
    }
    derived
}

#[derive(Default)]
struct DaySum {
    confirmed: i64,
    deaths: i64,
    recovered: Option<i64>,
    recovered_complete: bool,
    lats: Vec<f64>,
    longs: Vec<f64>,
}

// Precomputed "<all>" rows are the series only when a country has no province rows.
fn country_series(snapshot: &Snapshot, country: &str) -> Vec<UnifiedRow> {
    let rows = snapshot.rows_for(country).collect::<Vec<_>>();
    let provinces = rows
        .iter()
        .copied()
        .filter(|row| row.province != ALL_PROVINCES)
        .collect::<Vec<_>>();
    let source = if provinces.is_empty() {
        rows
    } else {
        provinces
    };

    let mut days = BTreeMap::<NaiveDate, DaySum>::new();
    for row in source {
        let day = days.entry(row.date).or_insert_with(|| DaySum {
            recovered_complete: true,
            ..DaySum::default()
        });
        day.confirmed = day.confirmed.saturating_add(row.cum_confirmed);
        day.deaths = day.deaths.saturating_add(row.cum_deaths);
        match row.cum_recovered {
            Some(value) => {
                day.recovered = Some(day.recovered.unwrap_or(0).saturating_add(value))
            }
            None => day.recovered_complete = false,
        }
        day.lats.push(row.lat);
        day.longs.push(row.long);
    }

    days.into_iter()
        .map(|(date, mut day)| UnifiedRow {
            country: country.to_string(),
            province: ALL_PROVINCES.to_string(),
            date,
            lat: median(&mut day.lats),
            long: median(&mut day.longs),
            cum_confirmed: day.confirmed,
            cum_deaths: day.deaths,
            cum_recovered: day.recovered.filter(|_| day.recovered_complete),
        })
        .collect()
}
