use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::HistoryError;

/// Province sentinel meaning "the whole country".
pub const ALL_PROVINCES: &str = "<all>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaVariant {
    Global,
    Us,
}

#[derive(Debug, Clone, Copy)]
pub struct IdentityColumns {
    pub country: &'static str,
    pub province: &'static str,
    pub lat: &'static str,
    pub long: &'static str,
}

impl SchemaVariant {
    pub const ALL: [SchemaVariant; 2] = [SchemaVariant::Global, SchemaVariant::Us];

    pub fn identity_columns(self) -> IdentityColumns {
        match self {
            SchemaVariant::Global => IdentityColumns {
                country: "Country/Region",
                province: "Province/State",
                lat: "Lat",
                long: "Long",
            },
            SchemaVariant::Us => IdentityColumns {
                country: "Country_Region",
                province: "Province_State",
                lat: "Lat",
                long: "Long_",
            },
        }
    }

    pub fn metrics(self, include_recovered: bool) -> Vec<Metric> {
        match self {
            SchemaVariant::Global if include_recovered => {
                vec![Metric::Confirmed, Metric::Deaths, Metric::Recovered]
            }
            SchemaVariant::Global | SchemaVariant::Us => vec![Metric::Confirmed, Metric::Deaths],
        }
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaVariant::Global => write!(f, "global"),
            SchemaVariant::Us => write!(f, "US"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Confirmed,
    Deaths,
    Recovered,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Confirmed, Metric::Deaths, Metric::Recovered];

    pub fn file_stem(self) -> &'static str {
        match self {
            Metric::Confirmed => "confirmed",
            Metric::Deaths => "deaths",
            Metric::Recovered => "recovered",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Confirmed => "Confirmed",
            Metric::Deaths => "Deaths",
            Metric::Recovered => "Recovered",
        }
    }

    pub fn cum_column(self) -> String {
        format!("Cum{}", self.label())
    }

    pub fn new_column(self) -> String {
        format!("New{}", self.label())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

impl FromStr for Metric {
    type Err = HistoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let normalized = normalized
            .strip_prefix("cum")
            .or_else(|| normalized.strip_prefix("new"))
            .unwrap_or(&normalized);
        Metric::ALL
            .into_iter()
            .find(|metric| metric.file_stem() == normalized)
            .ok_or_else(|| HistoryError::InvalidMetric(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub country: String,
    pub province: String,
    pub date: NaiveDate,
    pub metric: Metric,
    pub cum_value: i64,
    pub lat: f64,
    pub long: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRow {
    pub country: String,
    pub province: String,
    pub date: NaiveDate,
    pub lat: f64,
    pub long: f64,
    pub cum_confirmed: i64,
    pub cum_deaths: i64,
    #[serde(default)]
    pub cum_recovered: Option<i64>,
}

impl UnifiedRow {
    pub fn cum(&self, metric: Metric) -> Option<i64> {
        match metric {
            Metric::Confirmed => Some(self.cum_confirmed),
            Metric::Deaths => Some(self.cum_deaths),
            Metric::Recovered => self.cum_recovered,
        }
    }

    pub fn key(&self) -> (&str, &str, NaiveDate) {
        (&self.country, &self.province, self.date)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub rows: Vec<UnifiedRow>,
}

impl Snapshot {
    pub fn new(rows: Vec<UnifiedRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows_for<'a>(&'a self, country: &'a str) -> impl Iterator<Item = &'a UnifiedRow> + 'a {
        self.rows.iter().filter(move |row| row.country == country)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub country: String,
    pub province: String,
}

impl Selection {
    pub fn country(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            province: ALL_PROVINCES.to_string(),
        }
    }

    pub fn province(country: impl Into<String>, province: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            province: province.into(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.province == ALL_PROVINCES
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            write!(f, "{}", self.country)
        } else {
            write!(f, "{} / {}", self.country, self.province)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPair {
    pub cum: i64,
    pub new: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedRow {
    pub country: String,
    pub province: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<MetricPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deaths: Option<MetricPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered: Option<MetricPair>,
}

impl DerivedRow {
    pub fn get(&self, metric: Metric) -> Option<MetricPair> {
        match metric {
            Metric::Confirmed => self.confirmed,
            Metric::Deaths => self.deaths,
            Metric::Recovered => self.recovered,
        }
    }

    pub(crate) fn set(&mut self, metric: Metric, pair: MetricPair) {
        match metric {
            Metric::Confirmed => self.confirmed = Some(pair),
            Metric::Deaths => self.deaths = Some(pair),
            Metric::Recovered => self.recovered = Some(pair),
        }
    }

    pub fn date_label(&self) -> String {
        self.date.format("%b %d, %Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_metric_accepts_column_labels() {
        assert_eq!("Confirmed".parse::<Metric>().unwrap(), Metric::Confirmed);
        assert_eq!("CumDeaths".parse::<Metric>().unwrap(), Metric::Deaths);
        assert_eq!("newrecovered".parse::<Metric>().unwrap(), Metric::Recovered);
    }

    #[test]
    fn parse_metric_invalid() {
        let err = "hospitalized".parse::<Metric>().unwrap_err();
        assert_matches!(err, HistoryError::InvalidMetric(_));
    }

    #[test]
    fn us_variant_never_publishes_recovered() {
        assert!(!SchemaVariant::Us.metrics(true).contains(&Metric::Recovered));
        assert!(SchemaVariant::Global.metrics(true).contains(&Metric::Recovered));
        assert!(!SchemaVariant::Global.metrics(false).contains(&Metric::Recovered));
    }

    #[test]
    fn column_labels() {
        assert_eq!(Metric::Confirmed.cum_column(), "CumConfirmed");
        assert_eq!(Metric::Deaths.new_column(), "NewDeaths");
    }
}
