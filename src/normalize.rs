use chrono::NaiveDate;

use crate::domain::{ALL_PROVINCES, CanonicalRecord, Metric, SchemaVariant};
use crate::error::HistoryError;
use crate::table::RawTable;

const DATE_FORMATS: &[&str] = &["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];

/// Non-date columns other than the identity columns are dropped. Unparsable cells become 0.
pub fn normalize(
    table: &RawTable,
    metric: Metric,
    variant: SchemaVariant,
) -> Result<Vec<CanonicalRecord>, HistoryError> {
    let ids = variant.identity_columns();
    let lookup = |name: &str| table.column_index(name).ok_or_else(|| name.to_string());
    let (country_idx, province_idx, lat_idx, long_idx) = match (
        lookup(ids.country),
        lookup(ids.province),
        lookup(ids.lat),
        lookup(ids.long),
    ) {
        (Ok(country), Ok(province), Ok(lat), Ok(long)) => (country, province, lat, long),
        (country, province, lat, long) => {
            let missing = [country, province, lat, long]
                .into_iter()
                .filter_map(Result::err)
                .collect();
            return Err(HistoryError::SchemaMismatch { variant, missing });
        }
    };

    let date_columns = table
        .headers
        .iter()
        .enumerate()
        .filter_map(|(idx, header)| parse_date(header).map(|date| (idx, date)))
        .collect::<Vec<_>>();
    if date_columns.is_empty() {
        return Err(HistoryError::SchemaMismatch {
            variant,
            missing: vec!["<date columns>".to_string()],
        });
    }

    let mut records = Vec::with_capacity(table.rows.len() * date_columns.len());
    for row in &table.rows {
        let country = row[country_idx].clone();
        let province = match row[province_idx].as_str() {
            "" => ALL_PROVINCES.to_string(),
            name => name.to_string(),
        };
        let lat = parse_coordinate(&row[lat_idx]);
        let long = parse_coordinate(&row[long_idx]);

        for &(idx, date) in &date_columns {
            records.push(CanonicalRecord {
                country: country.clone(),
                province: province.clone(),
                date,
                metric,
                cum_value: parse_count(&row[idx]),
                lat,
                long,
            });
        }
    }

    tracing::debug!(
        %variant,
        %metric,
        rows = table.rows.len(),
        dates = date_columns.len(),
        "normalized feed table"
    );
    Ok(records)
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value.trim(), format).ok())
}

fn parse_count(value: &str) -> i64 {
    let value = value.trim();
    value
        .parse::<i64>()
        .ok()
        .or_else(|| {
            value
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .map(|number| number.round() as i64)
        })
        .unwrap_or(0)
}

fn parse_coordinate(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .unwrap_or(0.0)
}
