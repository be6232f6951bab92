use crate::aggregate::{DEFAULT_CARVED_OUT_COUNTRY, aggregate_to_country, aggregate_to_province};
use crate::domain::{CanonicalRecord, SchemaVariant, Snapshot, UnifiedRow};
use crate::error::HistoryError;
use crate::feed::{FeedClient, FeedResource};
use crate::merge::{merge_step, union};
use crate::normalize::normalize;
use crate::table::RawTable;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub include_recovered: bool,
    pub carved_out_country: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            include_recovered: false,
            carved_out_country: DEFAULT_CARVED_OUT_COUNTRY.to_string(),
        }
    }
}

pub fn build_snapshot<F: FeedClient + ?Sized>(
    feed: &F,
    options: &PipelineOptions,
) -> Result<Snapshot, HistoryError> {
    let mut families = Vec::with_capacity(SchemaVariant::ALL.len());
    for variant in SchemaVariant::ALL {
        families.push(build_family(feed, variant, options)?);
    }
    let rows = union(families)?;
    Ok(Snapshot::new(rows))
}

fn build_family<F: FeedClient + ?Sized>(
    feed: &F,
    variant: SchemaVariant,
    options: &PipelineOptions,
) -> Result<Vec<UnifiedRow>, HistoryError> {
    let mut tables = Vec::new();
    for metric in variant.metrics(options.include_recovered) {
        let resource = FeedResource::new(metric, variant);
        let records = load_resource(feed, &resource)?;
        let records = match variant {
            SchemaVariant::Global => aggregate_to_country(records, &options.carved_out_country),
            SchemaVariant::Us => aggregate_to_province(records),
        };
        tables.push(records);
    }
    merge_step(&format!("{variant} metric join"), &tables)
}

fn load_resource<F: FeedClient + ?Sized>(
    feed: &F,
    resource: &FeedResource,
) -> Result<Vec<CanonicalRecord>, HistoryError> {
    let bytes = feed
        .fetch_table(resource)
        .map_err(|err| refresh_failed(resource, err))?;
    let table = RawTable::from_csv(&bytes).map_err(|err| refresh_failed(resource, err))?;
    tracing::debug!(%resource, rows = table.rows.len(), "fetched feed table");
    normalize(&table, resource.metric, resource.variant)
}

fn refresh_failed(resource: &FeedResource, err: HistoryError) -> HistoryError {
    HistoryError::RefreshFailed {
        resource: resource.file_name(),
        reason: err.to_string(),
    }
}
