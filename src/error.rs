use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::{Metric, SchemaVariant};

#[derive(Debug, Error, Diagnostic)]
pub enum HistoryError {
    #[error("{variant} feed is missing expected columns: {}", .missing.join(", "))]
    #[diagnostic(help("the upstream file layout changed; check the feed headers"))]
    SchemaMismatch {
        variant: SchemaVariant,
        missing: Vec<String>,
    },

    #[error("merge produced no rows at step: {step}")]
    #[diagnostic(help("country/province naming likely diverged between metric feeds"))]
    EmptyMergeResult { step: String },

    #[error("refresh failed while loading {resource}: {reason}")]
    RefreshFailed { resource: String, reason: String },

    #[error("no {0} table supplied to merge")]
    MissingMetric(Metric),

    #[error("feed request failed: {0}")]
    FeedHttp(String),

    #[error("feed returned status {status}: {message}")]
    FeedStatus { status: u16, message: String },

    #[error("failed to parse feed table: {0}")]
    FeedParse(String),

    #[error("persisted snapshot is unreadable: {0}")]
    SnapshotCorrupt(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("snapshot cache lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid metric: {0}")]
    InvalidMetric(String),
}
