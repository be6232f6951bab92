use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::aggregate::DEFAULT_CARVED_OUT_COUNTRY;
use crate::error::HistoryError;
use crate::feed::DEFAULT_BASE_URL;
use crate::pipeline::PipelineOptions;
use crate::store::FileStorage;

pub const DEFAULT_CONFIG_FILE: &str = "covid-history.json";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub snapshot_path: Option<Utf8PathBuf>,
    #[serde(default)]
    pub include_recovered: Option<bool>,
    #[serde(default)]
    pub carved_out_country: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub snapshot_path: Utf8PathBuf,
    pub timeout: Duration,
    pub pipeline: PipelineOptions,
}

pub struct ConfigLoader;

impl ConfigLoader {
    // Without an explicit path a missing covid-history.json means defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, HistoryError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HistoryError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HistoryError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HistoryError> {
        let snapshot_path = match config.snapshot_path {
            Some(path) => path,
            None => FileStorage::default_path()?,
        };

        Ok(ResolvedConfig {
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            snapshot_path,
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            pipeline: PipelineOptions {
                include_recovered: config.include_recovered.unwrap_or(false),
                carved_out_country: config
                    .carved_out_country
                    .unwrap_or_else(|| DEFAULT_CARVED_OUT_COUNTRY.to_string()),
            },
        })
    }
}
