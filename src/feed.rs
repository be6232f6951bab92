use std::fmt;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::{Metric, SchemaVariant};
use crate::error::HistoryError;

pub const DEFAULT_BASE_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedResource {
    pub metric: Metric,
    pub variant: SchemaVariant,
}

impl FeedResource {
    pub fn new(metric: Metric, variant: SchemaVariant) -> Self {
        Self { metric, variant }
    }

    pub fn file_name(&self) -> String {
        format!(
            "time_series_covid19_{}_{}.csv",
            self.metric.file_stem(),
            self.variant
        )
    }
}

impl fmt::Display for FeedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

pub trait FeedClient: Send + Sync {
    fn fetch_table(&self, resource: &FeedResource) -> Result<Vec<u8>, HistoryError>;
}

#[derive(Clone)]
pub struct FeedHttpClient {
    client: Client,
    base_url: String,
}

impl FeedHttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HistoryError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("covid-history/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HistoryError::FeedHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| HistoryError::FeedHttp(err.to_string()))?;

        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        Ok(Self { client, base_url })
    }

    pub fn url_for(&self, resource: &FeedResource) -> String {
        format!("{}{}", self.base_url, resource.file_name())
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, HistoryError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            let retry = match &response {
                Ok(resp) => is_retryable_status(resp.status().as_u16()),
                Err(err) => is_retryable_error(err),
            };
            if retry && attempt < MAX_RETRIES {
                attempt += 1;
                tracing::warn!(attempt, "feed request failed; retrying");
                thread::sleep(Duration::from_millis(BASE_DELAY_MS * attempt as u64));
                continue;
            }
            return response.map_err(|err| HistoryError::FeedHttp(err.to_string()));
        }
    }
}

impl FeedClient for FeedHttpClient {
    fn fetch_table(&self, resource: &FeedResource) -> Result<Vec<u8>, HistoryError> {
        let url = self.url_for(resource);
        tracing::debug!(%url, "fetching feed table");
        let response = self.send_with_retries(|| self.client.get(&url))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "feed request failed".to_string());
            return Err(HistoryError::FeedStatus { status, message });
        }
        let bytes = response
            .bytes()
            .map_err(|err| HistoryError::FeedHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
