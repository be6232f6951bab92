#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use covid_history::error::HistoryError;
use covid_history::feed::{FeedClient, FeedResource};

pub fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Serves feed tables from `tests/fixtures`, counting every request.
#[derive(Default)]
pub struct FixtureFeed {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    /// Held twice by a failing fetch: once on entry, once before returning.
    pub gate: Option<Arc<Barrier>>,
    /// Held twice by the very first fetch, failing or not.
    pub hold_first: Option<Arc<Barrier>>,
    pub overrides: HashMap<String, String>,
    pub events: Arc<Mutex<Vec<&'static str>>>,
}

impl FixtureFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Barrier>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn holding_first(gate: Arc<Barrier>) -> Self {
        Self {
            hold_first: Some(gate),
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: Arc<Mutex<Vec<&'static str>>>) -> Self {
        self.events = events;
        self
    }

    pub fn with_override(mut self, file_name: &str, replacement: &str) -> Self {
        self.overrides
            .insert(file_name.to_string(), replacement.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl FeedClient for FixtureFeed {
    fn fetch_table(&self, resource: &FeedResource) -> Result<Vec<u8>, HistoryError> {
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push("fetch");
        if previous == 0 {
            if let Some(gate) = &self.hold_first {
                gate.wait();
                gate.wait();
            }
        }
        if self.fail.load(Ordering::SeqCst) {
            if let Some(gate) = &self.gate {
                gate.wait();
                gate.wait();
            }
            return Err(HistoryError::FeedStatus {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        let name = resource.file_name();
        let name = self.overrides.get(&name).cloned().unwrap_or(name);
        fs::read(fixture_dir().join(&name)).map_err(|err| HistoryError::FeedHttp(err.to_string()))
    }
}
