use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime};

use crate::domain::{DerivedRow, Metric, Selection, Snapshot};
use crate::error::HistoryError;
use crate::feed::FeedClient;
use crate::pipeline::{PipelineOptions, build_snapshot};
use crate::query;
use crate::store::SnapshotStorage;

struct Committed {
    snapshot: Arc<Snapshot>,
    refreshed_at: Option<Instant>,
}

pub struct SnapshotCache<F: FeedClient, S: SnapshotStorage> {
    feed: F,
    storage: S,
    options: PipelineOptions,
    refresh_lock: Mutex<()>,
    current: RwLock<Option<Committed>>,
}

impl<F: FeedClient, S: SnapshotStorage> SnapshotCache<F, S> {
    pub fn new(feed: F, storage: S, options: PipelineOptions) -> Self {
        Self {
            feed,
            storage,
            options,
            refresh_lock: Mutex::new(()),
            current: RwLock::new(None),
        }
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn refresh(&self) -> Result<Arc<Snapshot>, HistoryError> {
        let _guard = self
            .refresh_lock
            .lock()
            .map_err(|err| HistoryError::LockPoisoned(err.to_string()))?;
        self.refresh_locked()
    }

    fn refresh_locked(&self) -> Result<Arc<Snapshot>, HistoryError> {
        let started = Instant::now();
        tracing::info!("refreshing snapshot");
        let snapshot = match build_snapshot(&self.feed, &self.options) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(error = %err, "refresh aborted; keeping previous snapshot");
                return Err(err);
            }
        };
        self.storage.persist(&snapshot)?;

        let snapshot = Arc::new(snapshot);
        self.commit(Arc::clone(&snapshot), Some(Instant::now()))?;
        tracing::info!(
            rows = snapshot.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot refreshed"
        );
        Ok(snapshot)
    }

    /// Last committed snapshot; refreshes only when nothing was ever persisted.
    pub fn load(&self) -> Result<Arc<Snapshot>, HistoryError> {
        if let Some(snapshot) = self.current_snapshot()? {
            return Ok(snapshot);
        }
        if let Some(snapshot) = self.storage.load()? {
            tracing::debug!(rows = snapshot.len(), "loaded persisted snapshot");
            let snapshot = Arc::new(snapshot);
            self.commit_if_empty(Arc::clone(&snapshot))?;
            return self.current_snapshot().map(|current| current.unwrap_or(snapshot));
        }

        let _guard = self
            .refresh_lock
            .lock()
            .map_err(|err| HistoryError::LockPoisoned(err.to_string()))?;
        if let Some(snapshot) = self.current_snapshot()? {
            return Ok(snapshot);
        }
        self.refresh_locked()
    }

    pub fn age(&self) -> Option<Duration> {
        let in_process = self
            .current
            .read()
            .ok()
            .and_then(|current| current.as_ref().and_then(|c| c.refreshed_at));
        match in_process {
            Some(at) => Some(at.elapsed()),
            None => self
                .storage
                .last_modified()
                .and_then(|at| SystemTime::now().duration_since(at).ok()),
        }
    }

    pub fn list_countries(&self) -> Result<Vec<String>, HistoryError> {
        Ok(query::list_countries(&*self.load()?))
    }

    pub fn list_provinces(&self, country: &str) -> Result<Vec<String>, HistoryError> {
        Ok(query::list_provinces(&*self.load()?, country))
    }

    pub fn query(
        &self,
        selection: &Selection,
        metrics: &[Metric],
    ) -> Result<Vec<DerivedRow>, HistoryError> {
        Ok(query::query(&*self.load()?, selection, metrics))
    }

    fn current_snapshot(&self) -> Result<Option<Arc<Snapshot>>, HistoryError> {
        let current = self
            .current
            .read()
            .map_err(|err| HistoryError::LockPoisoned(err.to_string()))?;
        Ok(current.as_ref().map(|c| Arc::clone(&c.snapshot)))
    }

    fn commit(
        &self,
        snapshot: Arc<Snapshot>,
        refreshed_at: Option<Instant>,
    ) -> Result<(), HistoryError> {
        let mut current = self
            .current
            .write()
            .map_err(|err| HistoryError::LockPoisoned(err.to_string()))?;
        *current = Some(Committed {
            snapshot,
            refreshed_at,
        });
        Ok(())
    }

    fn commit_if_empty(&self, snapshot: Arc<Snapshot>) -> Result<(), HistoryError> {
        let mut current = self
            .current
            .write()
            .map_err(|err| HistoryError::LockPoisoned(err.to_string()))?;
        if current.is_none() {
            *current = Some(Committed {
                snapshot,
                refreshed_at: None,
            });
        }
        Ok(())
    }
}
