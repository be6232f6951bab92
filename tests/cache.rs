mod common;

use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, SystemTime};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use covid_history::cache::SnapshotCache;
use covid_history::domain::{Metric, Selection, Snapshot};
use covid_history::error::HistoryError;
use covid_history::pipeline::{PipelineOptions, build_snapshot};
use covid_history::store::{FileStorage, MemoryStorage, SnapshotStorage};

use common::FixtureFeed;

/// Feed requests made by one successful refresh (two metrics, two schemas).
const FETCHES_PER_REFRESH: usize = 4;

fn file_storage(dir: &tempfile::TempDir) -> FileStorage {
    FileStorage::new(Utf8PathBuf::from_path_buf(dir.path().join("snapshot.json.gz")).unwrap())
}

struct RecordingStorage {
    inner: MemoryStorage,
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl SnapshotStorage for RecordingStorage {
    fn load(&self) -> Result<Option<Snapshot>, HistoryError> {
        self.inner.load()
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), HistoryError> {
        self.events.lock().unwrap().push("persist");
        self.inner.persist(snapshot)
    }

    fn last_modified(&self) -> Option<SystemTime> {
        self.inner.last_modified()
    }
}

#[test]
fn cold_load_refreshes_once() {
    let cache = SnapshotCache::new(
        FixtureFeed::new(),
        MemoryStorage::new(),
        PipelineOptions::default(),
    );

    let first = cache.load().unwrap();
    let second = cache.load().unwrap();
    assert_eq!(first, second);
    assert!(cache.storage().load().unwrap().is_some());
    assert!(cache.age().is_some());

    let countries = cache.list_countries().unwrap();
    assert!(countries.contains(&"Italy".to_string()));
    assert_eq!(
        cache.list_provinces("China").unwrap(),
        vec!["<all>", "Beijing", "Hubei"]
    );
    let rows = cache
        .query(&Selection::country("Italy"), &[Metric::Confirmed])
        .unwrap();
    assert_eq!(rows.len(), 3);
}

#[test]
fn concurrent_cold_loads_fetch_once() {
    let feed = FixtureFeed::new();
    let cache = SnapshotCache::new(feed, MemoryStorage::new(), PipelineOptions::default());

    thread::scope(|scope| {
        let a = scope.spawn(|| cache.load().unwrap());
        let b = scope.spawn(|| cache.load().unwrap());
        assert_eq!(a.join().unwrap(), b.join().unwrap());
    });

    assert_eq!(cache.feed().calls(), FETCHES_PER_REFRESH);
}

#[test]
fn snapshot_round_trips_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let storage = file_storage(&dir);
    let snapshot = build_snapshot(&FixtureFeed::new(), &PipelineOptions::default()).unwrap();

    storage.persist(&snapshot).unwrap();
    let loaded = storage.load().unwrap().unwrap();
    assert_eq!(loaded, snapshot);
    assert!(storage.last_modified().is_some());
}

#[test]
fn persisted_snapshot_is_reused_by_a_new_process() {
    let dir = tempfile::tempdir().unwrap();
    let writer = SnapshotCache::new(
        FixtureFeed::new(),
        file_storage(&dir),
        PipelineOptions::default(),
    );
    let written = writer.refresh().unwrap();

    let feed = FixtureFeed::new();
    feed.set_failing(true);
    let reader = SnapshotCache::new(feed, file_storage(&dir), PipelineOptions::default());
    let loaded = reader.load().unwrap();
    assert_eq!(*loaded, *written);
    assert!(reader.age().is_some());
}

#[test]
fn failed_refresh_keeps_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(
        FixtureFeed::new(),
        file_storage(&dir),
        PipelineOptions::default(),
    );
    let before = cache.refresh().unwrap();

    let failing = FixtureFeed::new();
    failing.set_failing(true);
    let cache = SnapshotCache::new(failing, file_storage(&dir), PipelineOptions::default());
    let err = cache.refresh().unwrap_err();
    assert_matches!(err, HistoryError::RefreshFailed { .. });

    assert_eq!(*cache.load().unwrap(), *before);
    assert_eq!(file_storage(&dir).load().unwrap().unwrap(), *before);
}

#[test]
fn load_during_failing_refresh_sees_previous_snapshot() {
    let gate = Arc::new(Barrier::new(2));
    let cache = SnapshotCache::new(
        FixtureFeed::gated(Arc::clone(&gate)),
        MemoryStorage::new(),
        PipelineOptions::default(),
    );
    let before = cache.refresh().unwrap();
    cache.feed().set_failing(true);

    thread::scope(|scope| {
        let refresh = scope.spawn(|| cache.refresh());

        gate.wait();
        let during = cache.load().unwrap();
        assert_eq!(*during, *before);
        gate.wait();

        assert_matches!(
            refresh.join().unwrap(),
            Err(HistoryError::RefreshFailed { .. })
        );
    });

    assert_eq!(*cache.load().unwrap(), *before);
    assert_eq!(cache.feed().calls(), FETCHES_PER_REFRESH + 1);
}

#[test]
fn concurrent_refreshes_do_not_interleave() {
    let gate = Arc::new(Barrier::new(2));
    let events = Arc::new(Mutex::new(Vec::new()));
    let cache = SnapshotCache::new(
        FixtureFeed::holding_first(Arc::clone(&gate)).with_events(Arc::clone(&events)),
        RecordingStorage {
            inner: MemoryStorage::new(),
            events: Arc::clone(&events),
        },
        PipelineOptions::default(),
    );

    thread::scope(|scope| {
        let first = scope.spawn(|| cache.refresh());
        gate.wait();

        let second = scope.spawn(|| cache.refresh());
        thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.feed().calls(), 1);
        gate.wait();

        first.join().unwrap().unwrap();
        second.join().unwrap().unwrap();
    });

    let mut one_refresh = vec!["fetch"; FETCHES_PER_REFRESH];
    one_refresh.push("persist");
    assert_eq!(*events.lock().unwrap(), one_refresh.repeat(2));
    assert_eq!(cache.feed().calls(), 2 * FETCHES_PER_REFRESH);
}
