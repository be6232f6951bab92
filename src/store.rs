use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::sync::Mutex;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tempfile::Builder;

use crate::domain::Snapshot;
use crate::error::HistoryError;

pub const SNAPSHOT_FILE_NAME: &str = "snapshot.json.gz";

pub trait SnapshotStorage: Send + Sync {
    fn load(&self) -> Result<Option<Snapshot>, HistoryError>;
    /// Replaces the stored snapshot as a whole; readers see old or new, never a mix.
    fn persist(&self, snapshot: &Snapshot) -> Result<(), HistoryError>;
    fn last_modified(&self) -> Option<SystemTime> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    path: Utf8PathBuf,
}

impl FileStorage {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> Result<Utf8PathBuf, HistoryError> {
        BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.cache_dir().join("covid-history")).ok()
            })
            .map(|dir| dir.join(SNAPSHOT_FILE_NAME))
            .ok_or_else(|| {
                HistoryError::Filesystem("unable to resolve cache directory".to_string())
            })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl SnapshotStorage for FileStorage {
    fn load(&self) -> Result<Option<Snapshot>, HistoryError> {
        let file = match fs::File::open(self.path.as_std_path()) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(HistoryError::Filesystem(err.to_string())),
        };
        let reader = BufReader::new(GzDecoder::new(file));
        let snapshot = serde_json::from_reader(reader)
            .map_err(|err| HistoryError::SnapshotCorrupt(format!("{}: {err}", self.path)))?;
        Ok(Some(snapshot))
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), HistoryError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| HistoryError::Filesystem("invalid snapshot path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| HistoryError::Filesystem(err.to_string()))?;

        let temp = Builder::new()
            .prefix("covid-history-snapshot")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| HistoryError::Filesystem(err.to_string()))?;
        {
            let mut encoder =
                GzEncoder::new(BufWriter::new(temp.as_file()), Compression::default());
            serde_json::to_writer(&mut encoder, snapshot)
                .map_err(|err| HistoryError::Filesystem(err.to_string()))?;
            encoder
                .finish()
                .and_then(|mut writer| writer.flush())
                .map_err(|err| HistoryError::Filesystem(err.to_string()))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|err| HistoryError::Filesystem(err.to_string()))?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| HistoryError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn last_modified(&self) -> Option<SystemTime> {
        fs::metadata(self.path.as_std_path())
            .and_then(|meta| meta.modified())
            .ok()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshot: Mutex<Option<(Snapshot, SystemTime)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some((snapshot, SystemTime::now()))),
        }
    }
}

impl SnapshotStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Snapshot>, HistoryError> {
        let guard = self
            .snapshot
            .lock()
            .map_err(|err| HistoryError::Filesystem(err.to_string()))?;
        Ok(guard.as_ref().map(|(snapshot, _)| snapshot.clone()))
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), HistoryError> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|err| HistoryError::Filesystem(err.to_string()))?;
        *guard = Some((snapshot.clone(), SystemTime::now()));
        Ok(())
    }

    fn last_modified(&self) -> Option<SystemTime> {
        self.snapshot
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|(_, at)| *at))
    }
}
