//! Snapshot persistence and publication.
//!
//! The store owns two things:
//!
//! - the persisted state in the data directory: the columnar row
//!   intermediate (`sensor_data.csv`) and the snapshot document
//!   (`sensor_data.json`), each written to a temporary sibling and renamed
//!   into place so no reader of the files ever sees a partial write;
//! - the published in-memory snapshot, an `Arc` replaced as a unit.
//!
//! Readers clone the current `Arc` and never wait on a refresh cycle; the
//! write side holds the lock only for the pointer store.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;

use crate::logging::{self, Component};
use crate::model::{RawRow, Snapshot};

pub const DEFAULT_SNAPSHOT_FILE: &str = "sensor_data.json";
pub const DEFAULT_ROWS_FILE: &str = "sensor_data.csv";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write rows to {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("snapshot document {path} is invalid: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io { path: path.to_path_buf(), source }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Fixed locations of the persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub snapshot: PathBuf,
    pub rows: PathBuf,
}

impl StorePaths {
    pub fn new(data_dir: &Path, snapshot_file: &str, rows_file: &str) -> Self {
        Self {
            snapshot: data_dir.join(snapshot_file),
            rows: data_dir.join(rows_file),
        }
    }

    /// Default file names inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir, DEFAULT_SNAPSHOT_FILE, DEFAULT_ROWS_FILE)
    }
}

// ---------------------------------------------------------------------------
// Published snapshot
// ---------------------------------------------------------------------------

/// A snapshot as served, with the time it became current.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub snapshot: Snapshot,
    /// `None` until something has been published or loaded from disk.
    pub published_at: Option<DateTime<Utc>>,
}

impl Published {
    fn nothing_yet() -> Self {
        Self {
            snapshot: Snapshot::empty(),
            published_at: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.published_at.is_none()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct SnapshotStore {
    paths: StorePaths,
    current: RwLock<Arc<Published>>,
}

impl SnapshotStore {
    /// A store with nothing published. Does not touch the filesystem.
    pub fn new(paths: StorePaths) -> Self {
        Self {
            paths,
            current: RwLock::new(Arc::new(Published::nothing_yet())),
        }
    }

    /// Opens the store and publishes the persisted snapshot document, if a
    /// valid one exists. A corrupt document is logged and ignored.
    pub fn open(paths: StorePaths) -> Self {
        let store = Self::new(paths);
        match load_persisted(&store.paths.snapshot) {
            Ok(Some(published)) => {
                logging::info(
                    Component::Store,
                    None,
                    &format!(
                        "Loaded persisted snapshot from {} ({} records)",
                        store.paths.snapshot.display(),
                        published.snapshot.total_records()
                    ),
                );
                store.swap(Arc::new(published));
            }
            Ok(None) => logging::info(
                Component::Store,
                None,
                &format!("No persisted snapshot at {}", store.paths.snapshot.display()),
            ),
            Err(e) => logging::warn(
                Component::Store,
                None,
                &format!("Ignoring persisted snapshot: {}", e),
            ),
        }
        store
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// The current snapshot. Never blocks on a refresh cycle; returns the
    /// empty placeholder if nothing has been published.
    pub fn current(&self) -> Arc<Published> {
        Arc::clone(&self.current.read())
    }

    pub fn has_snapshot(&self) -> bool {
        !self.current().is_placeholder()
    }

    /// Persists `rows` and `snapshot`, then makes `snapshot` current.
    ///
    /// Files are written in order rows, document; memory is swapped last. If
    /// either write fails the previously published snapshot stays current
    /// and the error is returned. A failure on the document write leaves the
    /// new rows in the rows file: that file records the last *extraction*,
    /// and only the document is authoritative for what was published.
    pub fn publish(&self, snapshot: Snapshot, rows: &[RawRow]) -> Result<Arc<Published>, StoreError> {
        write_atomically(&self.paths.rows, |file| write_rows(file, rows, &self.paths.rows))?;
        write_atomically(&self.paths.snapshot, |file| {
            write_snapshot(file, &snapshot, &self.paths.snapshot)
        })?;

        let published = Arc::new(Published {
            snapshot,
            published_at: Some(Utc::now()),
        });
        let previous = self.swap(Arc::clone(&published));
        // The old snapshot may be the last reference; free it outside the lock.
        drop(previous);
        Ok(published)
    }

    /// Replaces the current pointer and hands back the previous one.
    fn swap(&self, next: Arc<Published>) -> Arc<Published> {
        let mut current = self.current.write();
        std::mem::replace(&mut *current, next)
    }
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Reads the persisted snapshot document. `Ok(None)` when the file is absent.
/// The document's modification time stands in for its publish time.
pub fn load_persisted(path: &Path) -> Result<Option<Published>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let mut snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    snapshot.fill_missing_categories();

    let published_at = fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    Ok(Some(Published {
        snapshot,
        published_at: Some(published_at),
    }))
}

fn write_rows(file: &mut BufWriter<File>, rows: &[RawRow], path: &Path) -> Result<(), StoreError> {
    let csv_err = |source: csv::Error| StoreError::Csv { path: path.to_path_buf(), source };
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(file);
    if rows.is_empty() {
        writer
            .write_record(["SENSOR NAME", "OBS TIME", "NORMAL LEVEL", "CURRENT", "DESCRIPTION"])
            .map_err(csv_err)?;
    }
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| StoreError::io(path, e))
}

fn write_snapshot(file: &mut BufWriter<File>, snapshot: &Snapshot, path: &Path) -> Result<(), StoreError> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut *file, formatter);
    snapshot.serialize(&mut serializer).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `path` via a temporary sibling and a rename.
fn write_atomically<F>(path: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), StoreError>,
{
    let tmp = temp_sibling(path);
    let result = (|| {
        let file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        let mut buffered = BufWriter::new(file);
        write(&mut buffered)?;
        buffered.flush().map_err(|e| StoreError::io(&tmp, e))?;
        buffered
            .get_ref()
            .sync_all()
            .map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
