//! # Metadata Store
//!
//! Durable index of uploaded files.
//!
//! ## Overview
//!
//! Records are append-only and live in memory between saves. `is_uploaded`
//! answers from a path index, `add` never touches disk, and `save` writes the
//! whole index through the [`snapshot`] codec.
//!
//! ## Crash safety
//!
//! A save encodes the index, writes it to a temporary file in the target's
//! directory, fsyncs it and renames it over the target. Saves are serialized
//! by an async lock, so a reader only ever sees a complete old or complete
//! new snapshot.
//!
//! Loading never fails: a missing file yields an empty index, and an
//! unreadable or corrupt one is moved to `<path>.corrupt` before starting
//! empty.
//!
//! ## Usage
//!
//! ```ignore
//! let store = MetadataStore::new("uploaded_files.tcsnap");
//! store.load().await;
//!
//! if !store.is_uploaded("2021/a.jpg") {
//!     store.add(record);
//! }
//! store.save().await?;
//! ```

pub mod snapshot;

use crate::{BackupError, Result};
use bridge_traits::ChatId;
use core_async::sync::Mutex as AsyncMutex;
use core_async::task::spawn_blocking;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// One uploaded copy of a local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path below the scan root, `/`-separated.
    pub relative_path: String,
    pub remote_object_id: String,
    pub caption: String,
    pub channel_id: ChatId,
}

#[derive(Debug, Default)]
struct Index {
    records: Vec<FileRecord>,
    paths: HashSet<String>,
}

impl Index {
    fn from_records(records: Vec<FileRecord>) -> Self {
        let paths = records
            .iter()
            .map(|record| record.relative_path.clone())
            .collect();
        Self { records, paths }
    }
}

#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    index: Mutex<Index>,
    save_lock: AsyncMutex<()>,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            index: Mutex::new(Index::default()),
            save_lock: AsyncMutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory index with the snapshot on disk.
    ///
    /// Returns the number of records loaded.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> usize {
        let path = self.path.clone();
        let outcome = spawn_blocking(move || read_snapshot(&path)).await;

        let records = match outcome {
            Ok(Ok(Some(records))) => records,
            Ok(Ok(None)) => {
                info!("No snapshot found, starting with an empty index");
                Vec::new()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Snapshot unreadable, starting with an empty index");
                self.quarantine().await;
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Snapshot load task failed, starting with an empty index");
                Vec::new()
            }
        };

        let count = records.len();
        *self.index.lock() = Index::from_records(records);
        info!(records = count, "Metadata loaded");
        count
    }

    pub fn is_uploaded(&self, relative_path: &str) -> bool {
        self.index.lock().paths.contains(relative_path)
    }

    /// Append a record in memory. Nothing is persisted until [`save`](Self::save).
    pub fn add(&self, record: FileRecord) {
        let mut index = self.index.lock();
        index.paths.insert(record.relative_path.clone());
        index.records.push(record);
    }

    pub fn list(&self) -> Vec<FileRecord> {
        self.index.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.index.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.lock().records.is_empty()
    }

    /// Atomically persist the full index. Returns the number of records written.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn save(&self) -> Result<usize> {
        let _guard = self.save_lock.lock().await;

        let records = self.list();
        let count = records.len();
        let path = self.path.clone();

        spawn_blocking(move || -> Result<()> {
            let bytes = snapshot::encode(&records)?;
            atomic_write(&path, &bytes)
        })
        .await
        .map_err(|e| BackupError::Task(e.to_string()))??;

        debug!(records = count, "Metadata saved");
        Ok(count)
    }

    async fn quarantine(&self) {
        let from = self.path.clone();
        let to = corrupt_path(&self.path);

        match spawn_blocking(move || std::fs::rename(&from, &to).map(|_| to)).await {
            Ok(Ok(to)) => warn!(moved_to = %to.display(), "Corrupt snapshot moved aside"),
            Ok(Err(e)) => warn!(error = %e, "Failed to move corrupt snapshot aside"),
            Err(e) => warn!(error = %e, "Failed to move corrupt snapshot aside"),
        }
    }
}

fn read_snapshot(path: &Path) -> Result<Option<Vec<FileRecord>>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(snapshot::decode(&bytes)?))
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".corrupt");
    PathBuf::from(name)
}
