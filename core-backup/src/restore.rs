//! # Restore Engine
//!
//! Streams every recorded file back under a local root.
//!
//! Records are grouped by relative path in first-seen order. For each path
//! the recorded copies are tried in order, one attempt each, until one
//! lands. Data is streamed into `<target>.partial` and renamed into place, so
//! an interrupted restore never leaves a truncated file under its real name.
//! One path failing never stops the others.

use crate::metadata::{FileRecord, MetadataStore};
use crate::pool::ClientPool;
use crate::{BackupError, Result};
use bridge_traits::{BridgeError, FileSystemAccess};
use core_async::io::{copy, AsyncWriteExt};
use core_async::sync::CancellationToken;
use core_async::time::Instant;
use core_runtime::events::{CoreEvent, EventBus, RestoreEvent};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreSummary {
    pub total_paths: u64,
    pub restored: u64,
    pub failed: u64,
    pub duration: Duration,
    pub interrupted: bool,
}

pub struct RestoreEngine {
    restore_root: PathBuf,
    pool: Arc<ClientPool>,
    store: Arc<MetadataStore>,
    file_system: Arc<dyn FileSystemAccess>,
    event_bus: EventBus,
    shutdown: CancellationToken,
}

impl RestoreEngine {
    pub fn new(
        restore_root: impl Into<PathBuf>,
        pool: Arc<ClientPool>,
        store: Arc<MetadataStore>,
        file_system: Arc<dyn FileSystemAccess>,
        event_bus: EventBus,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            restore_root: restore_root.into(),
            pool,
            store,
            file_system,
            event_bus,
            shutdown,
        }
    }

    /// Restore every recorded path. Stops between paths on shutdown.
    #[instrument(skip(self), fields(root = %self.restore_root.display()))]
    pub async fn restore_all(&self) -> Result<RestoreSummary> {
        let started = Instant::now();
        let groups = group_by_path(self.store.list());
        let total_paths = groups.len() as u64;

        info!(total_paths, "Starting restore");
        self.event_bus
            .emit(CoreEvent::Restore(RestoreEvent::Started { total_paths }))
            .ok();

        self.file_system.create_dir_all(&self.restore_root).await?;

        let mut restored = 0u64;
        let mut failed = 0u64;
        let mut interrupted = false;

        for (relative_path, records) in groups {
            if self.shutdown.is_cancelled() {
                warn!("Shutdown requested, stopping restore");
                interrupted = true;
                break;
            }

            let target = match target_path(&self.restore_root, &relative_path) {
                Ok(target) => target,
                Err(e) => {
                    warn!(path = %relative_path, error = %e, "Refusing to restore path");
                    failed += 1;
                    continue;
                }
            };

            if self.restore_path(&relative_path, &records, &target).await {
                restored += 1;
            } else {
                failed += 1;
            }
        }

        let summary = RestoreSummary {
            total_paths,
            restored,
            failed,
            duration: started.elapsed(),
            interrupted,
        };

        self.event_bus
            .emit(CoreEvent::Restore(RestoreEvent::Completed {
                restored,
                failed,
                duration_secs: summary.duration.as_secs(),
            }))
            .ok();

        info!(restored, failed, interrupted, "Restore finished");
        Ok(summary)
    }

    async fn restore_path(&self, relative_path: &str, records: &[FileRecord], target: &Path) -> bool {
        for record in records {
            match self.fetch_into(record, target).await {
                Ok(bytes) => {
                    debug!(path = %relative_path, bytes, channel = %record.channel_id, "Restored");
                    return true;
                }
                Err(e) => {
                    warn!(
                        path = %relative_path,
                        channel = %record.channel_id,
                        error = %e,
                        "Restore attempt failed"
                    );
                }
            }
        }

        error!(path = %relative_path, copies = records.len(), "No recorded copy could be restored");
        false
    }

    async fn fetch_into(&self, record: &FileRecord, target: &Path) -> Result<u64> {
        if let Some(parent) = target.parent() {
            self.file_system.create_dir_all(parent).await?;
        }

        let identity = self.pool.next();
        let mut reader = identity
            .transport()
            .fetch_object(&record.remote_object_id)
            .await?;

        let partial = partial_path(target);
        let written = async {
            let mut writer = self.file_system.open_write_stream(&partial).await?;
            let written = copy(&mut reader, &mut writer)
                .await
                .map_err(BridgeError::Io)?;
            writer.shutdown().await.map_err(BridgeError::Io)?;
            Ok::<u64, BridgeError>(written)
        }
        .await;

        let written = match written {
            Ok(written) => written,
            Err(e) => {
                if let Err(cleanup) = self.file_system.delete_file(&partial).await {
                    debug!(error = %cleanup, "No partial file to clean up");
                }
                return Err(e.into());
            }
        };

        self.file_system.rename(&partial, target).await?;
        Ok(written)
    }
}

fn group_by_path(records: Vec<FileRecord>) -> Vec<(String, Vec<FileRecord>)> {
    let mut groups: Vec<(String, Vec<FileRecord>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        match positions.get(&record.relative_path) {
            Some(&index) => groups[index].1.push(record),
            None => {
                positions.insert(record.relative_path.clone(), groups.len());
                groups.push((record.relative_path.clone(), vec![record]));
            }
        }
    }

    groups
}

/// Join a `/`-separated relative path onto `root`.
///
/// Absolute paths, parent references and empty paths are rejected so a
/// restore never writes outside `root`.
pub fn target_path(root: &Path, relative_path: &str) -> Result<PathBuf> {
    let invalid = || BackupError::InvalidPath(relative_path.to_string());

    if relative_path.starts_with('/') || relative_path.starts_with('\\') {
        return Err(invalid());
    }

    let mut target = root.to_path_buf();
    let mut depth = 0usize;

    for segment in relative_path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(invalid()),
            part if part.contains('\\') || part.contains(':') => return Err(invalid()),
            part => {
                target.push(part);
                depth += 1;
            }
        }
    }

    if depth == 0 {
        return Err(invalid());
    }

    Ok(target)
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}
