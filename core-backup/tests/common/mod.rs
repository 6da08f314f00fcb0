//! Shared fakes for the backup integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, ChatId, ChatTransport, FileMetadata, FileSystemAccess, InboundEvent, MediaKind,
    MediaSource, TextOptions,
};
use bytes::Bytes;
use core_async::io::{AsyncReadExt, BoxedReader, BoxedWriter};
use core_async::time::Instant;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 2021-03-04T10:00:00Z
pub const MTIME: i64 = 1_614_852_000;

#[derive(Debug, Clone)]
pub enum FailMode {
    RateLimited(Option<Duration>),
    Network,
    Api(u16),
}

impl FailMode {
    fn to_error(&self) -> BridgeError {
        match self {
            FailMode::RateLimited(retry_after) => BridgeError::RateLimited {
                retry_after: *retry_after,
            },
            FailMode::Network => BridgeError::Network("connection reset".to_string()),
            FailMode::Api(status) => BridgeError::Api {
                status: *status,
                message: "rejected".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct FailRule {
    file_name: String,
    destination: Option<ChatId>,
    remaining: Option<usize>,
    mode: FailMode,
}

#[derive(Debug, Clone)]
pub struct SendAttempt {
    pub identity: String,
    pub destination: ChatId,
    pub kind: MediaKind,
    pub file_name: String,
    pub caption: Option<String>,
    pub at: Instant,
    pub succeeded: bool,
}

/// Remote side shared by every fake identity.
#[derive(Default)]
pub struct FakeRemote {
    objects: Mutex<HashMap<String, Bytes>>,
    attempts: Mutex<Vec<SendAttempt>>,
    rules: Mutex<Vec<FailRule>>,
    fetch_failures: Mutex<BTreeSet<String>>,
    send_delay: Mutex<Option<Duration>>,
    counter: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail sends of `file_name` `times` times (or forever with `None`).
    pub fn fail(&self, file_name: &str, times: Option<usize>, mode: FailMode) {
        self.rules.lock().unwrap().push(FailRule {
            file_name: file_name.to_string(),
            destination: None,
            remaining: times,
            mode,
        });
    }

    /// Fail sends of `file_name` to one destination forever.
    pub fn fail_destination(&self, file_name: &str, destination: &str, mode: FailMode) {
        self.rules.lock().unwrap().push(FailRule {
            file_name: file_name.to_string(),
            destination: Some(ChatId::from(destination)),
            remaining: None,
            mode,
        });
    }

    pub fn fail_fetch(&self, remote_id: &str) {
        self.fetch_failures.lock().unwrap().insert(remote_id.to_string());
    }

    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }

    pub fn attempts(&self) -> Vec<SendAttempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, file_name: &str) -> Vec<SendAttempt> {
        self.attempts()
            .into_iter()
            .filter(|attempt| attempt.file_name == file_name)
            .collect()
    }

    pub fn successful_sends(&self) -> usize {
        self.attempts().iter().filter(|a| a.succeeded).count()
    }

    pub fn put_object(&self, remote_id: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(remote_id.to_string(), Bytes::copy_from_slice(data));
    }

    fn take_failure(&self, file_name: &str, destination: &ChatId) -> Option<BridgeError> {
        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if rule.file_name != file_name {
                continue;
            }
            if let Some(target) = &rule.destination {
                if target != destination {
                    continue;
                }
            }
            match rule.remaining {
                Some(0) => continue,
                Some(ref mut left) => {
                    *left -= 1;
                    return Some(rule.mode.to_error());
                }
                None => return Some(rule.mode.to_error()),
            }
        }
        None
    }
}

pub struct FakeTransport {
    label: String,
    remote: Arc<FakeRemote>,
    pub texts: Mutex<Vec<(ChatId, String)>>,
}

impl FakeTransport {
    pub fn new(label: &str, remote: &Arc<FakeRemote>) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            remote: Arc::clone(remote),
            texts: Mutex::new(Vec::new()),
        })
    }

    async fn send(
        &self,
        kind: MediaKind,
        destination: &ChatId,
        source: MediaSource,
        caption: Option<&str>,
    ) -> BridgeResult<String> {
        let delay = *self.remote.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            core_async::time::sleep(delay).await;
        }

        let (file_name, data) = match source {
            MediaSource::Upload(mut upload) => {
                let mut data = Vec::new();
                upload.reader.read_to_end(&mut data).await?;
                assert_eq!(data.len() as u64, upload.length);
                (upload.file_name, Bytes::from(data))
            }
            MediaSource::Remote(id) => (id.clone(), Bytes::from(id.into_bytes())),
        };

        let failure = self.remote.take_failure(&file_name, destination);
        self.remote.attempts.lock().unwrap().push(SendAttempt {
            identity: self.label.clone(),
            destination: destination.clone(),
            kind,
            file_name: file_name.clone(),
            caption: caption.map(str::to_string),
            at: Instant::now(),
            succeeded: failure.is_none(),
        });

        if let Some(error) = failure {
            return Err(error);
        }

        let id = format!(
            "{}-{}",
            self.label,
            self.remote.counter.fetch_add(1, Ordering::SeqCst)
        );
        self.remote.objects.lock().unwrap().insert(id.clone(), data);
        Ok(id)
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    fn label(&self) -> &str {
        &self.label
    }

    async fn verify(&self) -> BridgeResult<String> {
        Ok(format!("{}_bot", self.label))
    }

    async fn send_text(&self, destination: &ChatId, text: &str, _: TextOptions) -> BridgeResult<()> {
        self.texts
            .lock()
            .unwrap()
            .push((destination.clone(), text.to_string()));
        Ok(())
    }

    async fn send_photo(&self, d: &ChatId, s: MediaSource, c: Option<&str>) -> BridgeResult<String> {
        self.send(MediaKind::Photo, d, s, c).await
    }

    async fn send_video(&self, d: &ChatId, s: MediaSource, c: Option<&str>) -> BridgeResult<String> {
        self.send(MediaKind::Video, d, s, c).await
    }

    async fn send_document(&self, d: &ChatId, s: MediaSource, c: Option<&str>) -> BridgeResult<String> {
        self.send(MediaKind::Document, d, s, c).await
    }

    async fn fetch_object(&self, remote_object_id: &str) -> BridgeResult<BoxedReader> {
        if self.remote.fetch_failures.lock().unwrap().contains(remote_object_id) {
            return Err(BridgeError::Network("download interrupted".to_string()));
        }

        let data = self.remote.objects.lock().unwrap().get(remote_object_id).cloned();
        match data {
            Some(data) => Ok(Box::new(std::io::Cursor::new(data.to_vec()))),
            None => Err(BridgeError::Api {
                status: 400,
                message: "file not found".to_string(),
            }),
        }
    }

    async fn poll_events(&self, _timeout: Duration) -> BridgeResult<Vec<InboundEvent>> {
        Ok(Vec::new())
    }
}

/// In-memory filesystem holding regular files only; directories are implied.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, Bytes>>,
    streams_opened: AtomicUsize,
}

impl MemoryFileSystem {
    pub fn with_files(files: &[(&str, &[u8])]) -> Arc<Self> {
        let fs = Self::default();
        for (path, data) in files {
            fs.files
                .lock()
                .unwrap()
                .insert(PathBuf::from(path), Bytes::copy_from_slice(data));
        }
        Arc::new(fs)
    }

    /// `open_read_stream` calls so far.
    pub fn streams_opened(&self) -> usize {
        self.streams_opened.load(Ordering::SeqCst)
    }

    fn get(&self, path: &Path) -> BridgeResult<Bytes> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files
            .lock()
            .unwrap()
            .keys()
            .any(|file| file != path && file.starts_with(path))
    }

    fn not_found(path: &Path) -> BridgeError {
        BridgeError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        ))
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(self.files.lock().unwrap().contains_key(path) || self.is_dir(path))
    }

    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        if let Some(data) = self.files.lock().unwrap().get(path) {
            return Ok(FileMetadata {
                size: data.len() as u64,
                created_at: Some(MTIME),
                modified_at: Some(MTIME),
                is_symlink: false,
                is_directory: false,
            });
        }
        if self.is_dir(path) {
            return Ok(FileMetadata {
                size: 0,
                created_at: None,
                modified_at: None,
                is_symlink: false,
                is_directory: true,
            });
        }
        Err(Self::not_found(path))
    }

    async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(path))
    }

    async fn rename(&self, from: &Path, to: &Path) -> BridgeResult<()> {
        let mut files = self.files.lock().unwrap();
        let data = files.remove(from).ok_or_else(|| Self::not_found(from))?;
        files.insert(to.to_path_buf(), data);
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>> {
        let children: BTreeSet<PathBuf> = self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter_map(|file| {
                let rest = file.strip_prefix(path).ok()?;
                let first = rest.components().next()?;
                Some(path.join(first))
            })
            .collect();
        Ok(children.into_iter().collect())
    }

    async fn open_read_stream(&self, path: &Path) -> BridgeResult<BoxedReader> {
        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        let data = self.get(path)?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn open_write_stream(&self, _path: &Path) -> BridgeResult<BoxedWriter> {
        Err(BridgeError::NotAvailable(
            "streaming writes are not supported in memory".to_string(),
        ))
    }
}
