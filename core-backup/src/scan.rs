//! Local scanner producing upload candidates.

use crate::{BackupError, Result};
use bridge_traits::FileSystemAccess;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct LocalScanner {
    file_system: Arc<dyn FileSystemAccess>,
    extensions: HashSet<String>,
}

impl LocalScanner {
    /// `extensions` are matched case-insensitively, without the leading dot.
    pub fn new<I, S>(file_system: Arc<dyn FileSystemAccess>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            file_system,
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    /// Walk `root` recursively and return matching files, sorted.
    ///
    /// Directories that cannot be listed are skipped with a warning. Symbolic
    /// links are never followed, so a link back to an ancestor cannot make the
    /// walk revisit the same files under new names.
    #[instrument(skip(self), fields(root = %root.display()))]
    pub async fn scan(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !self.file_system.exists(root).await? {
            return Err(BackupError::ScanRootMissing(root.display().to_string()));
        }

        let mut pending = vec![root.to_path_buf()];
        let mut found = Vec::new();
        let mut skipped_dirs = 0usize;
        let mut skipped_links = 0usize;

        while let Some(dir) = pending.pop() {
            let entries = match self.file_system.list_directory(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                    skipped_dirs += 1;
                    continue;
                }
            };

            for entry in entries {
                match self.file_system.metadata(&entry).await {
                    Ok(meta) if meta.is_symlink => {
                        debug!(path = %entry.display(), "Not following symbolic link");
                        skipped_links += 1;
                    }
                    Ok(meta) if meta.is_directory => pending.push(entry),
                    Ok(_) if self.accepts(&entry) => found.push(entry),
                    Ok(_) => {}
                    Err(e) => debug!(path = %entry.display(), error = %e, "Skipping entry"),
                }
            }
        }

        found.sort();
        info!(files = found.len(), skipped_dirs, skipped_links, "Scan complete");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{BridgeError, FileMetadata};
    use core_async::io::{BoxedReader, BoxedWriter};
    use mockall::mock;

    mock! {
        Fs {}

        #[async_trait]
        impl FileSystemAccess for Fs {
            async fn exists(&self, path: &Path) -> BridgeResult<bool>;
            async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata>;
            async fn create_dir_all(&self, path: &Path) -> BridgeResult<()>;
            async fn delete_file(&self, path: &Path) -> BridgeResult<()>;
            async fn rename(&self, from: &Path, to: &Path) -> BridgeResult<()>;
            async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>>;
            async fn open_read_stream(&self, path: &Path) -> BridgeResult<BoxedReader>;
            async fn open_write_stream(&self, path: &Path) -> BridgeResult<BoxedWriter>;
        }
    }

    fn meta(is_directory: bool) -> FileMetadata {
        FileMetadata {
            size: 1,
            created_at: None,
            modified_at: None,
            is_symlink: false,
            is_directory,
        }
    }

    #[test]
    fn test_accepts_case_insensitive() {
        let scanner = LocalScanner::new(Arc::new(MockFs::new()), ["jpg", ".MP4"]);
        assert!(scanner.accepts(Path::new("a/B.JPG")));
        assert!(scanner.accepts(Path::new("clip.mp4")));
        assert!(!scanner.accepts(Path::new("notes.txt")));
        assert!(!scanner.accepts(Path::new("jpg")));
    }

    #[tokio::test]
    async fn test_unreadable_directory_is_skipped() {
        let mut fs = MockFs::new();
        fs.expect_exists().returning(|_| Ok(true));
        fs.expect_list_directory()
            .withf(|path| path == Path::new("/root"))
            .returning(|_| {
                Ok(vec![
                    PathBuf::from("/root/b.jpg"),
                    PathBuf::from("/root/locked"),
                    PathBuf::from("/root/a.png"),
                    PathBuf::from("/root/readme.txt"),
                ])
            });
        fs.expect_list_directory()
            .withf(|path| path == Path::new("/root/locked"))
            .returning(|_| Err(BridgeError::OperationFailed("permission denied".into())));
        fs.expect_metadata()
            .returning(|path| Ok(meta(path.ends_with("locked"))));

        let scanner = LocalScanner::new(Arc::new(fs), ["jpg", "png"]);
        let found = scanner.scan(Path::new("/root")).await.unwrap();

        assert_eq!(
            found,
            vec![PathBuf::from("/root/a.png"), PathBuf::from("/root/b.jpg")]
        );
    }

    #[tokio::test]
    async fn test_linked_directory_is_not_entered() {
        let mut fs = MockFs::new();
        fs.expect_exists().returning(|_| Ok(true));
        fs.expect_list_directory()
            .withf(|path| path == Path::new("/root"))
            .times(1)
            .returning(|_| {
                Ok(vec![
                    PathBuf::from("/root/a.jpg"),
                    PathBuf::from("/root/loop"),
                    PathBuf::from("/root/alias.jpg"),
                ])
            });
        fs.expect_metadata().returning(|path| {
            let mut info = meta(path.ends_with("loop"));
            info.is_symlink = !path.ends_with("a.jpg");
            Ok(info)
        });

        let scanner = LocalScanner::new(Arc::new(fs), ["jpg"]);
        let found = scanner.scan(Path::new("/root")).await.unwrap();

        assert_eq!(found, vec![PathBuf::from("/root/a.jpg")]);
    }

    #[tokio::test]
    async fn test_missing_root() {
        let mut fs = MockFs::new();
        fs.expect_exists().returning(|_| Ok(false));

        let scanner = LocalScanner::new(Arc::new(fs), ["jpg"]);
        assert!(matches!(
            scanner.scan(Path::new("/nope")).await,
            Err(BackupError::ScanRootMissing(_))
        ));
    }
}
