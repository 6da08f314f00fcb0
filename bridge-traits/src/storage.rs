//! File System Abstraction
//!
//! Provides the platform-agnostic file I/O trait used by the scanner, the
//! upload scheduler (streaming payloads out) and the restore engine (streaming
//! them back in).

use async_trait::async_trait;
use core_async::io::{BoxedReader, BoxedWriter};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub created_at: Option<i64>,
    /// Last modification time, Unix epoch seconds.
    pub modified_at: Option<i64>,
    /// Set when `path` itself is a symbolic link. The other fields then
    /// describe the link target, or the link when the target is missing.
    pub is_symlink: bool,
    pub is_directory: bool,
}

/// File system access trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn copy(fs: &dyn FileSystemAccess, from: &Path, to: &Path) -> Result<()> {
///     let mut reader = fs.open_read_stream(from).await?;
///     let mut writer = fs.open_write_stream(to).await?;
///     core_async::io::copy(&mut reader, &mut writer).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get file metadata, following symbolic links
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all missing parents
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Rename a file, replacing the destination if it exists
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// List the immediate children of a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Open file for streaming reads
    async fn open_read_stream(&self, path: &Path) -> Result<BoxedReader>;

    /// Open file for streaming writes, creating parent directories
    async fn open_write_stream(&self, path: &Path) -> Result<BoxedWriter>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_metadata() {
        let metadata = FileMetadata {
            size: 1024,
            created_at: Some(1234567890),
            modified_at: Some(1234567900),
            is_symlink: false,
            is_directory: false,
        };

        assert_eq!(metadata.size, 1024);
        assert!(!metadata.is_directory);
    }
}
