//! Scanner walks over a real directory tree.

use bridge_desktop::TokioFileSystem;
use bridge_traits::FileSystemAccess;
use core_backup::{BackupError, LocalScanner};
use std::sync::Arc;

fn scanner() -> LocalScanner {
    LocalScanner::new(
        Arc::new(TokioFileSystem::new()) as Arc<dyn FileSystemAccess>,
        ["jpg", "mp4"],
    )
}

#[tokio::test]
async fn test_scan_nested_tree() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("2021/beach")).unwrap();
    std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
    std::fs::write(dir.path().join("2021/beach/b.JPG"), b"b").unwrap();
    std::fs::write(dir.path().join("2021/clip.mp4"), b"c").unwrap();
    std::fs::write(dir.path().join("2021/notes.txt"), b"d").unwrap();

    let found = scanner().scan(dir.path()).await.unwrap();

    assert_eq!(
        found,
        vec![
            dir.path().join("2021/beach/b.JPG"),
            dir.path().join("2021/clip.mp4"),
            dir.path().join("a.jpg"),
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_loop_is_scanned_once() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
    std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/up")).unwrap();

    let found = scanner().scan(dir.path()).await.unwrap();

    assert_eq!(found, vec![dir.path().join("a.jpg")]);
}

#[tokio::test]
async fn test_missing_root_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = scanner().scan(&dir.path().join("absent")).await;

    assert!(matches!(result, Err(BackupError::ScanRootMissing(_))));
}
