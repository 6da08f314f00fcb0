//! Per-file helpers for the upload path: media classification, the
//! scan-root relative path and the caption attached to every upload.

use bridge_traits::MediaKind;
use chrono::{DateTime, Utc};
use std::path::{Component, Path};

/// Classify by extension, case-insensitively.
///
/// `jpg`, `jpeg` and `png` go out as photos, `mp4`, `mov` and `avi` as
/// videos. Everything else is sent as a document so it survives without
/// recompression.
pub fn classify(path: &Path) -> MediaKind {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg" | "jpeg" | "png") => MediaKind::Photo,
        Some("mp4" | "mov" | "avi") => MediaKind::Video,
        _ => MediaKind::Document,
    }
}

/// Path of `path` below `root`, joined with `/` regardless of platform.
///
/// Paths outside `root` keep their own normal components.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);

    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Caption stored next to every uploaded object.
///
/// `modified_at` is the file's mtime in Unix seconds; the date is rendered in
/// UTC as `d/m/yyyy` without zero padding.
pub fn caption(relative_path: &str, modified_at: Option<i64>) -> String {
    let date = modified_at
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);

    format!("Path: {}\nDate: {}", relative_path, date.format("%-d/%-m/%Y"))
}

/// File name used for the multipart upload.
pub fn upload_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_classify() {
        assert_eq!(classify(Path::new("a/b.JPG")), MediaKind::Photo);
        assert_eq!(classify(Path::new("a/b.png")), MediaKind::Photo);
        assert_eq!(classify(Path::new("clip.MoV")), MediaKind::Video);
        assert_eq!(classify(Path::new("scan.tiff")), MediaKind::Document);
        assert_eq!(classify(Path::new("README")), MediaKind::Document);
    }

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = PathBuf::from("/mnt/photos");
        let path = root.join("2021").join("beach").join("a.jpg");
        assert_eq!(relative_path(&root, &path), "2021/beach/a.jpg");
    }

    #[test]
    fn test_relative_path_outside_root() {
        assert_eq!(
            relative_path(Path::new("/mnt/photos"), Path::new("/other/x.png")),
            "other/x.png"
        );
    }

    #[test]
    fn test_caption_format() {
        // 2021-03-04T10:00:00Z
        let caption = caption("2021/a.jpg", Some(1_614_852_000));
        assert_eq!(caption, "Path: 2021/a.jpg\nDate: 4/3/2021");
    }

    #[test]
    fn test_upload_name() {
        assert_eq!(upload_name(Path::new("/x/y/photo.jpg")), "photo.jpg");
    }
}
