//! Input discovery: enumerate the supported images in a directory.
//!
//! Discovery is non-recursive and filters by extension only; content is
//! validated later by the transformer, so a mislabelled file becomes a
//! per-image failure instead of aborting the run. The returned list is
//! lexicographically pre-sorted so that files whose natural-sort keys tie
//! (e.g. `a.png` and `A.png`) always come out in the same order.

use crate::error::Img2PdfError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions accepted by discovery, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Whether `path` carries one of the [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| e.eq_ignore_ascii_case(s))
        })
        .unwrap_or(false)
}

/// List the supported image files directly inside `dir`.
///
/// Returns [`Img2PdfError::NoImages`] when nothing matches.
pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>, Img2PdfError> {
    let meta = match std::fs::metadata(dir) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Img2PdfError::PermissionDenied {
                path: dir.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Img2PdfError::InputNotFound {
                path: dir.to_path_buf(),
            });
        }
    };
    if !meta.is_dir() {
        return Err(Img2PdfError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Img2PdfError::PermissionDenied {
            path: dir.to_path_buf(),
        },
        _ => Img2PdfError::InputReadFailed {
            path: dir.to_path_buf(),
            source: e,
        },
    })?;

    let mut images = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Img2PdfError::InputReadFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        // Follows symlinks; a dangling link is simply skipped.
        if path.is_file() && is_supported(&path) {
            images.push(path);
        }
    }

    if images.is_empty() {
        return Err(Img2PdfError::NoImages {
            location: dir.display().to_string(),
        });
    }

    images.sort();
    debug!("Discovered {} images in {}", images.len(), dir.display());
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("a.png")));
        assert!(is_supported(Path::new("a.JPG")));
        assert!(is_supported(Path::new("dir/a.Jpeg")));
        assert!(is_supported(Path::new("a.webp")));
        assert!(!is_supported(Path::new("a.gif")));
        assert!(!is_supported(Path::new("png")));
        assert!(!is_supported(Path::new("a.png.txt")));
    }

    #[test]
    fn discovers_only_supported_files() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "b.png");
        touch(tmp.path(), "a.JPG");
        touch(tmp.path(), "notes.txt");
        std::fs::create_dir(tmp.path().join("nested.png")).unwrap();
        touch(&tmp.path().join("nested.png"), "inner.png");

        let found = discover_images(tmp.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png"]);
    }

    #[test]
    fn empty_directory_is_no_images() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "readme.md");
        let err = discover_images(tmp.path()).unwrap_err();
        assert!(matches!(err, Img2PdfError::NoImages { .. }), "got {err:?}");
    }

    #[test]
    fn missing_directory_is_input_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = discover_images(&tmp.path().join("absent")).unwrap_err();
        assert!(matches!(err, Img2PdfError::InputNotFound { .. }), "got {err:?}");
    }

    #[test]
    fn file_is_not_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "one.png");
        let err = discover_images(&tmp.path().join("one.png")).unwrap_err();
        assert!(matches!(err, Img2PdfError::NotADirectory { .. }), "got {err:?}");
    }
}
