//! Finding image files under a directory.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions picked up when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];

/// Every file below `directory` whose extension is in `extensions`
/// (case-insensitive), sorted by path.
pub fn discover_images(directory: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy().to_lowercase();
                    extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
                })
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    images.sort();
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_discover_images() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("photo1.jpg")).unwrap();
        File::create(dir.path().join("photo2.PNG")).unwrap();
        File::create(dir.path().join("document.txt")).unwrap();

        fs::create_dir(dir.path().join("subdir")).unwrap();
        File::create(dir.path().join("subdir/photo3.jpeg")).unwrap();

        let images = discover_images(dir.path(), DEFAULT_EXTENSIONS);

        assert_eq!(images.len(), 3);
        assert!(images.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_discover_images_missing_directory() {
        let dir = tempdir().unwrap();
        assert!(discover_images(&dir.path().join("nope"), DEFAULT_EXTENSIONS).is_empty());
    }
}
