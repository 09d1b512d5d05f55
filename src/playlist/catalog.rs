//! Track catalog.
//!
//! The catalog is supplied once when the playback service starts and is not
//! mutated for the rest of the session. The daemon builds it by scanning a
//! music directory; the service itself never touches the filesystem.

use std::path::Path;

use tracing::debug;

use super::error::CatalogError;
use crate::types::Track;

/// Extensions picked up by the directory scan when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["mp3"];

/// Ordered list of playable tracks for one service session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    /// Creates a catalog from an ordered list of tracks.
    #[must_use]
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Creates a catalog from file paths, deriving titles from file names.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self::new(
            paths
                .into_iter()
                .map(|p| Track::from_path(p.as_ref()))
                .collect(),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}

/// Scans a directory for audio files with one of the given extensions.
///
/// Matching is case-insensitive and not recursive. Tracks are ordered by
/// file name so the same directory always yields the same catalog.
///
/// # Errors
///
/// Returns `CatalogError::DirectoryNotFound` if `dir` is not a directory and
/// `CatalogError::ReadError` if it cannot be listed.
pub fn scan_music_dir<S: AsRef<str>>(dir: &Path, extensions: &[S]) -> Result<Catalog, CatalogError> {
    if !dir.is_dir() {
        return Err(CatalogError::DirectoryNotFound(dir.display().to_string()));
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| CatalogError::ReadError(format!("{}: {}", dir.display(), e)))?;

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension().is_some_and(|ext| {
                let ext = ext.to_string_lossy();
                extensions
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed.as_ref()))
            })
        })
        .collect();

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    debug!("Found {} tracks in {}", paths.len(), dir.display());
    Ok(Catalog::from_paths(paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    mod catalog_tests {
        use super::*;

        #[test]
        fn test_empty_catalog() {
            let catalog = Catalog::default();
            assert!(catalog.is_empty());
            assert_eq!(catalog.len(), 0);
            assert!(catalog.get(0).is_none());
        }

        #[test]
        fn test_from_paths_keeps_order() {
            let catalog = Catalog::from_paths(["/m/C.mp3", "/m/A.mp3", "/m/B.mp3"]);
            let titles: Vec<_> = catalog.tracks().iter().map(|t| t.title.as_str()).collect();
            assert_eq!(titles, ["C", "A", "B"]);
        }

        #[test]
        fn test_get() {
            let catalog = Catalog::from_paths(["/m/A.mp3"]);
            assert_eq!(catalog.get(0).unwrap().title, "A");
            assert!(catalog.get(1).is_none());
        }
    }

    mod scan_tests {
        use super::*;

        #[test]
        fn test_scan_filters_by_extension() {
            let dir = tempfile::tempdir().unwrap();
            touch(dir.path(), "b.mp3");
            touch(dir.path(), "a.mp3");
            touch(dir.path(), "notes.txt");
            touch(dir.path(), "cover.jpg");

            let catalog = scan_music_dir(dir.path(), DEFAULT_EXTENSIONS).unwrap();
            let titles: Vec<_> = catalog.tracks().iter().map(|t| t.title.as_str()).collect();
            assert_eq!(titles, ["a", "b"]);
        }

        #[test]
        fn test_scan_is_case_insensitive() {
            let dir = tempfile::tempdir().unwrap();
            touch(dir.path(), "LOUD.MP3");

            let catalog = scan_music_dir(dir.path(), &["mp3"]).unwrap();
            assert_eq!(catalog.len(), 1);
            assert_eq!(catalog.get(0).unwrap().title, "LOUD");
        }

        #[test]
        fn test_scan_multiple_extensions() {
            let dir = tempfile::tempdir().unwrap();
            touch(dir.path(), "one.mp3");
            touch(dir.path(), "two.flac");
            touch(dir.path(), "three.ogg");

            let catalog = scan_music_dir(dir.path(), &["mp3", "flac"]).unwrap();
            assert_eq!(catalog.len(), 2);
        }

        #[test]
        fn test_scan_skips_directories() {
            let dir = tempfile::tempdir().unwrap();
            fs::create_dir(dir.path().join("album.mp3")).unwrap();
            touch(dir.path(), "single.mp3");

            let catalog = scan_music_dir(dir.path(), DEFAULT_EXTENSIONS).unwrap();
            assert_eq!(catalog.len(), 1);
        }

        #[test]
        fn test_scan_empty_directory() {
            let dir = tempfile::tempdir().unwrap();
            let catalog = scan_music_dir(dir.path(), DEFAULT_EXTENSIONS).unwrap();
            assert!(catalog.is_empty());
        }

        #[test]
        fn test_scan_missing_directory() {
            let result = scan_music_dir(Path::new("/nonexistent/music/dir"), DEFAULT_EXTENSIONS);
            match result {
                Err(CatalogError::DirectoryNotFound(msg)) => {
                    assert!(msg.contains("/nonexistent/music/dir"));
                }
                other => panic!("Expected DirectoryNotFound, got {:?}", other),
            }
        }
    }
}
