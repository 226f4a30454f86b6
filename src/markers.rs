//! Per-target last-seen markers.
//!
//! Discovery walks each search target newest-first and stops at the
//! link it saw first on the previous run. That link is kept per target
//! in a small JSON map on disk so restarts do not reprocess old
//! postings.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument};

/// Errors reading or writing the marker file.
#[derive(Debug, Error)]
pub enum MarkerError {
    /// Filesystem failure.
    #[error("marker file {path}: {source}")]
    Io {
        /// The marker file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The file exists but is not a valid marker map.
    #[error("marker file {path} is corrupt: {source}")]
    Corrupt {
        /// The marker file path.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Map of search-target name to the most recent job link seen there.
pub type MarkerMap = HashMap<String, String>;

/// Durable storage for the marker map.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    path: PathBuf,
}

impl MarkerStore {
    /// Creates a store over the given file path; the file need not
    /// exist yet.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Loads the marker map. A missing file is an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerError::Io`] on read failure other than
    /// not-found, or [`MarkerError::Corrupt`] if the file is not valid
    /// JSON.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<MarkerMap, MarkerError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no marker file yet; starting empty");
                return Ok(MarkerMap::new());
            }
            Err(e) => {
                return Err(MarkerError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|e| MarkerError::Corrupt {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Overwrites the marker map atomically (write-then-rename).
    ///
    /// # Errors
    ///
    /// Returns [`MarkerError::Io`] on write failure.
    #[instrument(skip(self, markers), fields(path = %self.path.display(), targets = markers.len()))]
    pub fn save(&self, markers: &MarkerMap) -> Result<(), MarkerError> {
        let io_err = |source| MarkerError::Io {
            path: self.path.clone(),
            source,
        };

        let body = serde_json::to_string_pretty(markers)
            .map_err(|e| io_err(io::Error::other(e)))?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, body).map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(&dir.path().join("markers.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(&dir.path().join("markers.json"));

        let mut markers = MarkerMap::new();
        markers.insert(
            "react".to_string(),
            "https://example.com/jobs/42".to_string(),
        );
        store.save(&markers).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, markers);
    }

    #[test]
    fn test_save_overwrites_previous_map() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(&dir.path().join("markers.json"));

        let mut first = MarkerMap::new();
        first.insert("react".to_string(), "https://example.com/jobs/1".to_string());
        first.insert("python".to_string(), "https://example.com/jobs/2".to_string());
        store.save(&first).unwrap();

        let mut second = MarkerMap::new();
        second.insert("react".to_string(), "https://example.com/jobs/9".to_string());
        store.save(&second).unwrap();

        // Stale targets from the first save are gone.
        assert_eq!(store.load().unwrap(), second);
    }

    #[test]
    fn test_load_corrupt_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.json");
        fs::write(&path, "not json").unwrap();

        let store = MarkerStore::new(&path);
        assert!(matches!(store.load(), Err(MarkerError::Corrupt { .. })));
    }
}
