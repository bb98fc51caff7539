//! Filesystem result backend.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/current/<key>.json   latest results, rewritable
//! <root>/history/<key>.json   archive, created once and never rewritten
//! ```

use std::fs::{create_dir_all, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::{ResultBackend, SchedulerError, StoreArea};

/// Writes each record as a JSON file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Create the backend, making both area directories if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let root = root.as_ref().to_path_buf();
        for area in [StoreArea::Current, StoreArea::History] {
            create_dir_all(root.join(area.as_str()))
                .map_err(|e| SchedulerError::Backend(e.to_string()))?;
        }
        Ok(Self { root })
    }

    /// Path a record would be written to.
    pub fn file_path(&self, area: StoreArea, key: &str) -> PathBuf {
        self.root.join(area.as_str()).join(format!("{key}.json"))
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResultBackend for FileBackend {
    fn put(&self, area: StoreArea, key: &str, blob: &str) -> Result<(), SchedulerError> {
        let path = self.file_path(area, key);
        let mut options = OpenOptions::new();
        options.write(true);
        match area {
            StoreArea::Current => options.create(true).truncate(true),
            StoreArea::History => options.create_new(true),
        };
        let mut file = options
            .open(&path)
            .map_err(|e| SchedulerError::Backend(format!("{}: {e}", path.display())))?;
        file.write_all(blob.as_bytes())
            .and_then(|()| file.sync_data())
            .map_err(|e| SchedulerError::Backend(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_both_areas() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();

        backend.put(StoreArea::Current, "k1", "{\"a\":1}").unwrap();
        backend.put(StoreArea::History, "k1", "{\"a\":1}").unwrap();

        let current = std::fs::read_to_string(dir.path().join("current/k1.json")).unwrap();
        let history = std::fs::read_to_string(dir.path().join("history/k1.json")).unwrap();
        assert_eq!(current, "{\"a\":1}");
        assert_eq!(history, current);
    }

    #[test]
    fn test_history_is_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();

        backend.put(StoreArea::History, "k1", "first").unwrap();
        assert!(backend.put(StoreArea::History, "k1", "second").is_err());
        let kept = std::fs::read_to_string(backend.file_path(StoreArea::History, "k1")).unwrap();
        assert_eq!(kept, "first");

        backend.put(StoreArea::Current, "k1", "first").unwrap();
        backend.put(StoreArea::Current, "k1", "second").unwrap();
        let current = std::fs::read_to_string(backend.file_path(StoreArea::Current, "k1")).unwrap();
        assert_eq!(current, "second");
    }
}
