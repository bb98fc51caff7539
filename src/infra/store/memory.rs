//! In-memory result backend.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::core::{ResultBackend, SchedulerError, StoreArea};

/// Keeps records in a map; history keys are write-once like the file backend.
#[derive(Default)]
pub struct InMemoryBackend {
    records: Mutex<HashMap<(StoreArea, String), String>>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored blob.
    pub fn get(&self, area: StoreArea, key: &str) -> Option<String> {
        self.records.lock().get(&(area, key.to_string())).cloned()
    }

    /// Keys stored in `area`, sorted.
    pub fn keys(&self, area: StoreArea) -> Vec<String> {
        let mut keys: Vec<_> = self
            .records
            .lock()
            .keys()
            .filter(|(a, _)| *a == area)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl ResultBackend for InMemoryBackend {
    fn put(&self, area: StoreArea, key: &str, blob: &str) -> Result<(), SchedulerError> {
        let mut records = self.records.lock();
        let slot = (area, key.to_string());
        if area == StoreArea::History && records.contains_key(&slot) {
            return Err(SchedulerError::Backend(format!("history key {key} already exists")));
        }
        records.insert(slot, blob.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_overwrites_history_does_not() {
        let backend = InMemoryBackend::new();
        backend.put(StoreArea::Current, "k", "one").unwrap();
        backend.put(StoreArea::Current, "k", "two").unwrap();
        assert_eq!(backend.get(StoreArea::Current, "k").as_deref(), Some("two"));

        backend.put(StoreArea::History, "k", "one").unwrap();
        assert!(backend.put(StoreArea::History, "k", "two").is_err());
        assert_eq!(backend.get(StoreArea::History, "k").as_deref(), Some("one"));
        assert_eq!(backend.keys(StoreArea::History), vec!["k".to_string()]);
    }
}
