//! Durable identifier allocation
//!
//! Ids are handed to categories, subcategories and threads the first time
//! they are seen and never reassigned. The counter lives in the domain
//! config record; every allocation is a full read-modify-write round trip
//! under one lock, so a crash loses at most the single in-flight id and
//! concurrent crawl tasks can never receive duplicates.

use crate::store::{RecordStore, StoreError, StoreResult};
use std::sync::{Arc, Mutex};

/// Atomic, persisted id counter shared across crawl tasks
#[derive(Debug)]
pub struct IdAllocator {
    store: Arc<RecordStore>,
    // Guards the whole read-counter/persist-counter cycle, not just the
    // in-memory increment.
    lock: Mutex<()>,
}

impl IdAllocator {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Returns the next globally unique id, persisting the advanced counter
    /// before releasing the lock
    pub fn next_id(&self) -> StoreResult<u64> {
        let _guard = self.lock.lock().unwrap();

        let mut config = self
            .store
            .load_domain_config()?
            .ok_or_else(|| StoreError::Missing("domain config".to_string()))?;

        let id = config.last_id;
        config.last_id += 1;
        self.store.write_domain_config(&config)?;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DomainConfig;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn allocator(dir: &TempDir) -> Arc<IdAllocator> {
        let store = Arc::new(RecordStore::open(dir.path(), "forum.example.com").unwrap());
        store
            .write_domain_config(&DomainConfig {
                domain: "forum.example.com".to_string(),
                url: "https://forum.example.com".to_string(),
                last_id: 0,
            })
            .unwrap();
        Arc::new(IdAllocator::new(store))
    }

    #[test]
    fn test_sequential_allocation() {
        let dir = TempDir::new().unwrap();
        let ids = allocator(&dir);

        assert_eq!(ids.next_id().unwrap(), 0);
        assert_eq!(ids.next_id().unwrap(), 1);
        assert_eq!(ids.next_id().unwrap(), 2);
    }

    #[test]
    fn test_counter_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let ids = allocator(&dir);
            ids.next_id().unwrap();
            ids.next_id().unwrap();
        }

        let store = Arc::new(RecordStore::open(dir.path(), "forum.example.com").unwrap());
        let ids = IdAllocator::new(store);
        assert_eq!(ids.next_id().unwrap(), 2);
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RecordStore::open(dir.path(), "forum.example.com").unwrap());
        let ids = IdAllocator::new(store);

        assert!(matches!(ids.next_id(), Err(StoreError::Missing(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_allocation_no_duplicates_no_gaps() {
        let dir = TempDir::new().unwrap();
        let ids = allocator(&dir);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let ids = Arc::clone(&ids);
            handles.push(tokio::task::spawn_blocking(move || ids.next_id().unwrap()));
        }

        let mut seen = BTreeSet::new();
        for handle in handles {
            seen.insert(handle.await.unwrap());
        }

        let expected: BTreeSet<u64> = (0..50).collect();
        assert_eq!(seen, expected);

        let store = RecordStore::open(dir.path(), "forum.example.com").unwrap();
        assert_eq!(store.load_domain_config().unwrap().unwrap().last_id, 50);
    }
}
