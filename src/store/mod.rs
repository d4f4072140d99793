//! Persistent record store
//!
//! All miner state lives in per-domain JSON files under the configured data
//! directory:
//!
//! ```text
//! <data-dir>/<domain>/
//!   config.json                                          domain config + id counter
//!   categories.json                                      category tree
//!   categories_threads/category_{C}_subcategory_{S}.json  per-subcategory thread index
//!   threads/{id}.json                                    per-thread message log
//!   cache_html/                                          optional raw page cache
//! ```
//!
//! Every record is read and replaced as a whole document; writes go through
//! a temp file followed by a rename so an interrupted run never leaves a
//! half-written record behind.

mod ids;
mod records;

pub use ids::IdAllocator;
pub use records::{
    earliest_timestamp, Category, DetailStatus, DomainConfig, IndexStatus, Message, SubCategory,
    SubcategoryIndex, ThreadDetail, ThreadSummary,
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt record {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Missing record: {0}")]
    Missing(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Whole-file JSON record store for one mined domain
#[derive(Debug)]
pub struct RecordStore {
    root: PathBuf,
    categories_dir: PathBuf,
    threads_dir: PathBuf,
    cache_dir: PathBuf,
}

impl RecordStore {
    /// Opens (creating if needed) the store for one domain
    pub fn open(data_dir: &Path, domain: &str) -> StoreResult<Self> {
        let root = data_dir.join(domain);
        let categories_dir = root.join("categories_threads");
        let threads_dir = root.join("threads");
        let cache_dir = root.join("cache_html");

        fs::create_dir_all(&categories_dir)?;
        fs::create_dir_all(&threads_dir)?;

        tracing::debug!("Record store opened at {}", root.display());

        Ok(Self {
            root,
            categories_dir,
            threads_dir,
            cache_dir,
        })
    }

    /// Directory for raw page cache files; created lazily by the fetcher
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    fn categories_path(&self) -> PathBuf {
        self.root.join("categories.json")
    }

    fn index_path(&self, category_id: u64, subcategory_id: u64) -> PathBuf {
        self.categories_dir.join(format!(
            "category_{}_subcategory_{}.json",
            category_id, subcategory_id
        ))
    }

    fn thread_path(&self, thread_id: u64) -> PathBuf {
        self.threads_dir.join(format!("{}.json", thread_id))
    }

    // ===== Domain config =====

    /// Loads the domain config, or None if this domain was never mined
    pub fn load_domain_config(&self) -> StoreResult<Option<DomainConfig>> {
        self.read_optional(&self.config_path())
    }

    /// Writes the domain config record
    pub fn write_domain_config(&self, config: &DomainConfig) -> StoreResult<()> {
        self.write_json(&self.config_path(), config)
    }

    // ===== Category tree =====

    pub fn load_categories(&self) -> StoreResult<Option<Vec<Category>>> {
        self.read_optional(&self.categories_path())
    }

    pub fn write_categories(&self, categories: &[Category]) -> StoreResult<()> {
        self.write_json(&self.categories_path(), &categories)
    }

    // ===== Subcategory thread indexes =====

    pub fn load_index(
        &self,
        category_id: u64,
        subcategory_id: u64,
    ) -> StoreResult<Option<SubcategoryIndex>> {
        self.read_optional(&self.index_path(category_id, subcategory_id))
    }

    pub fn write_index(&self, index: &SubcategoryIndex) -> StoreResult<()> {
        self.write_json(&self.index_path(index.category_id, index.subcategory_id), index)
    }

    /// Loads every persisted subcategory index, in directory order
    pub fn load_all_indexes(&self) -> StoreResult<Vec<SubcategoryIndex>> {
        let mut indexes = Vec::new();
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.categories_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();
        paths.sort();

        for path in paths {
            indexes.push(self.read_json(&path)?);
        }
        Ok(indexes)
    }

    // ===== Thread details =====

    pub fn load_thread_detail(&self, thread_id: u64) -> StoreResult<Option<ThreadDetail>> {
        self.read_optional(&self.thread_path(thread_id))
    }

    pub fn write_thread_detail(&self, detail: &ThreadDetail) -> StoreResult<()> {
        self.write_json(&self.thread_path(detail.id), detail)
    }

    // ===== Whole-file JSON primitives =====

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> StoreResult<T> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn read_optional<T: DeserializeOwned>(&self, path: &Path) -> StoreResult<Option<T>> {
        if !path.is_file() {
            return Ok(None);
        }
        self.read_json(path).map(Some)
    }

    /// Atomic whole-document replace: write a sibling temp file, then rename
    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> RecordStore {
        RecordStore::open(dir.path(), "forum.example.com").unwrap()
    }

    #[test]
    fn test_open_creates_layout() {
        let dir = TempDir::new().unwrap();
        open_store(&dir);

        let root = dir.path().join("forum.example.com");
        assert!(root.join("categories_threads").is_dir());
        assert!(root.join("threads").is_dir());
    }

    #[test]
    fn test_domain_config_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert!(store.load_domain_config().unwrap().is_none());

        let config = DomainConfig {
            domain: "forum.example.com".to_string(),
            url: "https://forum.example.com".to_string(),
            last_id: 0,
        };
        store.write_domain_config(&config).unwrap();

        let loaded = store.load_domain_config().unwrap().unwrap();
        assert_eq!(loaded.domain, "forum.example.com");
        assert_eq!(loaded.last_id, 0);
    }

    #[test]
    fn test_corrupt_config_reported() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        std::fs::write(
            dir.path().join("forum.example.com").join("config.json"),
            "{ not json",
        )
        .unwrap();

        let err = store.load_domain_config().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_load_all_indexes() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store
            .write_index(&SubcategoryIndex::new("a".to_string(), 0, 1))
            .unwrap();
        store
            .write_index(&SubcategoryIndex::new("b".to_string(), 0, 2))
            .unwrap();

        let indexes = store.load_all_indexes().unwrap();
        assert_eq!(indexes.len(), 2);
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store
            .write_index(&SubcategoryIndex::new("a".to_string(), 3, 4))
            .unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(
            dir.path()
                .join("forum.example.com")
                .join("categories_threads"),
        )
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
        .collect();
        assert!(leftovers.is_empty());
    }
}
