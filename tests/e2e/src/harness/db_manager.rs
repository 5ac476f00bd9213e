//! Test Database Manager
//!
//! Provides isolated store instances for testing:
//! - Temporary databases that are automatically cleaned up
//! - Stores pinned to a specific schema version
//! - Reopening the same file to observe reconnect behavior

use dorudon_core::{DictStore, IngestSummary, PopulationState, StoreConfig};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Manager for test databases
///
/// Creates isolated store instances for each test to prevent interference.
/// Automatically cleans up temporary databases when dropped.
///
/// # Example
///
/// ```rust,ignore
/// let db = TestDatabaseManager::new_temp();
///
/// db.store.init().await?;
/// db.populate("U+4E00\tkCangjie\tM\n").await?;
///
/// // Database is automatically deleted when `db` goes out of scope
/// ```
pub struct TestDatabaseManager {
    /// The store instance
    pub store: DictStore,
    /// Temporary directory (kept alive to prevent premature deletion)
    _temp_dir: Option<TempDir>,
    /// Path to the database file
    db_path: PathBuf,
}

impl TestDatabaseManager {
    /// Create a new test database in a temporary directory
    ///
    /// The database is automatically deleted when the manager is dropped.
    pub fn new_temp() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test_dorudon.db");

        let store = DictStore::new(Some(db_path.clone())).expect("Failed to create test store");

        Self {
            store,
            _temp_dir: Some(temp_dir),
            db_path,
        }
    }

    /// Create a test database at a specific path
    ///
    /// The database is NOT automatically deleted.
    pub fn new_at_path(path: PathBuf) -> Self {
        let store = DictStore::new(Some(path.clone())).expect("Failed to create test store");

        Self {
            store,
            _temp_dir: None,
            db_path: path,
        }
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Directory holding the database, for sibling fixture files
    pub fn dir(&self) -> &Path {
        self.db_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// A second, independent handle on the same database file
    pub fn sibling_store(&self) -> DictStore {
        DictStore::with_config(StoreConfig::new(&self.db_path))
    }

    /// A handle on the same file that demands `version` on open
    pub fn store_at_version(&self, version: u32) -> DictStore {
        DictStore::with_config(StoreConfig::new(&self.db_path).with_target_version(version))
    }

    /// Close and reinitialize, as a process restart would
    pub async fn restart(&self) -> PopulationState {
        self.store.close();
        self.store.init().await.expect("Failed to reinitialize store")
    }

    /// Populate from source text, panicking on failure
    pub async fn populate(&self, text: &str) -> IngestSummary {
        self.store
            .populate_from_text(text, None)
            .await
            .expect("Failed to populate test store")
    }

    /// Number of stored entries
    pub async fn entry_count(&self) -> u64 {
        self.store.entry_count().await.unwrap_or(0)
    }

    /// Check if the database is empty
    pub async fn is_empty(&self) -> bool {
        self.entry_count().await == 0
    }

    /// Write `contents` next to the database and return its path
    pub fn write_fixture(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir().join(name);
        std::fs::write(&path, contents).expect("Failed to write fixture");
        path
    }
}
