//! Bootstrap journey
//!
//! Opening a store for the first time, migrating it, reconnecting and
//! checking whether it still needs populating.

use std::sync::Arc;

use dorudon_core::{ConnectionPhase, DictStore, PopulationState, SCHEMA_VERSION, StoreConfig};
use dorudon_e2e_tests::harness::TestDatabaseManager;
use dorudon_e2e_tests::mocks::fixtures::{TestDataFactory, UNIHAN_EXCERPT};

// ============================================================================
// FIRST OPEN
// ============================================================================

#[tokio::test]
async fn test_fresh_store_is_created_lazily_and_migrated() {
    let db = TestDatabaseManager::new_temp();

    assert_eq!(db.store.connection_phase(), ConnectionPhase::Closed);
    assert_eq!(db.store.population_state(), PopulationState::Unknown);
    assert!(!db.path().exists(), "nothing is opened before first use");

    let state = db.store.init().await.unwrap();

    assert_eq!(state, PopulationState::Empty);
    assert_eq!(db.store.connection_phase(), ConnectionPhase::Open);
    assert!(db.path().exists());
    assert_eq!(db.store.schema_version().await.unwrap(), SCHEMA_VERSION);
    assert!(db.is_empty().await);
    assert!(!db.store.is_populated());
}

#[tokio::test]
async fn test_reopen_at_current_version_runs_no_migration() {
    let db = TestDatabaseManager::new_temp();
    db.store.init().await.unwrap();
    db.populate(UNIHAN_EXCERPT).await;
    db.store.close();

    // Data written before the reopen survives it untouched
    let sibling = db.sibling_store();
    assert_eq!(sibling.init().await.unwrap(), PopulationState::Populated);
    assert_eq!(sibling.schema_version().await.unwrap(), SCHEMA_VERSION);
    assert_eq!(
        sibling.entry_count().await.unwrap(),
        TestDataFactory::EXCERPT_ENTRIES as u64
    );
}

#[tokio::test]
async fn test_missing_parent_directories_are_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile").join("dicts").join("dorudon.db");
    let db = TestDatabaseManager::new_at_path(path.clone());

    assert_eq!(db.store.init().await.unwrap(), PopulationState::Empty);
    assert!(path.exists());
    db.populate(UNIHAN_EXCERPT).await;
    db.store.close();
    drop(db);

    // Stores at an explicit path are left on disk
    let reopened = TestDatabaseManager::new_at_path(path);
    assert_eq!(reopened.store.init().await.unwrap(), PopulationState::Populated);
}

// ============================================================================
// VERSION MISMATCH
// ============================================================================

#[tokio::test]
async fn test_downgrade_request_aborts_open() {
    let db = TestDatabaseManager::new_temp();
    db.store.init().await.unwrap();
    db.store.close();

    let older = db.store_at_version(0);
    let err = older.init().await.unwrap_err();

    assert_eq!(err.name(), "MigrationAbortedError");
    assert_eq!(older.connection_phase(), ConnectionPhase::Closed);

    // The stored schema is left as it was
    assert_eq!(db.store.schema_version().await.unwrap(), SCHEMA_VERSION);
}

#[tokio::test]
async fn test_unregistered_upgrade_rolls_back_every_step() {
    let db = TestDatabaseManager::new_temp();

    let ahead = db.store_at_version(SCHEMA_VERSION + 1);
    let err = ahead.init().await.unwrap_err();
    assert_eq!(err.name(), "MigrationAbortedError");

    // The v0 -> v1 step ran in the same transaction and was undone with it
    let fresh = DictStore::with_config(StoreConfig::new(db.path()).with_target_version(0));
    assert_eq!(fresh.schema_version().await.unwrap(), 0);

    assert_eq!(db.store.init().await.unwrap(), PopulationState::Empty);
    assert_eq!(db.store.schema_version().await.unwrap(), SCHEMA_VERSION);
}

// ============================================================================
// RECONNECT
// ============================================================================

#[tokio::test]
async fn test_close_forgets_population_until_init() {
    let db = TestDatabaseManager::new_temp();
    db.store.init().await.unwrap();
    db.populate(UNIHAN_EXCERPT).await;
    assert!(db.store.is_populated());

    db.store.close();
    assert_eq!(db.store.connection_phase(), ConnectionPhase::Closed);
    assert_eq!(db.store.population_state(), PopulationState::Unknown);

    // Queries reopen lazily but do not recount
    assert!(db.store.entry_count().await.unwrap() > 0);
    assert_eq!(db.store.connection_phase(), ConnectionPhase::Open);
    assert_eq!(db.store.population_state(), PopulationState::Unknown);

    assert_eq!(db.restart().await, PopulationState::Populated);
    assert!(db.store.is_populated());
}

#[tokio::test]
async fn test_concurrent_first_use_shares_one_connection() {
    let db = TestDatabaseManager::new_temp();
    let store = Arc::new(db.sibling_store());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.ensure_connection().await })
        })
        .collect();

    let mut connections = Vec::new();
    for handle in handles {
        connections.push(handle.await.unwrap().unwrap());
    }

    let first = &connections[0];
    assert!(connections.iter().all(|c| Arc::ptr_eq(c, first)));
    assert_eq!(store.connection_phase(), ConnectionPhase::Open);
}

#[tokio::test]
async fn test_concurrent_failed_open_reports_one_failure() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file in the way").unwrap();
    let store = Arc::new(DictStore::new(Some(blocker.join("dorudon.db"))).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.init().await })
        })
        .collect();

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.name(), "NotReadableError");
    }
    assert_eq!(store.connection_phase(), ConnectionPhase::Closed);
}

// ============================================================================
// ISOLATION
// ============================================================================

#[tokio::test]
async fn test_independent_stores_do_not_share_state() {
    let populated = TestDatabaseManager::new_temp();
    let empty = TestDatabaseManager::new_temp();

    populated.store.init().await.unwrap();
    populated.populate(UNIHAN_EXCERPT).await;

    assert_eq!(empty.store.init().await.unwrap(), PopulationState::Empty);
    assert!(populated.store.is_populated());
    assert!(!empty.store.is_populated());
}
