//! Storage Module
//!
//! SQLite-based dictionary store with:
//! - Versioned schema migrations (one registered step per version)
//! - A lazily opened, shared connection with transactional access
//! - Typed access to the `dict` record set and its index views
//! - One-shot bulk ingest with progress reporting

mod ingest;
mod migrations;
mod sqlite;

pub use ingest::{progress_channel, IngestProgress, IngestSummary, ProgressSender};
pub use migrations::{apply_migrations, get_current_version, Migration, MIGRATIONS, SCHEMA_VERSION};
pub use sqlite::{
    ConnectionPhase, DictRecordSet, DictStore, IndexView, PopulationState, StoreConfig,
    StoreConnection, TransactionMode, TransactionScope, STORE_NAME_DICT,
};
