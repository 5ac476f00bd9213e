//! # Dorudon Core
//!
//! Embedded record store for a character / input-method dictionary.
//!
//! - **Schema migrations**: ordered per-version upgrade steps; downgrades abort
//! - **Store access layer**: one lazily opened SQLite connection, every read
//!   and write wrapped in a transaction, failures reported by name
//! - **Dictionary store**: the `dict` record set keyed by `(code, im)` with
//!   `code`, `im-code` and `code-im` lookup orders
//! - **Ingest**: strict line parser and all-or-nothing bulk population with
//!   coarse progress messages
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use dorudon_core::{progress_channel, DictStore, InputMethod, PopulationState};
//!
//! # async fn run() -> dorudon_core::Result<()> {
//! // Uses the platform data directory; nothing is opened yet
//! let store = DictStore::new(None)?;
//! if store.init().await? != PopulationState::Populated {
//!     let (tx, mut rx) = progress_channel();
//!     tokio::spawn(async move {
//!         while let Ok(p) = rx.recv().await {
//!             println!("{}%", p.percent);
//!         }
//!     });
//!     store
//!         .load_from_file(Path::new("Unihan_DictionaryLikeData.txt"), Some(tx))
//!         .await?;
//! }
//!
//! let _entry = store.lookup(0x4E00, InputMethod::Cangjie).await?;
//! # Ok(())
//! # }
//! ```

pub mod decode;
pub mod dict;
pub mod error;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use decode::{decode_bytes_as_text, decode_file_as_text, DICTIONARY_ENCODING};
pub use dict::{format_line, parse_line, parse_text, DictionaryEntry, InputMethod};
pub use error::{host_error_name, DictError, Result, UNKNOWN_ERROR};
pub use storage::{
    progress_channel, ConnectionPhase, DictRecordSet, DictStore, IndexView, IngestProgress,
    IngestSummary, PopulationState, ProgressSender, StoreConfig, StoreConnection,
    TransactionMode, TransactionScope, SCHEMA_VERSION, STORE_NAME_DICT,
};
