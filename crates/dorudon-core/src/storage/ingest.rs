//! Bulk Ingest
//!
//! One-shot population of the dict record set from dictionary source text:
//!
//! 1. Guard: refuse if the store already holds entries
//! 2. Decode the source text
//! 3. Parse and resolve every line (first bad line aborts everything)
//! 4. Write all entries in one read-write transaction, reporting progress
//!
//! Population is all-or-nothing. Callers must not run two populations of the
//! same store concurrently; the guard is a check, not a lock.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use super::sqlite::{
    init_on, run_on, DictStore, PopulationState, StoreConnection, TransactionMode, STORE_NAME_DICT,
};
use crate::decode::{decode_bytes_as_text, decode_file_as_text, DICTIONARY_ENCODING};
use crate::dict::parse_text;
use crate::error::{DictError, Result};

/// Progress message, sent only when `percent` changes
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestProgress {
    /// `floor(index * 100 / total)` for the 0-based index of the last acknowledged write
    pub percent: u8,
    /// Entries written so far
    pub written: usize,
    /// Entries to write
    pub total: usize,
    pub timestamp: DateTime<Utc>,
}

/// Sender half for progress messages; subscribe before starting the ingest
pub type ProgressSender = broadcast::Sender<IngestProgress>;

/// Channel sized for every distinct percentage
pub fn progress_channel() -> (ProgressSender, broadcast::Receiver<IngestProgress>) {
    broadcast::channel(128)
}

/// Outcome of a successful population
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    /// Entries committed
    pub entries: usize,
    pub duration_ms: u64,
}

struct ProgressReporter {
    total: usize,
    last: Option<u8>,
    sender: Option<ProgressSender>,
    delivery_failed: bool,
}

impl ProgressReporter {
    fn new(total: usize, sender: Option<ProgressSender>) -> Self {
        Self {
            total,
            last: None,
            sender,
            delivery_failed: false,
        }
    }

    /// Called after the write at `index` (0-based) is acknowledged.
    fn acknowledge(&mut self, index: usize) {
        let percent = percent_of(index, self.total);
        if self.last == Some(percent) {
            return;
        }
        self.last = Some(percent);

        let Some(sender) = &self.sender else {
            return;
        };
        let message = IngestProgress {
            percent,
            written: index + 1,
            total: self.total,
            timestamp: Utc::now(),
        };
        // Observers never abort the ingest
        if sender.send(message).is_err() && !self.delivery_failed {
            self.delivery_failed = true;
            tracing::warn!("No progress receiver listening; further progress is dropped");
        }
    }
}

fn percent_of(index: usize, total: usize) -> u8 {
    let total = total.max(1) as u64;
    let percent = (index as u64).saturating_mul(100) / total;
    u8::try_from(percent.min(99)).unwrap_or(99)
}

impl DictStore {
    /// Populate an empty store from raw dictionary bytes in `encoding`.
    pub async fn populate_from_bytes(
        &self,
        raw: &[u8],
        encoding: &str,
        progress: Option<ProgressSender>,
    ) -> Result<IngestSummary> {
        let conn = self.guard_unpopulated().await?;
        let text = decode_bytes_as_text(raw, encoding)?;
        ingest_text(conn, &text, progress).await
    }

    /// Populate an empty store from already decoded text.
    pub async fn populate_from_text(
        &self,
        text: &str,
        progress: Option<ProgressSender>,
    ) -> Result<IngestSummary> {
        let conn = self.guard_unpopulated().await?;
        ingest_text(conn, text, progress).await
    }

    /// Populate an empty store from a dictionary file on disk.
    pub async fn load_from_file(
        &self,
        path: &Path,
        progress: Option<ProgressSender>,
    ) -> Result<IngestSummary> {
        let conn = self.guard_unpopulated().await?;
        let text = decode_file_as_text(path, DICTIONARY_ENCODING).await?;
        ingest_text(conn, &text, progress).await
    }

    async fn guard_unpopulated(&self) -> Result<Arc<StoreConnection>> {
        let conn = self.ensure_connection().await?;
        let state = match conn.population_state() {
            PopulationState::Unknown => init_on(Arc::clone(&conn)).await?,
            known => known,
        };
        if state == PopulationState::Populated {
            return Err(DictError::AlreadyPopulated);
        }
        Ok(conn)
    }
}

async fn ingest_text(
    conn: Arc<StoreConnection>,
    text: &str,
    progress: Option<ProgressSender>,
) -> Result<IngestSummary> {
    let start = Instant::now();
    let entries = parse_text(text)?;
    let total = entries.len();

    if total == 0 {
        tracing::info!("Dictionary source holds no entries; nothing to write");
        return Ok(IngestSummary {
            entries: 0,
            duration_ms: 0,
        });
    }

    tracing::info!(entries = total, "Populating dictionary");

    let written = run_on(
        Arc::clone(&conn),
        &[STORE_NAME_DICT],
        TransactionMode::ReadWrite,
        move |scope| {
            let dict = scope.record_set(STORE_NAME_DICT)?;
            let mut reporter = ProgressReporter::new(total, progress);
            for (index, entry) in entries.iter().enumerate() {
                dict.add(entry)?;
                reporter.acknowledge(index);
            }
            Ok(entries.len())
        },
    )
    .await?;

    // After a concurrent close() this lands on the discarded connection; the
    // next guard runs on a fresh one and recounts
    conn.set_population_state(PopulationState::Populated);

    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!(entries = written, duration_ms, "Dictionary populated");
    Ok(IngestSummary {
        entries: written,
        duration_ms,
    })
}
