//! SQLite Storage Implementation
//!
//! Store access layer over a single lazily opened connection, plus the typed
//! handle for the `dict` record set.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use directories::ProjectDirs;
use futures::future::{BoxFuture, FutureExt, Shared};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};

use super::migrations::{self, SCHEMA_VERSION};
use crate::dict::{DictionaryEntry, InputMethod};
use crate::error::{DictError, Result, UNKNOWN_ERROR};

/// Name of the dictionary record set
pub const STORE_NAME_DICT: &str = "dict";

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Where the store lives and which schema version it must be at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file
    pub path: PathBuf,
    /// Schema version to migrate to on open
    pub target_version: u32,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            target_version: SCHEMA_VERSION,
        }
    }

    /// Platform data directory, e.g. `~/.local/share/dorudon/dorudon.db`
    pub fn default_location() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("org", "dorudon", "dorudon").ok_or_else(|| {
            DictError::Connection {
                name: UNKNOWN_ERROR.to_string(),
                message: "Could not determine project directories".to_string(),
            }
        })?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir).map_err(|e| DictError::Connection {
            name: "NotReadableError".to_string(),
            message: format!("cannot create {}: {}", data_dir.display(), e),
        })?;
        // Restrict directory permissions to owner-only on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            let _ = std::fs::set_permissions(data_dir, perms);
        }
        Ok(Self::new(data_dir.join("dorudon.db")))
    }

    pub fn with_target_version(mut self, version: u32) -> Self {
        self.target_version = version;
        self
    }
}

// ============================================================================
// PUBLIC TYPES
// ============================================================================

/// Transaction access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

/// Lookup orders over the dict record set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexView {
    /// Non-unique, by `code`: which input methods cover a code
    #[serde(rename = "code")]
    Code,
    /// Unique `(im, code)`: every code completed for an input method
    #[serde(rename = "im-code")]
    ImCode,
    /// Unique `(code, im)`: the value for one pair
    #[serde(rename = "code-im")]
    CodeIm,
}

impl IndexView {
    pub const ALL: [IndexView; 3] = [IndexView::Code, IndexView::ImCode, IndexView::CodeIm];

    pub fn name(self) -> &'static str {
        match self {
            IndexView::Code => "code",
            IndexView::ImCode => "im-code",
            IndexView::CodeIm => "code-im",
        }
    }

    pub fn is_unique(self) -> bool {
        !matches!(self, IndexView::Code)
    }

    fn order_by(self) -> &'static str {
        match self {
            IndexView::Code | IndexView::CodeIm => "code, im",
            IndexView::ImCode => "im, code",
        }
    }
}

impl std::fmt::Display for IndexView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for IndexView {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|view| view.name() == s)
            .ok_or_else(|| format!("Unknown index view: {}", s))
    }
}

/// Whether the dict record set holds any entry.
///
/// Counted once per connection by [`DictStore::init`]; `Unknown` before that
/// and after [`DictStore::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopulationState {
    Unknown,
    Empty,
    Populated,
}

/// Observable lifecycle of the store's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Closed,
    Opening,
    /// Opening, with schema upgrade steps running
    Migrating,
    Open,
}

// ============================================================================
// CONNECTION
// ============================================================================

/// An open, migrated connection to the backing store
pub struct StoreConnection {
    conn: Mutex<Connection>,
    population: Mutex<PopulationState>,
    path: PathBuf,
}

impl std::fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConnection")
            .field("path", &self.path)
            .field("population", &self.population_state())
            .finish()
    }
}

impl StoreConnection {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn population_state(&self) -> PopulationState {
        match self.population.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn set_population_state(&self, state: PopulationState) {
        match self.population.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DictError::cancelled("Connection lock poisoned"))
    }

    /// Run `body` inside one SQLite transaction; commit on `Ok`, roll back on `Err`.
    fn transact<T, F>(&self, record_sets: &[String], mode: TransactionMode, body: F) -> Result<T>
    where
        F: FnOnce(&TransactionScope<'_>) -> Result<T>,
    {
        if record_sets.is_empty() {
            return Err(DictError::named_abort(
                "InvalidAccessError",
                "a transaction must name at least one record set",
            ));
        }

        let mut conn = self.lock()?;
        let behavior = match mode {
            TransactionMode::ReadOnly => TransactionBehavior::Deferred,
            TransactionMode::ReadWrite => TransactionBehavior::Immediate,
        };
        let tx = conn.transaction_with_behavior(behavior)?;

        for name in record_sets {
            if !record_set_exists(&tx, name)? {
                return Err(DictError::named_abort(
                    "NotFoundError",
                    format!("record set '{}' does not exist", name),
                ));
            }
        }

        let outcome = {
            let scope = TransactionScope {
                conn: &tx,
                mode,
                record_sets,
            };
            body(&scope)
        };

        match outcome {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(error = %e, ?record_sets, "Transaction aborted, rolling back");
                // Dropping the transaction rolls it back
                drop(tx);
                Err(e)
            }
        }
    }
}

fn record_set_exists(conn: &Connection, name: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![name],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Handles available to a transaction body
pub struct TransactionScope<'a> {
    conn: &'a Connection,
    mode: TransactionMode,
    record_sets: &'a [String],
}

impl<'a> TransactionScope<'a> {
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Handle to one of the record sets this transaction was opened over.
    pub fn record_set(&self, name: &str) -> Result<DictRecordSet<'a>> {
        if !self.record_sets.iter().any(|n| n == name) {
            return Err(DictError::named_abort(
                "NotFoundError",
                format!("record set '{}' is not in this transaction's scope", name),
            ));
        }
        if name != STORE_NAME_DICT {
            return Err(DictError::named_abort(
                "NotFoundError",
                format!("no typed handle for record set '{}'", name),
            ));
        }
        Ok(DictRecordSet {
            conn: self.conn,
            mode: self.mode,
        })
    }

    /// Error to return from the body to cancel the transaction.
    pub fn abort(&self) -> DictError {
        DictError::cancelled("transaction cancelled by caller")
    }
}

/// Typed access to the `dict` record set within one transaction
pub struct DictRecordSet<'a> {
    conn: &'a Connection,
    mode: TransactionMode,
}

impl DictRecordSet<'_> {
    /// Insert one entry; a duplicate `(code, im)` fails with `ConstraintError`.
    pub fn add(&self, entry: &DictionaryEntry) -> Result<()> {
        if self.mode == TransactionMode::ReadOnly {
            return Err(DictError::named_abort(
                "ReadOnlyError",
                "cannot write in a read-only transaction",
            ));
        }
        let value = serde_json::to_string(&entry.value)
            .map_err(|e| DictError::named_abort("DataError", format!("unserializable value: {}", e)))?;

        self.conn
            .prepare_cached("INSERT INTO dict (code, im, value) VALUES (?1, ?2, ?3)")?
            .execute(params![entry.code, entry.im.id(), value])?;
        Ok(())
    }

    /// `code-im` lookup
    pub fn get(&self, code: u32, im: InputMethod) -> Result<Option<DictionaryEntry>> {
        let raw = self
            .conn
            .prepare_cached("SELECT code, im, value FROM dict WHERE code = ?1 AND im = ?2")?
            .query_row(params![code, im.id()], raw_row)
            .optional()?;
        raw.map(entry_from_raw).transpose()
    }

    /// `code` lookup, ordered by input method
    pub fn get_all_by_code(&self, code: u32) -> Result<Vec<DictionaryEntry>> {
        self.collect(
            "SELECT code, im, value FROM dict WHERE code = ?1 ORDER BY im",
            params![code],
        )
    }

    /// `im-code` lookup, ordered by code
    pub fn get_all_by_im(&self, im: InputMethod) -> Result<Vec<DictionaryEntry>> {
        self.collect(
            "SELECT code, im, value FROM dict INDEXED BY idx_dict_im_code WHERE im = ?1 ORDER BY code",
            params![im.id()],
        )
    }

    /// Every entry, in the order of `view`
    pub fn entries(&self, view: IndexView) -> Result<Vec<DictionaryEntry>> {
        let sql = format!("SELECT code, im, value FROM dict ORDER BY {}", view.order_by());
        self.collect(&sql, params![])
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM dict", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn collect(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<DictionaryEntry>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, raw_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(entry_from_raw(row?)?);
        }
        Ok(entries)
    }
}

type RawEntry = (i64, i64, String);

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn entry_from_raw((code, im, value): RawEntry) -> Result<DictionaryEntry> {
    let code = u32::try_from(code)
        .map_err(|_| DictError::named_abort("DataError", format!("stored code out of range: {}", code)))?;
    let im = u8::try_from(im)
        .ok()
        .and_then(InputMethod::from_id)
        .ok_or_else(|| DictError::named_abort("DataError", format!("stored input method out of range: {}", im)))?;
    let value = serde_json::from_str(&value)
        .map_err(|e| DictError::named_abort("DataError", format!("stored value is not JSON: {}", e)))?;
    Ok(DictionaryEntry { code, im, value })
}

// ============================================================================
// STORE
// ============================================================================

type PendingOpen = Shared<BoxFuture<'static, Result<Arc<StoreConnection>>>>;

enum ConnState {
    Closed,
    Opening {
        attempt: u64,
        pending: PendingOpen,
        migrating: Arc<AtomicBool>,
    },
    Open(Arc<StoreConnection>),
}

/// Handle to one dictionary store.
///
/// Owns the lazily opened connection and the cached population state, so
/// several isolated stores can live in one process. All methods take `&self`;
/// share it behind an `Arc`.
pub struct DictStore {
    config: StoreConfig,
    state: Mutex<ConnState>,
    attempts: AtomicU64,
}

impl DictStore {
    /// Create a store handle. Nothing is opened until first use.
    ///
    /// `None` selects the platform data directory.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let config = match db_path {
            Some(path) => StoreConfig::new(path),
            None => StoreConfig::default_location()?,
        };
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ConnState::Closed),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn lock_state(&self) -> MutexGuard<'_, ConnState> {
        // The state is a plain enum; a panic elsewhere cannot leave it half-written
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn connection_phase(&self) -> ConnectionPhase {
        match &*self.lock_state() {
            ConnState::Closed => ConnectionPhase::Closed,
            ConnState::Opening { migrating, .. } if migrating.load(Ordering::Acquire) => {
                ConnectionPhase::Migrating
            }
            ConnState::Opening { .. } => ConnectionPhase::Opening,
            ConnState::Open(_) => ConnectionPhase::Open,
        }
    }

    /// Return the open connection, opening (and migrating) it if needed.
    ///
    /// Concurrent callers share one in-flight open and all observe its outcome.
    pub async fn ensure_connection(&self) -> Result<Arc<StoreConnection>> {
        let (attempt, pending) = {
            let mut state = self.lock_state();
            if let ConnState::Open(conn) = &*state {
                return Ok(Arc::clone(conn));
            }
            let in_flight = match &*state {
                ConnState::Opening { attempt, pending, .. } => Some((*attempt, pending.clone())),
                _ => None,
            };
            match in_flight {
                Some(in_flight) => in_flight,
                None => {
                    let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
                    let migrating = Arc::new(AtomicBool::new(false));
                    let pending = open_connection(self.config.clone(), Arc::clone(&migrating))
                        .boxed()
                        .shared();
                    *state = ConnState::Opening {
                        attempt,
                        pending: pending.clone(),
                        migrating,
                    };
                    (attempt, pending)
                }
            }
        };

        let result = pending.await;

        let mut state = self.lock_state();
        let still_current = matches!(&*state, ConnState::Opening { attempt: a, .. } if *a == attempt);
        if still_current {
            *state = match &result {
                Ok(conn) => ConnState::Open(Arc::clone(conn)),
                Err(_) => ConnState::Closed,
            };
        }
        result
    }

    /// Release the cached connection. The next call reopens from scratch and
    /// the population state reads `Unknown` until [`DictStore::init`] runs again.
    pub fn close(&self) {
        let mut state = self.lock_state();
        if !matches!(&*state, ConnState::Closed) {
            tracing::info!(path = %self.config.path.display(), "Closing dictionary store");
        }
        *state = ConnState::Closed;
    }

    /// Run `body` in one transaction over `record_sets`.
    ///
    /// `body` runs synchronously on the blocking pool and only issues reads and
    /// writes; the future resolves once the transaction commits, or with the
    /// abort's named error.
    pub async fn run_transaction<T, F>(
        &self,
        record_sets: &[&str],
        mode: TransactionMode,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(&TransactionScope<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.ensure_connection().await?;
        run_on(conn, record_sets, mode, body).await
    }

    // ========================================================================
    // BOOTSTRAP
    // ========================================================================

    /// Open the store and count its entries once.
    pub async fn init(&self) -> Result<PopulationState> {
        let conn = self.ensure_connection().await?;
        init_on(conn).await
    }

    pub fn population_state(&self) -> PopulationState {
        match &*self.lock_state() {
            ConnState::Open(conn) => conn.population_state(),
            _ => PopulationState::Unknown,
        }
    }

    pub fn is_populated(&self) -> bool {
        self.population_state() == PopulationState::Populated
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Value of `code` for `im`
    pub async fn lookup(&self, code: u32, im: InputMethod) -> Result<Option<DictionaryEntry>> {
        self.read(move |dict| dict.get(code, im)).await
    }

    /// Every entry recorded for `code`
    pub async fn entries_for_code(&self, code: u32) -> Result<Vec<DictionaryEntry>> {
        self.read(move |dict| dict.get_all_by_code(code)).await
    }

    /// Input methods with an entry for `code`
    pub async fn input_methods_for(&self, code: u32) -> Result<Vec<InputMethod>> {
        let entries = self.entries_for_code(code).await?;
        Ok(entries.into_iter().map(|e| e.im).collect())
    }

    /// Codes completed for `im`, ascending
    pub async fn codes_for(&self, im: InputMethod) -> Result<Vec<u32>> {
        let entries = self.read(move |dict| dict.get_all_by_im(im)).await?;
        Ok(entries.into_iter().map(|e| e.code).collect())
    }

    pub async fn entries(&self, view: IndexView) -> Result<Vec<DictionaryEntry>> {
        self.read(move |dict| dict.entries(view)).await
    }

    pub async fn entry_count(&self) -> Result<u64> {
        self.read(|dict| dict.count()).await
    }

    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&DictRecordSet<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run_transaction(&[STORE_NAME_DICT], TransactionMode::ReadOnly, move |scope| {
            f(&scope.record_set(STORE_NAME_DICT)?)
        })
        .await
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Schema version recorded in the store
    pub async fn schema_version(&self) -> Result<u32> {
        let conn = self.ensure_connection().await?;
        run_blocking(move || {
            let guard = conn.lock()?;
            Ok(migrations::get_current_version(&guard)?)
        })
        .await
    }

    /// Write a consistent snapshot of the store to `path`
    pub async fn backup_to(&self, path: &Path) -> Result<()> {
        let path_str = path
            .to_str()
            .ok_or_else(|| DictError::named_abort("DataError", "Invalid backup path encoding"))?
            .to_string();
        // Validate path: reject control characters (except tab)
        if path_str.bytes().any(|b| b < 0x20 && b != b'\t') {
            return Err(DictError::named_abort(
                "DataError",
                "Backup path contains invalid characters",
            ));
        }
        let conn = self.ensure_connection().await?;
        run_blocking(move || {
            let guard = conn.lock()?;
            // VACUUM INTO doesn't support parameterized queries; escape single quotes
            guard.execute_batch(&format!("VACUUM INTO '{}'", path_str.replace('\'', "''")))?;
            Ok(())
        })
        .await
    }
}

pub(crate) async fn run_on<T, F>(
    conn: Arc<StoreConnection>,
    record_sets: &[&str],
    mode: TransactionMode,
    body: F,
) -> Result<T>
where
    F: FnOnce(&TransactionScope<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let names: Vec<String> = record_sets.iter().map(|s| (*s).to_string()).collect();
    run_blocking(move || conn.transact(&names, mode, body)).await
}

pub(crate) async fn init_on(conn: Arc<StoreConnection>) -> Result<PopulationState> {
    let count = run_on(
        Arc::clone(&conn),
        &[STORE_NAME_DICT],
        TransactionMode::ReadOnly,
        |scope| scope.record_set(STORE_NAME_DICT)?.count(),
    )
    .await?;

    let state = if count > 0 {
        PopulationState::Populated
    } else {
        PopulationState::Empty
    };
    conn.set_population_state(state);
    tracing::info!(entries = count, ?state, "Dictionary store initialized");
    Ok(state)
}

pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DictError::cancelled(format!("store task failed: {}", e)))?
}

// ============================================================================
// OPENING
// ============================================================================

async fn open_connection(
    config: StoreConfig,
    migrating: Arc<AtomicBool>,
) -> Result<Arc<StoreConnection>> {
    tokio::task::spawn_blocking(move || open_blocking(&config, &migrating))
        .await
        .map_err(|e| DictError::Connection {
            name: UNKNOWN_ERROR.to_string(),
            message: format!("open task failed: {}", e),
        })?
}

fn open_blocking(config: &StoreConfig, migrating: &AtomicBool) -> Result<Arc<StoreConnection>> {
    let path = &config.path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DictError::Connection {
            name: "NotReadableError".to_string(),
            message: format!("cannot create {}: {}", parent.display(), e),
        })?;
    }

    tracing::info!(path = %path.display(), "Opening dictionary store");
    let mut conn = Connection::open(path).map_err(|e| DictError::connection(&e))?;

    // Restrict database file permissions to owner-only on Unix
    #[cfg(unix)]
    if path.exists() {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        let _ = std::fs::set_permissions(path, perms);
    }

    configure_connection(&conn).map_err(|e| DictError::connection(&e))?;

    let current = migrations::get_current_version(&conn).map_err(|e| DictError::connection(&e))?;
    if current != config.target_version {
        tracing::info!(
            from = current,
            to = config.target_version,
            "Schema version mismatch, migrating"
        );
        migrating.store(true, Ordering::Release);
    }
    let applied = migrations::apply_migrations(&mut conn, config.target_version);
    migrating.store(false, Ordering::Release);
    let applied = applied?;
    if applied > 0 {
        tracing::info!(applied, version = config.target_version, "Schema migration complete");
    }

    Ok(Arc::new(StoreConnection {
        conn: Mutex::new(conn),
        population: Mutex::new(PopulationState::Unknown),
        path: path.clone(),
    }))
}

/// Apply PRAGMAs to a fresh connection
fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;
         PRAGMA busy_timeout = 5000;",
    )
}
