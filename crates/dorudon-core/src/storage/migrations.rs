//! Database Migrations
//!
//! Schema upgrade steps for the dictionary store. Each step is registered
//! under the version it upgrades *from*; the step for version N turns a
//! store at version N into one consistent with version N+1. The recorded
//! version lives in `PRAGMA user_version`, which SQLite writes inside the
//! surrounding transaction, so a failed migration leaves the old version.

use rusqlite::{Connection, TransactionBehavior};

use crate::error::{DictError, Result};

/// Schema version this build of the store requires
pub const SCHEMA_VERSION: u32 = 1;

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[Migration {
    from_version: 0,
    description: "Create dict record set with code, im-code and code-im index views",
    up: MIGRATION_V0_UP,
}];

/// A single upgrade step
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version this step upgrades from
    pub from_version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V0 -> V1: the dict record set
///
/// `(code, im)` is the primary key, which doubles as the `code-im` view
/// and, through its `code` prefix, the `code` view.
const MIGRATION_V0_UP: &str = r#"
CREATE TABLE IF NOT EXISTS dict (
    code INTEGER NOT NULL CHECK (code >= 0),
    im INTEGER NOT NULL CHECK (im BETWEEN 0 AND 10),
    value TEXT NOT NULL,
    PRIMARY KEY (code, im)
) WITHOUT ROWID;

-- Enumerate completed char codes for a specific im
CREATE UNIQUE INDEX IF NOT EXISTS idx_dict_im_code ON dict(im, code);
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

/// Bring the store from its recorded version to `target`.
///
/// Returns the number of steps applied. A store already at `target` is left
/// untouched. A store *newer* than `target` cannot be downgraded and aborts.
pub fn apply_migrations(conn: &mut Connection, target: u32) -> Result<u32> {
    apply_steps(conn, MIGRATIONS, target)
}

pub(crate) fn apply_steps(conn: &mut Connection, steps: &[Migration], target: u32) -> Result<u32> {
    let current = get_current_version(conn).map_err(|e| abort(format!("cannot read schema version: {}", e)))?;

    if current == target {
        return Ok(0);
    }
    if current > target {
        return Err(abort(format!(
            "store is at schema version {} but version {} was requested; downgrades are not supported",
            current, target
        )));
    }

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| abort(format!("cannot start migration transaction: {}", e)))?;

    let mut version = current;
    while version < target {
        let Some(step) = steps.iter().find(|m| m.from_version == version) else {
            tracing::error!(
                version,
                target,
                "No upgrade step registered; binary and stored data have drifted"
            );
            return Err(abort(format!("no upgrade step registered for version {}", version)));
        };

        tracing::info!(
            "Applying migration v{} -> v{}: {}",
            version,
            version + 1,
            step.description
        );

        tx.execute_batch(step.up)
            .map_err(|e| abort(format!("step for version {} failed: {}", version, e)))?;
        version += 1;
        tx.pragma_update(None, "user_version", version)
            .map_err(|e| abort(format!("cannot record schema version {}: {}", version, e)))?;
    }

    tx.commit()
        .map_err(|e| abort(format!("cannot commit migration: {}", e)))?;

    Ok(target - current)
}

fn abort(reason: String) -> DictError {
    DictError::MigrationAborted { reason }
}
