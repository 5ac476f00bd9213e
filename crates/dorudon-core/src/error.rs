//! Error taxonomy shared by every layer of the store.
//!
//! Failures travel as discriminated names, the same names an operator sees
//! in an alert. Host (SQLite) failures are translated once, in
//! [`host_error_name`].

use rusqlite::ErrorCode;

/// Name used whenever the host reports a failure without a usable name,
/// and for aborts triggered by explicit cancellation.
pub const UNKNOWN_ERROR: &str = "UnknownError";

/// Dictionary store error
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DictError {
    /// The backing store could not be opened
    #[error("{name}: failed to open dictionary store: {message}")]
    Connection { name: String, message: String },
    /// Migration refused (downgrade) or a registered step failed
    #[error("MigrationAbortedError: {reason}")]
    MigrationAborted { reason: String },
    /// Population attempted while the dictionary already holds entries
    #[error("AlreadyPopulatedError: dictionary is already populated")]
    AlreadyPopulated,
    /// Malformed line or unknown input method name
    #[error("SyntaxError: line {line}: {reason}")]
    Syntax { line: usize, reason: String },
    /// Propagated verbatim from the text decoding capability
    #[error("{name}: {message}")]
    Decode { name: String, message: String },
    /// A transaction aborted before completing
    #[error("{name}: transaction aborted: {message}")]
    TransactionAborted { name: String, message: String },
}

/// Storage result type
pub type Result<T> = std::result::Result<T, DictError>;

impl DictError {
    /// The discriminated error name.
    pub fn name(&self) -> &str {
        match self {
            DictError::Connection { name, .. }
            | DictError::Decode { name, .. }
            | DictError::TransactionAborted { name, .. } => name,
            DictError::MigrationAborted { .. } => "MigrationAbortedError",
            DictError::AlreadyPopulated => "AlreadyPopulatedError",
            DictError::Syntax { .. } => "SyntaxError",
        }
    }

    pub(crate) fn connection(err: &rusqlite::Error) -> Self {
        DictError::Connection {
            name: host_error_name(err).to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn aborted(err: &rusqlite::Error) -> Self {
        DictError::TransactionAborted {
            name: host_error_name(err).to_string(),
            message: err.to_string(),
        }
    }

    /// Abort with no host-reported fault behind it.
    pub(crate) fn cancelled(message: impl Into<String>) -> Self {
        DictError::TransactionAborted {
            name: UNKNOWN_ERROR.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn named_abort(name: &str, message: impl Into<String>) -> Self {
        DictError::TransactionAborted {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn syntax(line: usize, reason: impl Into<String>) -> Self {
        DictError::Syntax {
            line,
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for DictError {
    fn from(err: rusqlite::Error) -> Self {
        DictError::aborted(&err)
    }
}

/// Map a SQLite failure onto the store's error names.
pub fn host_error_name(err: &rusqlite::Error) -> &'static str {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::ConstraintViolation => "ConstraintError",
            ErrorCode::ReadOnly => "ReadOnlyError",
            ErrorCode::DiskFull => "QuotaExceededError",
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => "TransactionInactiveError",
            ErrorCode::CannotOpen | ErrorCode::PermissionDenied => "NotReadableError",
            ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt => "DataError",
            ErrorCode::SystemIoFailure => "NotReadableError",
            _ => UNKNOWN_ERROR,
        },
        rusqlite::Error::QueryReturnedNoRows => "NotFoundError",
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::IntegralValueOutOfRange(..)
        | rusqlite::Error::InvalidColumnType(..) => "DataError",
        _ => UNKNOWN_ERROR,
    }
}
