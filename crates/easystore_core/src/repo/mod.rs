//! Transactional object store over the embedded database.
//!
//! # Responsibility
//! - Own the database connection and serialize writers.
//! - Expose an explicit `Session` to mutators for the lifetime of one
//!   transaction.
//! - Map database failures into the single `StoreError` type.
//!
//! # Invariants
//! - A transaction either commits every write made through its session or
//!   none of them.
//! - The store never retries; failures surface to the caller immediately.

use crate::config::ConfigError;
use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod object_store;
pub mod session;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of any store-touching operation.
#[derive(Debug)]
pub enum StoreError {
    /// Open, bootstrap, statement or commit failure reported by SQLite.
    Db(DbError),
    /// Store could not be opened from the provided configuration.
    Config(ConfigError),
    /// Non-overwriting insert hit an existing primary key.
    DuplicateKey { kind: &'static str, key: String },
    /// Removal or modification targeted a key that is not stored.
    NotFound { kind: &'static str, key: String },
    /// Record could not be encoded for storage.
    Serialization(serde_json::Error),
    /// Persisted body could not be decoded back into its record type.
    InvalidData(String),
    /// The calling thread is already inside a transaction on this store.
    Reentrant,
}

impl StoreError {
    /// Stable machine-readable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Db(_) => "db_error",
            Self::Config(_) => "config_invalid",
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::NotFound { .. } => "not_found",
            Self::Serialization(_) => "serialization_failed",
            Self::InvalidData(_) => "invalid_data",
            Self::Reentrant => "reentrant_call",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::DuplicateKey { kind, key } => {
                write!(f, "{kind} with primary key `{key}` already exists")
            }
            Self::NotFound { kind, key } => write!(f, "{kind} not found: `{key}`"),
            Self::Serialization(err) => write!(f, "failed to encode record: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted object data: {message}"),
            Self::Reentrant => write!(
                f,
                "store is already in use by this thread; use the session passed to the mutator"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::DuplicateKey { .. }
            | Self::NotFound { .. }
            | Self::InvalidData(_)
            | Self::Reentrant => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}
