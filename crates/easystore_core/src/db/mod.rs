//! Embedded database layer beneath `ObjectStore`.
//!
//! Everything the store persists lives in one `objects` table keyed by
//! `(kind, primary_key)`; this module only gets a connection to that table
//! into a usable state. Record encoding and transactions belong to `repo`.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - A connection is never handed to the store before migrations succeed.
//! - Files written by a newer build are refused rather than downgraded.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, DEFAULT_BUSY_TIMEOUT};

pub type DbResult<T> = Result<T, DbError>;

/// Failure reported by the embedded database itself.
///
/// Surfaces to store callers wrapped as `StoreError::Db`.
#[derive(Debug)]
pub enum DbError {
    /// Open, statement or commit failure from SQLite, passed through as-is.
    Sqlite(rusqlite::Error),
    /// The store file was migrated by a build that knows more versions.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "object store file has schema v{db_version}; this build reads up to v{latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
