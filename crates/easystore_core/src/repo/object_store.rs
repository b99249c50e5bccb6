//! SQLite-backed transactional object store.
//!
//! # Responsibility
//! - Hold the single connection behind a mutex (single writer per store).
//! - Run mutators inside `BEGIN IMMEDIATE` transactions and commit them.
//!
//! # Invariants
//! - The connection lock is released before `transaction` returns, so code
//!   running after commit (e.g. observers) may re-enter the store.
//! - A mutator error or panic rolls back every write of that transaction.
//! - A thread that already holds the connection gets `StoreError::Reentrant`
//!   from any nested store call instead of blocking on itself.

use crate::config::{StoreConfig, StoreLocation};
use crate::db::{open_db, open_db_in_memory};
use crate::model::record::Record;
use crate::repo::session::Session;
use crate::repo::{StoreError, StoreResult};
use log::{debug, error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Instant;

/// Embedded transactional store shared by notifiers.
pub struct ObjectStore {
    conn: Mutex<Connection>,
    /// Thread currently holding `conn`, if any.
    owner: Mutex<Option<ThreadId>>,
    channel: String,
}

/// Exclusive use of the connection; clears the owner mark on drop.
struct ConnectionLease<'a> {
    conn: MutexGuard<'a, Connection>,
    owner: &'a Mutex<Option<ThreadId>>,
}

impl Deref for ConnectionLease<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl DerefMut for ConnectionLease<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl Drop for ConnectionLease<'_> {
    fn drop(&mut self) {
        *recover(self.owner.lock()) = None;
    }
}

impl ObjectStore {
    /// Opens the store described by `config`.
    ///
    /// # Errors
    /// - `StoreError::Config` when `config` fails validation.
    /// - `StoreError::Db` when the database cannot be opened or migrated.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let conn = match &config.location {
            StoreLocation::Memory => open_db_in_memory()?,
            StoreLocation::File { path } => open_db(path, config.busy_timeout())?,
        };

        Ok(Self {
            conn: Mutex::new(conn),
            owner: Mutex::new(None),
            channel: config.channel.clone(),
        })
    }

    /// Opens a private in-memory store with default settings.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(&StoreConfig::in_memory())
    }

    /// Channel notifiers built on this store publish to by default.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Runs `mutator` in a write transaction and commits it.
    ///
    /// Returns the mutator's value after a successful commit. Any error from
    /// opening, the mutator, or the commit is returned unchanged and nothing
    /// is persisted.
    ///
    /// The mutator must do all of its work through the `Session` it is
    /// given. Calling back into this store (or a notifier built on it) from
    /// inside the mutator fails with `StoreError::Reentrant`.
    pub fn transaction<T, F>(&self, mutator: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Session<'_>) -> StoreResult<T>,
    {
        let started_at = Instant::now();

        let result: StoreResult<(T, usize)> = self.lock().and_then(|mut conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut session = Session::new(tx);
            let value = mutator(&mut session)?;
            let writes = session.commit()?;
            Ok((value, writes))
        });

        match result {
            Ok((value, writes)) => {
                info!(
                    "event=store_txn module=store status=ok writes={writes} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                error!(
                    "event=store_txn module=store status=error duration_ms={} error_code={}",
                    started_at.elapsed().as_millis(),
                    err.code()
                );
                Err(err)
            }
        }
    }

    /// Runs `reader` against a consistent snapshot; nothing is written.
    ///
    /// Like `transaction`, fails with `StoreError::Reentrant` when called
    /// from inside another mutator or reader on the same thread.
    pub fn read<T, F>(&self, reader: F) -> StoreResult<T>
    where
        F: FnOnce(&Session<'_>) -> StoreResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let session = Session::new(tx);
        let value = reader(&session)?;
        debug!("event=store_read module=store status=ok");
        Ok(value)
    }

    /// Loads one record by primary key.
    pub fn get<R: Record>(&self, key: &str) -> StoreResult<Option<R>> {
        self.read(|session| session.get::<R>(key))
    }

    /// Loads every record of type `R` in insertion order.
    pub fn all<R: Record>(&self) -> StoreResult<Vec<R>> {
        self.read(|session| session.all::<R>())
    }

    /// Counts stored records of type `R`.
    pub fn count<R: Record>(&self) -> StoreResult<u64> {
        self.read(|session| session.count::<R>())
    }

    fn lock(&self) -> StoreResult<ConnectionLease<'_>> {
        let current = thread::current().id();
        if *recover(self.owner.lock()) == Some(current) {
            warn!("event=store_lock module=store status=error error_code=reentrant_call");
            return Err(StoreError::Reentrant);
        }

        let conn = recover(self.conn.lock());
        *recover(self.owner.lock()) = Some(current);
        Ok(ConnectionLease {
            conn,
            owner: &self.owner,
        })
    }
}

// A poisoned connection lock only means a mutator panicked; its transaction
// was rolled back when the session dropped during unwinding.
fn recover<'a, T>(
    result: Result<MutexGuard<'a, T>, std::sync::PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(|poisoned| poisoned.into_inner())
}
