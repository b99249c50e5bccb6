//! One open transaction against the object store.
//!
//! # Invariants
//! - A `Session` only exists inside `ObjectStore::transaction`/`read`.
//! - Rows are keyed by `(Record::KIND, Record::primary_key())`.
//! - Read paths reject undecodable bodies instead of skipping them.

use crate::model::record::Record;
use crate::repo::{StoreError, StoreResult};
use rusqlite::{params, ErrorCode, OptionalExtension, Transaction};

/// Handle passed to mutators; every write goes through the enclosing
/// transaction.
pub struct Session<'conn> {
    tx: Transaction<'conn>,
    writes: usize,
}

impl<'conn> Session<'conn> {
    pub(crate) fn new(tx: Transaction<'conn>) -> Self {
        Self { tx, writes: 0 }
    }

    pub(crate) fn commit(self) -> StoreResult<usize> {
        let writes = self.writes;
        self.tx.commit()?;
        Ok(writes)
    }

    /// Number of rows written so far in this transaction.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Persists `record`.
    ///
    /// With `overwrite_existing`, a row with the same primary key is replaced
    /// in place. Without it, an existing key fails with
    /// `StoreError::DuplicateKey`.
    pub fn put<R: Record>(&mut self, record: &R, overwrite_existing: bool) -> StoreResult<()> {
        let key = record.primary_key();
        let body = serde_json::to_string(record).map_err(StoreError::Serialization)?;

        if overwrite_existing {
            self.tx.execute(
                "INSERT INTO objects (kind, primary_key, body)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (kind, primary_key) DO UPDATE SET
                    body = excluded.body,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![R::KIND, key, body],
            )?;
        } else {
            self.tx
                .execute(
                    "INSERT INTO objects (kind, primary_key, body) VALUES (?1, ?2, ?3);",
                    params![R::KIND, key, body],
                )
                .map_err(|err| {
                    if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
                        StoreError::DuplicateKey {
                            kind: R::KIND,
                            key: key.clone(),
                        }
                    } else {
                        err.into()
                    }
                })?;
        }

        self.writes += 1;
        Ok(())
    }

    /// Removes the stored row matching `record`'s primary key.
    pub fn remove<R: Record>(&mut self, record: &R) -> StoreResult<()> {
        self.remove_by_key::<R>(&record.primary_key())
    }

    /// Removes the stored row for `key`; fails with `NotFound` when absent.
    pub fn remove_by_key<R: Record>(&mut self, key: &str) -> StoreResult<()> {
        let changed = self.tx.execute(
            "DELETE FROM objects WHERE kind = ?1 AND primary_key = ?2;",
            params![R::KIND, key],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: R::KIND,
                key: key.to_string(),
            });
        }

        self.writes += 1;
        Ok(())
    }

    /// Loads, mutates and writes back one existing record.
    ///
    /// Returns the record as persisted.
    pub fn modify<R, F>(&mut self, key: &str, mutate: F) -> StoreResult<R>
    where
        R: Record,
        F: FnOnce(&mut R),
    {
        let mut record = self.get::<R>(key)?.ok_or_else(|| StoreError::NotFound {
            kind: R::KIND,
            key: key.to_string(),
        })?;
        mutate(&mut record);
        if record.primary_key() != key {
            return Err(StoreError::InvalidData(format!(
                "{} primary key changed from `{key}` during modify",
                R::KIND
            )));
        }
        self.put(&record, true)?;
        Ok(record)
    }

    pub fn get<R: Record>(&self, key: &str) -> StoreResult<Option<R>> {
        let body: Option<String> = self
            .tx
            .query_row(
                "SELECT body FROM objects WHERE kind = ?1 AND primary_key = ?2;",
                params![R::KIND, key],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|body| decode_body::<R>(key, &body)).transpose()
    }

    pub fn contains<R: Record>(&self, key: &str) -> StoreResult<bool> {
        let exists: i64 = self.tx.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM objects WHERE kind = ?1 AND primary_key = ?2
            );",
            params![R::KIND, key],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    /// Returns every stored record of type `R` in insertion order.
    pub fn all<R: Record>(&self) -> StoreResult<Vec<R>> {
        let mut stmt = self.tx.prepare(
            "SELECT primary_key, body FROM objects WHERE kind = ?1 ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query([R::KIND])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let key: String = row.get("primary_key")?;
            let body: String = row.get("body")?;
            records.push(decode_body::<R>(&key, &body)?);
        }

        Ok(records)
    }

    pub fn count<R: Record>(&self) -> StoreResult<u64> {
        let count: i64 = self.tx.query_row(
            "SELECT COUNT(*) FROM objects WHERE kind = ?1;",
            [R::KIND],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| StoreError::InvalidData(format!("negative row count {count}")))
    }
}

fn decode_body<R: Record>(key: &str, body: &str) -> StoreResult<R> {
    serde_json::from_str(body).map_err(|err| {
        StoreError::InvalidData(format!("cannot decode {} `{key}`: {err}", R::KIND))
    })
}
