//! Storable record contract.
//!
//! # Invariants
//! - `(KIND, primary_key())` identifies at most one stored row.
//! - `primary_key()` must stay stable for the lifetime of a stored record;
//!   changing it produces a different row, not a rename.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A value that can be persisted in the object store.
///
/// Records are serialized as JSON bodies; the store never inspects their
/// fields beyond `primary_key()`.
pub trait Record: Serialize + DeserializeOwned + 'static {
    /// Stable type name used to partition rows, e.g. `"note"`.
    const KIND: &'static str;

    /// Primary key used for conflict detection and removal.
    fn primary_key(&self) -> String;
}
