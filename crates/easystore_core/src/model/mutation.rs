//! Mutation classification and the event published after commit.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Why a notification fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Objects were inserted (or written through `write_and_notify`).
    Add,
    /// Tracked objects were modified in place.
    Update,
    /// An object was removed.
    Delete,
}

impl MutationKind {
    /// Stable string id used in log lines and serialized payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl Display for MutationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient event broadcast once per committed, non-silent transaction.
///
/// Carries only the mutation category; observers that need to know which
/// record changed must re-read the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEvent {
    pub kind: MutationKind,
}

impl StoreEvent {
    pub fn new(kind: MutationKind) -> Self {
        Self { kind }
    }
}
