//! Domain types shared by the store, the bus and the notifier.
//!
//! # Responsibility
//! - Describe what can be stored (`Record`).
//! - Describe what a committed mutation looks like to observers
//!   (`MutationKind`, `StoreEvent`).

pub mod mutation;
pub mod record;
