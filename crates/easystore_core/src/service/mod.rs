//! Use-case services built on the object store.
//!
//! # Responsibility
//! - Compose store transactions with post-commit notification.
//! - Keep callers decoupled from SQL and bus details.

pub mod notifier;
