//! Transactional object store with commit notifications.
//!
//! Wraps an embedded SQLite database so that each typed mutation runs in one
//! transaction and, once committed, is announced to in-process observers as
//! an add, update or delete.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig, StoreLocation, DEFAULT_CHANNEL};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::mutation::{MutationKind, StoreEvent};
pub use model::record::Record;
pub use notify::bus::{NotificationBus, PublishReport, SubscriptionToken};
pub use repo::object_store::ObjectStore;
pub use repo::session::Session;
pub use repo::{StoreError, StoreResult};
pub use service::notifier::TransactionalNotifier;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
