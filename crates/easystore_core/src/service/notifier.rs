//! Commit-then-notify convenience service.
//!
//! # Responsibility
//! - Run typed mutations through `ObjectStore` transactions.
//! - Publish one `StoreEvent` per committed, non-silent mutation.
//!
//! # Invariants
//! - An event is published if and only if its transaction committed.
//! - Publishing happens after the store lock is released and before the
//!   calling operation returns.
//! - At most one event per call; `run_transaction` never publishes.

use crate::model::mutation::{MutationKind, StoreEvent};
use crate::model::record::Record;
use crate::notify::bus::{NotificationBus, SubscriptionToken};
use crate::repo::object_store::ObjectStore;
use crate::repo::session::Session;
use crate::repo::StoreResult;
use log::info;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed store facade that broadcasts mutation kinds after commit.
pub struct TransactionalNotifier<R: Record> {
    store: Arc<ObjectStore>,
    bus: Arc<NotificationBus>,
    channel: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for TransactionalNotifier<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            bus: Arc::clone(&self.bus),
            channel: self.channel.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> TransactionalNotifier<R> {
    /// Creates a notifier publishing on the store's configured channel.
    pub fn new(store: Arc<ObjectStore>, bus: Arc<NotificationBus>) -> Self {
        let channel = store.channel().to_string();
        Self {
            store,
            bus,
            channel,
            _record: PhantomData,
        }
    }

    /// Publishes on `channel` instead of the store default.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Bus channel this notifier publishes on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Underlying store, for reads that span record types.
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Runs `mutator` in one transaction without publishing.
    ///
    /// Mutators must use the session they receive; calling this notifier
    /// from inside one fails with `StoreError::Reentrant`.
    pub fn run_transaction<T, F>(&self, mutator: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Session<'_>) -> StoreResult<T>,
    {
        self.store.transaction(mutator)
    }

    /// Runs `mutator` and publishes `Add` after commit.
    pub fn write_and_notify<T, F>(&self, mutator: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Session<'_>) -> StoreResult<T>,
    {
        self.commit_then_publish(Some(MutationKind::Add), mutator)
    }

    /// Inserts `record`, failing if its primary key is already stored.
    pub fn create(&self, record: &R) -> StoreResult<()> {
        self.insert(record, false)
    }

    /// Inserts `record` and publishes `Add`.
    ///
    /// # Errors
    /// - `StoreError::DuplicateKey` when the key exists and
    ///   `overwrite_existing` is false.
    pub fn insert(&self, record: &R, overwrite_existing: bool) -> StoreResult<()> {
        self.commit_then_publish(Some(MutationKind::Add), |session| {
            session.put(record, overwrite_existing)
        })
    }

    /// Inserts or replaces `record` and publishes `Add`.
    pub fn upsert(&self, record: &R) -> StoreResult<()> {
        self.insert(record, true)
    }

    /// Runs an in-place modification and publishes `Update` unless `silent`.
    ///
    /// The mutator edits already stored records through the session, e.g.
    /// with `Session::modify`.
    pub fn update<T, F>(&self, mutator: F, silent: bool) -> StoreResult<T>
    where
        F: FnOnce(&mut Session<'_>) -> StoreResult<T>,
    {
        let kind = (!silent).then_some(MutationKind::Update);
        self.commit_then_publish(kind, mutator)
    }

    /// Removes `record` by primary key and publishes `Delete`.
    ///
    /// # Errors
    /// - `StoreError::NotFound` when no row has that key.
    pub fn delete(&self, record: &R) -> StoreResult<()> {
        self.commit_then_publish(Some(MutationKind::Delete), |session| {
            session.remove(record)
        })
    }

    /// Registers `handler` for this notifier's channel.
    pub fn observe<F>(&self, handler: F) -> SubscriptionToken
    where
        F: Fn(MutationKind) + Send + Sync + 'static,
    {
        self.bus
            .subscribe(&self.channel, move |event: &StoreEvent| handler(event.kind))
    }

    /// Cancels a registration; unknown tokens are ignored.
    pub fn stop_observing(&self, token: SubscriptionToken) {
        self.bus.unsubscribe(token);
    }

    /// Loads one record by primary key; never publishes.
    pub fn get(&self, key: &str) -> StoreResult<Option<R>> {
        self.store.get::<R>(key)
    }

    /// Loads every stored `R` in insertion order; never publishes.
    pub fn all(&self) -> StoreResult<Vec<R>> {
        self.store.all::<R>()
    }

    /// Counts stored `R` records; never publishes.
    pub fn count(&self) -> StoreResult<u64> {
        self.store.count::<R>()
    }

    fn commit_then_publish<T, F>(&self, kind: Option<MutationKind>, mutator: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Session<'_>) -> StoreResult<T>,
    {
        let value = self.store.transaction(mutator)?;

        if let Some(kind) = kind {
            let report = self.bus.publish(&self.channel, StoreEvent::new(kind));
            info!(
                "event=store_notify module=service record_kind={} kind={kind} channel={} delivered={} failed={}",
                R::KIND,
                self.channel,
                report.delivered,
                report.failed
            );
        }

        Ok(value)
    }
}
