//! Listener registry and synchronous fan-out.

use crate::model::mutation::StoreEvent;
use log::{debug, error};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type Handler = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Opaque handle identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionToken(u64);

impl Display for SubscriptionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Listeners that returned normally.
    pub delivered: usize,
    /// Listeners that panicked while handling the event.
    pub failed: usize,
}

struct Subscription {
    channel: String,
    handler: Handler,
}

/// Injectable notification registry.
///
/// Delivery order is registration order. Publishing iterates a snapshot taken
/// under the lock, so listeners may subscribe or unsubscribe (themselves
/// included) from inside a handler.
#[derive(Default)]
pub struct NotificationBus {
    subscriptions: Mutex<BTreeMap<SubscriptionToken, Subscription>>,
    next_token: AtomicU64,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events published on `channel`.
    pub fn subscribe<F>(&self, channel: &str, handler: F) -> SubscriptionToken
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.registry().insert(
            token,
            Subscription {
                channel: channel.to_string(),
                handler: Arc::new(handler),
            },
        );
        debug!("event=notify_subscribe module=notify channel={channel} token={token}");
        token
    }

    /// Removes a registration. Returns whether `token` was registered.
    ///
    /// Unknown or already-removed tokens are ignored.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let removed = self.registry().remove(&token).is_some();
        debug!("event=notify_unsubscribe module=notify token={token} removed={removed}");
        removed
    }

    /// Delivers `event` to every listener currently registered on `channel`.
    pub fn publish(&self, channel: &str, event: StoreEvent) -> PublishReport {
        let handlers: Vec<(SubscriptionToken, Handler)> = self
            .registry()
            .iter()
            .filter(|(_, subscription)| subscription.channel == channel)
            .map(|(token, subscription)| (*token, Arc::clone(&subscription.handler)))
            .collect();

        let mut report = PublishReport::default();
        for (token, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(()) => report.delivered += 1,
                Err(_) => {
                    report.failed += 1;
                    error!(
                        "event=notify_deliver module=notify status=error channel={channel} token={token} error_code=listener_panicked"
                    );
                }
            }
        }

        debug!(
            "event=notify_publish module=notify channel={channel} kind={} delivered={} failed={}",
            event.kind, report.delivered, report.failed
        );
        report
    }

    /// Number of registrations on `channel`.
    pub fn listener_count(&self, channel: &str) -> usize {
        self.registry()
            .values()
            .filter(|subscription| subscription.channel == channel)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }

    // Handlers never run under this lock, so poisoning can only come from a
    // panic inside the map operations themselves; the map is still coherent.
    fn registry(&self) -> MutexGuard<'_, BTreeMap<SubscriptionToken, Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
