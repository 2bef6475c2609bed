use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::debug;

use strata_types::UserId;

use crate::event::{FsEvent, FsEventKind};

/// Filter for subscribing to a subset of events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<FsEventKind>>,
    /// If set, only events for nodes owned by these users are delivered.
    pub owners: Option<Vec<UserId>>,
}

impl EventFilter {
    /// Returns `true` if the given event matches this filter.
    pub fn matches(&self, event: &FsEvent) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(ref owners) = self.owners {
            if !owners.contains(&event.owner) {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for mutation events.
pub type EventStream = broadcast::Receiver<FsEvent>;

/// Configuration for the [`EventBus`].
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Capacity of per-subscriber broadcast channels.
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Internal subscriber: a filter paired with a broadcast sender.
struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<FsEvent>,
}

/// Fan-out bus delivering mutation events to matching subscribers.
///
/// Publishing is synchronous and never blocks on consumers; subscribers
/// whose channels are closed are pruned on the next publish.
pub struct EventBus {
    config: BusConfig,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Register a subscriber with the given filter; returns a receiver for
    /// the matching events.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        let (tx, rx) = broadcast::channel(self.config.channel_capacity);
        self.subscribers
            .write()
            .expect("bus lock poisoned")
            .push(Subscriber { filter, sender: tx });
        rx
    }

    /// Deliver an event to all matching subscribers.
    pub fn publish(&self, event: &FsEvent) {
        debug!(kind = %event.kind, node = %event.node.short(), "event published");
        let mut subs = self.subscribers.write().expect("bus lock poisoned");
        subs.retain(|sub| {
            if sub.filter.matches(event) {
                // If send fails there are no receivers; the subscriber is
                // stale and gets pruned.
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("bus lock poisoned").len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}
