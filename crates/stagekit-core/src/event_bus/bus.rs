//! Event Bus implementation.
//!
//! Thread-safe pub/sub with synchronous delivery on the publisher's
//! thread. Subscribers are invoked in subscription order, outside the
//! bus lock, with per-callback panic isolation.

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{EventCategory, StageEvent};

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Filter to receive only specific event categories
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    /// Receive all events.
    #[default]
    All,
    /// Receive events matching any of these categories.
    Categories(Vec<EventCategory>),
}

impl EventFilter {
    /// Check if an event matches this filter
    pub fn matches(&self, event: &StageEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Categories(categories) => categories.contains(&event.category()),
        }
    }
}

type EventHandler = Arc<dyn Fn(StageEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    handler: EventHandler,
}

/// Central event bus for rig-wide event distribution
///
/// The subscriber list is the only data structure shared across
/// arbitrary threads; it is guarded by an internal lock, and handler
/// invocation happens after the lock is released so a callback may
/// re-enter the bus without deadlocking.
pub struct EventBus {
    /// Registered synchronous handlers, in subscription order
    subscriptions: RwLock<Vec<Subscription>>,
    /// Broadcast channel for async receivers
    sender: broadcast::Sender<StageEvent>,
}

const BROADCAST_CAPACITY: usize = 1024;

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            subscriptions: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Subscribe to events with a synchronous handler
    ///
    /// The handler is called on the publishing thread. Handlers that
    /// touch shared mutable state (a GUI, for example) must marshal to
    /// their own safe execution context themselves; the bus never
    /// buffers or reschedules.
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(StageEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.subscriptions.write().push(Subscription {
            id,
            filter,
            handler: Arc::new(handler),
        });
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Unsubscribe from events
    ///
    /// Safe to call with an already-removed or unknown id; returns
    /// whether a subscription was actually removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        let removed = subscriptions.len() != before;
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Publish an event to all subscribers
    ///
    /// Handlers run synchronously, in subscription order, on the
    /// caller's thread. A panicking handler is isolated and logged; it
    /// never prevents delivery to subsequent subscribers.
    pub fn publish(&self, event: StageEvent) {
        let matching: Vec<EventHandler> = {
            let subscriptions = self.subscriptions.read();
            subscriptions
                .iter()
                .filter(|s| s.filter.matches(&event))
                .map(|s| s.handler.clone())
                .collect()
        };

        for handler in matching {
            let delivered = event.clone();
            if catch_unwind(AssertUnwindSafe(|| handler(delivered))).is_err() {
                tracing::error!(
                    "Event handler panicked while delivering: {}",
                    event.description()
                );
            }
        }

        // Fan out to async receivers; no receivers is not an error.
        let _ = self.sender.send(event);
    }

    /// Get a receiver for async event consumption in a tokio task
    pub fn receiver(&self) -> broadcast::Receiver<StageEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Axis;
    use crate::event_bus::events::{ConnectionEvent, MotionEvent};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = EventBus::new();

        let id = bus.subscribe(EventFilter::All, |_| {});
        assert_eq!(bus.subscriber_count(), 1);

        assert!(bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);

        // Double unsubscribe is a no-op
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn test_event_delivery() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let _id = bus.subscribe(EventFilter::All, move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(StageEvent::Connection(ConnectionEvent::Succeeded));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            bus.subscribe(EventFilter::All, move |_| order.lock().push(tag));
        }

        bus.publish(StageEvent::Connection(ConnectionEvent::Started));
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_event_filtering() {
        let bus = EventBus::new();
        let connection_count = Arc::new(AtomicUsize::new(0));
        let motion_count = Arc::new(AtomicUsize::new(0));

        let cc = connection_count.clone();
        bus.subscribe(
            EventFilter::Categories(vec![EventCategory::Connection]),
            move |_| {
                cc.fetch_add(1, Ordering::SeqCst);
            },
        );

        let mc = motion_count.clone();
        bus.subscribe(
            EventFilter::Categories(vec![EventCategory::Motion]),
            move |_| {
                mc.fetch_add(1, Ordering::SeqCst);
            },
        );

        bus.publish(StageEvent::Connection(ConnectionEvent::Succeeded));
        bus.publish(StageEvent::Motion(MotionEvent::MoveStarted {
            axis: Axis::X,
            target: 10.0,
        }));

        assert_eq!(connection_count.load(Ordering::SeqCst), 1);
        assert_eq!(motion_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_handler_does_not_block_others() {
        let bus = EventBus::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        bus.subscribe(EventFilter::All, |_| panic!("subscriber bug"));

        let delivered_clone = delivered.clone();
        bus.subscribe(EventFilter::All, move |_| {
            delivered_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(StageEvent::Connection(ConnectionEvent::Started));
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_may_reenter_bus() {
        let bus = Arc::new(EventBus::new());
        let reentered = Arc::new(AtomicUsize::new(0));

        let bus_clone = bus.clone();
        let reentered_clone = reentered.clone();
        bus.subscribe(EventFilter::All, move |event| {
            // Only re-publish once to avoid recursing forever
            if matches!(event, StageEvent::Connection(ConnectionEvent::Started)) {
                bus_clone.publish(StageEvent::Connection(ConnectionEvent::Succeeded));
            } else {
                reentered_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        bus.publish(StageEvent::Connection(ConnectionEvent::Started));
        assert_eq!(reentered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_async_receiver() {
        let bus = EventBus::new();
        let mut receiver = bus.receiver();

        bus.publish(StageEvent::Connection(ConnectionEvent::Succeeded));

        let received = receiver.try_recv();
        assert!(matches!(
            received,
            Ok(StageEvent::Connection(ConnectionEvent::Succeeded))
        ));
    }
}
