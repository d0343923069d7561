//! In-process, topic-keyed publish/subscribe bus.
//!
//! Collectors publish snapshots with [`Hub::publish`]; consumers call
//! [`Hub::subscribe`] with the topics they care about and drain the returned
//! [`Subscription`].
//!
//! Delivery rules:
//! - Only subscribers registered at publish time receive an event. Nothing is
//!   buffered for late subscribers and nothing is persisted.
//! - Each subscriber owns one bounded queue per topic. When a queue is full the
//!   event is **dropped for that subscriber only**; the publisher never blocks,
//!   so a slow consumer cannot stall other subscribers or other collectors.
//! - Within one topic, events arrive in publish order. There is no ordering
//!   across topics.
//! - Payloads are not typed at the bus level. Producer and consumer agree on the
//!   payload type per topic name (see [`topics`]).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::poll_fn;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::Poll;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Topic names published by the built-in collectors.
pub mod topics {
    /// Payload: `SystemInfo`.
    pub const SYSTEM: &str = "system_update";
    /// Payload: `Vec<VmInfo>`.
    pub const VM_LIST: &str = "vm_list_update";
    /// Payload: `Vec<ShareInfo>`.
    pub const SHARE_LIST: &str = "share_list_update";
    /// Payload: `Vec<ContainerInfo>`.
    pub const CONTAINER_LIST: &str = "container_list_update";
    /// Payload: `ZfsSnapshot`.
    pub const ZFS_POOLS: &str = "zfs_pools_update";
    /// Payload: `NotificationList`.
    pub const NOTIFICATIONS: &str = "notifications_update";

    /// Every topic above, in a stable order.
    pub const ALL: [&str; 6] = [
        SYSTEM,
        VM_LIST,
        SHARE_LIST,
        CONTAINER_LIST,
        ZFS_POOLS,
        NOTIFICATIONS,
    ];
}

/// Default per-subscriber, per-topic queue length.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Object-safe view of a payload value.
pub trait PayloadData: Any + Send + Sync + fmt::Debug {
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
    fn as_any(&self) -> &dyn Any;
}

impl<T> PayloadData for T
where
    T: Serialize + Any + Send + Sync + fmt::Debug,
{
    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Type-erased, cheaply clonable event payload.
#[derive(Clone, Debug)]
pub struct Payload(Arc<dyn PayloadData>);

impl Payload {
    pub fn new<T>(value: T) -> Self
    where
        T: Serialize + Any + Send + Sync + fmt::Debug,
    {
        Self(Arc::new(value))
    }

    /// Returns the payload as `T` if that is what the producer published.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Serializes the payload without knowing its concrete type.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        self.0.to_json()
    }
}

/// One published `(topic, payload)` pair.
#[derive(Clone, Debug)]
pub struct Event {
    pub topic: Arc<str>,
    pub payload: Payload,
    pub published_at: DateTime<Utc>,
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Event>,
}

struct HubInner {
    capacity: usize,
    topics: Mutex<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
    dropped: AtomicU64,
}

/// Process-wide event bus. Clones share the same subscriber registry.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("capacity", &self.inner.capacity)
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl Hub {
    /// Creates a hub whose subscriber queues hold `capacity` events each.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                capacity: capacity.max(1),
                topics: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Registers a subscriber on `topics`.
    ///
    /// The subscription receives events published after this call returns.
    /// A topic listed twice gets one queue. Dropping the [`Subscription`]
    /// unregisters it.
    pub fn subscribe(&self, topics: &[&str]) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut unique: Vec<&str> = Vec::with_capacity(topics.len());
        for topic in topics {
            if !unique.contains(topic) {
                unique.push(*topic);
            }
        }
        let mut queues = Vec::with_capacity(unique.len());

        let mut registry = self
            .inner
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Topics nobody publishes on are only cleaned up here.
        registry.retain(|_, subs| {
            subs.retain(|sub| !sub.tx.is_closed());
            !subs.is_empty()
        });

        for topic in unique {
            let (tx, rx) = mpsc::channel(self.inner.capacity);
            registry
                .entry(topic.to_string())
                .or_default()
                .push(Subscriber { id, tx });
            queues.push(rx);
        }

        Subscription {
            id,
            queues,
            next: 0,
        }
    }

    /// Delivers `payload` to every current subscriber of `topic`.
    ///
    /// Returns how many subscribers accepted the event. Subscribers whose queue
    /// is full miss this event; closed subscribers are removed.
    pub fn publish(&self, topic: &str, payload: Payload) -> usize {
        let event = Event {
            topic: Arc::from(topic),
            payload,
            published_at: Utc::now(),
        };

        let mut registry = self
            .inner
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(subscribers) = registry.get_mut(topic) else {
            return 0;
        };

        let mut delivered = 0;
        subscribers.retain(|sub| match sub.tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(topic, subscriber = sub.id, "subscriber queue full, event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });

        if subscribers.is_empty() {
            registry.remove(topic);
        }

        delivered
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map_or(0, |subs| subs.iter().filter(|s| !s.tx.is_closed()).count())
    }

    /// Total number of events dropped because a subscriber queue was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

/// Receiving side of [`Hub::subscribe`].
pub struct Subscription {
    id: u64,
    queues: Vec<mpsc::Receiver<Event>>,
    next: usize,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topics", &self.queues.len())
            .finish()
    }
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next event on any subscribed topic.
    ///
    /// Queues are polled round-robin so one busy topic cannot starve the others.
    /// Returns `None` once the hub is gone and all queues are drained.
    pub async fn recv(&mut self) -> Option<Event> {
        poll_fn(|cx| {
            let count = self.queues.len();
            let mut open = false;
            for offset in 0..count {
                let idx = (self.next + offset) % count;
                match self.queues[idx].poll_recv(cx) {
                    Poll::Ready(Some(event)) => {
                        self.next = (idx + 1) % count;
                        return Poll::Ready(Some(event));
                    }
                    Poll::Ready(None) => {}
                    Poll::Pending => open = true,
                }
            }
            if open { Poll::Pending } else { Poll::Ready(None) }
        })
        .await
    }

    /// Returns a queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        let count = self.queues.len();
        for offset in 0..count {
            let idx = (self.next + offset) % count;
            if let Ok(event) = self.queues[idx].try_recv() {
                self.next = (idx + 1) % count;
                return Some(event);
            }
        }
        None
    }
}
