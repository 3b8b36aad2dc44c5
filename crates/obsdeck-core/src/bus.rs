// ── In-process event bus ──
//
// Topic → subscriber list, invoked synchronously in subscription order.
// Every state update carries a revision; a topic never delivers an older
// revision after a newer one, and a hydrated subscriber never sees
// anything older than what it was hydrated with. A panicking subscriber
// is logged and skipped.
//
// Callbacks run while their topic is locked: they may read session
// snapshots, but must not subscribe to the topic they are called for.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use serde::Serialize;
use strum::{Display, EnumCount, EnumIter};
use tracing::{trace, warn};

use crate::model::{AudioChannel, ConnectionState, InputInfo, LogEntry, Scene, StreamStatus, TransitionConfig};

// ── Topics ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumCount, EnumIter, Serialize)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum Topic {
    ConnectionState,
    Status,
    Scenes,
    CurrentScene,
    PreviewScene,
    AudioSources,
    Inputs,
    Transition,
    StudioMode,
    Log,
}

impl Topic {
    const fn index(self) -> usize {
        match self {
            Self::ConnectionState => 0,
            Self::Status => 1,
            Self::Scenes => 2,
            Self::CurrentScene => 3,
            Self::PreviewScene => 4,
            Self::AudioSources => 5,
            Self::Inputs => 6,
            Self::Transition => 7,
            Self::StudioMode => 8,
            Self::Log => 9,
        }
    }

    /// Stateful topics replay their current value to new subscribers and
    /// drop out-of-order revisions. `Log` is an append feed and does neither.
    pub fn is_stateful(self) -> bool {
        self != Self::Log
    }
}

/// A value delivered to subscribers. Collections are shared snapshots.
#[derive(Debug, Clone)]
pub enum Update {
    ConnectionState(ConnectionState),
    Status(Arc<StreamStatus>),
    Scenes(Arc<Vec<Scene>>),
    CurrentScene(Option<String>),
    PreviewScene(Option<String>),
    AudioSources(Arc<Vec<AudioChannel>>),
    Inputs(Arc<Vec<InputInfo>>),
    Transition(Arc<TransitionConfig>),
    StudioMode(bool),
    Log(Arc<LogEntry>),
}

impl Update {
    pub fn topic(&self) -> Topic {
        match self {
            Self::ConnectionState(_) => Topic::ConnectionState,
            Self::Status(_) => Topic::Status,
            Self::Scenes(_) => Topic::Scenes,
            Self::CurrentScene(_) => Topic::CurrentScene,
            Self::PreviewScene(_) => Topic::PreviewScene,
            Self::AudioSources(_) => Topic::AudioSources,
            Self::Inputs(_) => Topic::Inputs,
            Self::Transition(_) => Topic::Transition,
            Self::StudioMode(_) => Topic::StudioMode,
            Self::Log(_) => Topic::Log,
        }
    }
}

// ── Subscribers ─────────────────────────────────────────────────────

pub type Callback = Arc<dyn Fn(&Update) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    callback: Callback,
    /// Revisions at or below this were covered by hydration.
    floor: u64,
}

// ── EventBus ────────────────────────────────────────────────────────

pub struct EventBus {
    subscribers: DashMap<Topic, Vec<Subscriber>>,
    /// Last delivered revision per topic; also serializes delivery.
    gates: [Mutex<u64>; Topic::COUNT],
    revision: AtomicU64,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            gates: std::array::from_fn(|_| Mutex::new(0)),
            revision: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate the next revision. Take it while holding the lock that
    /// guards the value being published so revisions follow mutation order.
    pub fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Register `callback` on `topic`.
    ///
    /// `current` is evaluated under the topic lock; when it yields a value
    /// the callback is invoked with it before any later publish reaches it.
    pub fn subscribe<F>(&self, topic: Topic, callback: Callback, current: F) -> SubscriptionId
    where
        F: FnOnce() -> Option<(u64, Update)>,
    {
        let _gate = self.gate(topic);
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let hydration = if topic.is_stateful() { current() } else { None };

        let subscriber = Subscriber {
            id,
            callback,
            floor: hydration.as_ref().map_or(0, |(rev, _)| *rev),
        };
        self.subscribers
            .entry(topic)
            .or_default()
            .push(subscriber.clone());

        if let Some((_, update)) = hydration {
            invoke(topic, &subscriber, &update);
        }
        id
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, topic: Topic, id: SubscriptionId) -> bool {
        let _gate = self.gate(topic);
        let Some(mut subs) = self.subscribers.get_mut(&topic) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.id != id);
        before != subs.len()
    }

    /// Deliver `update` to every subscriber of its topic, in subscription order.
    pub fn publish(&self, revision: u64, update: &Update) {
        let topic = update.topic();
        let mut last = self.gate(topic);

        if topic.is_stateful() {
            if revision <= *last {
                trace!(%topic, revision, last = *last, "dropping stale update");
                return;
            }
            *last = revision;
        }

        // Clone out so callbacks never run under a DashMap shard lock.
        let subs = self
            .subscribers
            .get(&topic)
            .map(|s| s.clone())
            .unwrap_or_default();

        for sub in subs.iter().filter(|s| s.floor < revision) {
            invoke(topic, sub, update);
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers.get(&topic).map_or(0, |s| s.len())
    }

    fn gate(&self, topic: Topic) -> MutexGuard<'_, u64> {
        self.gates[topic.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn invoke(topic: Topic, sub: &Subscriber, update: &Update) {
    let result = catch_unwind(AssertUnwindSafe(|| (sub.callback)(update)));
    if let Err(payload) = result {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic".into());
        warn!(%topic, subscription = sub.id.0, panic = %message, "subscriber panicked");
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use strum::IntoEnumIterator;

    use super::*;

    fn recorder() -> (Callback, Arc<Mutex<Vec<bool>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb: Callback = Arc::new(move |u: &Update| {
            if let Update::StudioMode(on) = u {
                sink.lock().unwrap_or_else(PoisonError::into_inner).push(*on);
            }
        });
        (cb, seen)
    }

    fn seen(v: &Arc<Mutex<Vec<bool>>>) -> Vec<bool> {
        v.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[test]
    fn topic_indices_are_dense() {
        let mut indices: Vec<_> = Topic::iter().map(Topic::index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..Topic::COUNT).collect::<Vec<_>>());
        assert_eq!(Topic::AudioSources.to_string(), "audioSources");
    }

    #[test]
    fn delivers_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            bus.subscribe(
                Topic::StudioMode,
                Arc::new(move |_: &Update| order.lock().unwrap_or_else(PoisonError::into_inner).push(n)),
                || None,
            );
        }
        bus.publish(bus.next_revision(), &Update::StudioMode(true));
        assert_eq!(*order.lock().unwrap_or_else(PoisonError::into_inner), vec![0, 1, 2]);
    }

    #[test]
    fn stale_revision_is_dropped() {
        let bus = EventBus::new();
        let (cb, log) = recorder();
        bus.subscribe(Topic::StudioMode, cb, || None);

        let old = bus.next_revision();
        let new = bus.next_revision();
        bus.publish(new, &Update::StudioMode(true));
        bus.publish(old, &Update::StudioMode(false));
        assert_eq!(seen(&log), vec![true]);
    }

    #[test]
    fn log_topic_never_drops() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        bus.subscribe(
            Topic::Log,
            Arc::new(move |_: &Update| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            || panic!("log is never hydrated"),
        );
        let entry = Arc::new(LogEntry::new(crate::model::Severity::Info, "x"));
        let second = bus.next_revision();
        let first = bus.next_revision();
        bus.publish(first, &Update::Log(Arc::clone(&entry)));
        bus.publish(second, &Update::Log(entry));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn hydration_sets_subscriber_floor() {
        let bus = EventBus::new();
        let older = bus.next_revision();
        let hydrated_at = bus.next_revision();
        let (cb, log) = recorder();
        bus.subscribe(Topic::StudioMode, cb, || {
            Some((hydrated_at, Update::StudioMode(true)))
        });
        // A publish that was already covered by hydration is not repeated.
        bus.publish(older, &Update::StudioMode(false));
        bus.publish(hydrated_at, &Update::StudioMode(true));
        bus.publish(bus.next_revision(), &Update::StudioMode(false));
        assert_eq!(seen(&log), vec![true, false]);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        bus.subscribe(Topic::StudioMode, Arc::new(|_: &Update| panic!("boom")), || None);
        let (cb, log) = recorder();
        bus.subscribe(Topic::StudioMode, cb, || None);

        bus.publish(bus.next_revision(), &Update::StudioMode(true));
        assert_eq!(seen(&log), vec![true]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (cb, log) = recorder();
        let id = bus.subscribe(Topic::StudioMode, cb, || None);
        assert_eq!(bus.subscriber_count(Topic::StudioMode), 1);

        assert!(bus.unsubscribe(Topic::StudioMode, id));
        assert!(!bus.unsubscribe(Topic::StudioMode, id));
        bus.publish(bus.next_revision(), &Update::StudioMode(true));
        assert!(seen(&log).is_empty());
    }
}
