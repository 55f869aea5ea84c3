//! Topic subscription registry.
//!
//! Tracks topic → callbacks so that inbound events can be routed and so the
//! active topic set can be replayed after every reconnect. A topic with no
//! callbacks is never kept: removing the last callback deletes the entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use riskfeed_core::{Event, Topic};

/// A subscriber callback. Invoked once per matching event.
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Identifies one registered callback within the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

impl std::fmt::Display for CallbackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cb-{}", self.0)
    }
}

struct TopicEntry {
    topic: Topic,
    callbacks: Vec<(CallbackId, Callback)>,
}

/// Shared topic → callbacks map.
///
/// Cheap to clone; clones share the same map. Callbacks are always copied
/// out before being run so a callback may subscribe or unsubscribe freely.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    entries: Arc<Mutex<HashMap<String, TopicEntry>>>,
    next_id: Arc<AtomicU64>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, TopicEntry>> {
        // Callbacks never run under this lock, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `callback` on `topic`.
    ///
    /// Returns the new callback's id and `true` if this is the first callback
    /// for a previously unseen topic (the caller should send a subscribe directive).
    pub fn insert(&self, topic: &str, callback: Callback) -> (CallbackId, bool) {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries();
        let entry = entries.entry(topic.to_string()).or_insert_with(|| TopicEntry {
            topic: Topic::parse(topic),
            callbacks: Vec::new(),
        });
        let first = entry.callbacks.is_empty();
        entry.callbacks.push((id, callback));
        (id, first)
    }

    /// Remove a single callback.
    ///
    /// Returns `true` if that was the topic's last callback and the topic was
    /// deleted (the caller should send an unsubscribe directive). Unknown
    /// topics or ids are a no-op returning `false`.
    pub fn remove(&self, topic: &str, id: CallbackId) -> bool {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(topic) else {
            return false;
        };
        let before = entry.callbacks.len();
        entry.callbacks.retain(|(cb_id, _)| *cb_id != id);
        if entry.callbacks.len() == before || !entry.callbacks.is_empty() {
            return false;
        }
        entries.remove(topic);
        true
    }

    /// Every callback whose topic matches `event_type`, paired with its topic.
    pub fn matching(&self, event_type: &str) -> Vec<(String, Callback)> {
        self.entries()
            .iter()
            .filter(|(_, entry)| entry.topic.matches(event_type))
            .flat_map(|(raw, entry)| {
                entry
                    .callbacks
                    .iter()
                    .map(move |(_, cb)| (raw.clone(), Arc::clone(cb)))
            })
            .collect()
    }

    /// The raw topic strings currently subscribed. Used to replay after reconnect.
    pub fn active_topics(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.entries().contains_key(topic)
    }

    /// Number of callbacks registered on `topic`.
    pub fn callback_count(&self, topic: &str) -> usize {
        self.entries().get(topic).map_or(0, |e| e.callbacks.len())
    }

    /// Drop every topic and callback.
    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Number of active topics.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if there are no active topics.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("topics", &self.active_topics())
            .finish()
    }
}
