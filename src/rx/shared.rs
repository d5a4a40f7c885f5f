use super::feed::{channel, spawn_producer, Feed, Item, Publisher, Release};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Keyed registry of shared producers.
///
/// Producers are started lazily on the first request for a key. Every later
/// request for the same key gets a handle onto that producer. When the last
/// handle for a key is dropped the producer stops and the key is forgotten,
/// so at most one producer per key is ever live. Clone-able via internal Arc.
pub struct SharedFeeds<K, T> {
    entries: Arc<Mutex<HashMap<K, Publisher<T>>>>,
}

impl<K, T> Clone for SharedFeeds<K, T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<K, T> Default for SharedFeeds<K, T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, T> SharedFeeds<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    T: Item,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle onto the producer for `key`, starting it with `body`
    /// when none is live.
    pub fn get_or_start<F, Fut>(&self, key: K, body: F) -> Feed<T>
    where
        F: FnOnce(Publisher<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut entries = self.entries.lock();
        if let Some(publisher) = entries.get(&key) {
            debug!(key = ?key, "reusing shared feed");
            return publisher.subscribe();
        }

        debug!(key = ?key, "starting shared feed");
        let (publisher, feed) = channel();
        entries.insert(key.clone(), publisher.clone());
        drop(entries);

        let registry = self.entries.clone();
        let owner = publisher.clone();
        spawn_producer(publisher, body, move |reason| {
            let mut entries = registry.lock();
            // Handles are only ever created under this lock, so a zero count
            // here cannot race with a new request.
            if reason == Release::Idle && owner.receiver_count() > 0 {
                return false;
            }
            if entries
                .get(&key)
                .is_some_and(|current| current.same_channel(&owner))
            {
                entries.remove(&key);
                debug!(key = ?key, reason = ?reason, "released shared feed");
            }
            true
        });
        feed
    }

    /// Shares the feed built by `source` under `key`.
    pub fn share<F>(&self, key: K, source: F) -> Feed<T>
    where
        F: FnOnce() -> Feed<T>,
    {
        self.get_or_start(key, move |out| {
            let feed = source();
            async move { feed.forward(&out).await }
        })
    }

    /// Number of live producers.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }
}
