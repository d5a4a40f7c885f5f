use super::backend::TreeBackend;
use super::error::RepositoryResult;
use crate::rx::{Feed, FeedError};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

const CHANGE_CAPACITY: usize = 256;

/// Tree database that notifies watchers of every write touching their path.
///
/// Clone-able via internal Arc.
#[derive(Clone)]
pub struct RealtimeDatabase {
    backend: Arc<dyn TreeBackend>,
    changes: broadcast::Sender<Vec<String>>,
    live_watches: Arc<AtomicUsize>,
    total_watches: Arc<AtomicUsize>,
    last_push: Arc<Mutex<i64>>,
}

/// True when a write at `changed` can alter the value at `watched`.
fn overlaps(changed: &[String], watched: &[String]) -> bool {
    changed.iter().zip(watched).all(|(a, b)| a == b)
}

struct WatchGuard {
    live: Arc<AtomicUsize>,
    path: String,
}

impl WatchGuard {
    fn start(db: &RealtimeDatabase, path: &[String]) -> Self {
        db.live_watches.fetch_add(1, Ordering::SeqCst);
        db.total_watches.fetch_add(1, Ordering::SeqCst);
        let path = path.join("/");
        debug!(path = %path, "backend watch started");
        Self {
            live: db.live_watches.clone(),
            path,
        }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        debug!(path = %self.path, "backend watch stopped");
    }
}

impl RealtimeDatabase {
    pub fn new(backend: Arc<dyn TreeBackend>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            backend,
            changes,
            live_watches: Arc::new(AtomicUsize::new(0)),
            total_watches: Arc::new(AtomicUsize::new(0)),
            last_push: Arc::new(Mutex::new(0)),
        }
    }

    /// Current value at `path` followed by its value after every relevant write.
    pub fn watch(&self, path: &[String]) -> Feed<Option<Value>> {
        let db = self.clone();
        let path = path.to_vec();
        Feed::produce(move |out| async move {
            let _guard = WatchGuard::start(&db, &path);
            // Subscribe before the first read so no write slips between them.
            let mut changes = db.changes.subscribe();
            loop {
                match db.backend.get(&path).await {
                    Ok(value) => {
                        out.publish(value);
                    }
                    Err(err) => {
                        warn!(path = %path.join("/"), error = %err, "backend read failed");
                        out.fail(FeedError::new(err.to_string()));
                        return;
                    }
                }

                loop {
                    match changes.recv().await {
                        Ok(changed) if overlaps(&changed, &path) => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "change stream lagged, re-reading");
                            break;
                        }
                        Err(RecvError::Closed) => return,
                    }
                }
            }
        })
    }

    pub async fn get(&self, path: &[String]) -> RepositoryResult<Option<Value>> {
        self.backend.get(path).await
    }

    pub async fn set(&self, path: &[String], value: Value) -> RepositoryResult<()> {
        self.backend.set(path, value).await?;
        self.notify(path);
        Ok(())
    }

    /// Writes several children of `path` and notifies once.
    pub async fn update(&self, path: &[String], children: Map<String, Value>) -> RepositoryResult<()> {
        let mut written = Ok(());
        for (key, value) in children {
            let mut child = path.to_vec();
            child.push(key);
            written = self.backend.set(&child, value).await;
            if written.is_err() {
                break;
            }
        }
        // Children written before a failure stay written, so watchers still hear.
        self.notify(path);
        written
    }

    /// Stores `value` under a fresh child key of `path` and returns the key.
    /// Keys sort in creation order.
    pub async fn push(&self, path: &[String], value: Value) -> RepositoryResult<String> {
        let key = self.next_push_key();
        let mut child = path.to_vec();
        child.push(key.clone());
        self.set(&child, value).await?;
        Ok(key)
    }

    pub async fn remove(&self, path: &[String]) -> RepositoryResult<()> {
        self.backend.remove(path).await?;
        self.notify(path);
        Ok(())
    }

    pub fn live_watches(&self) -> usize {
        self.live_watches.load(Ordering::SeqCst)
    }

    pub fn total_watches(&self) -> usize {
        self.total_watches.load(Ordering::SeqCst)
    }

    fn notify(&self, path: &[String]) {
        // No receivers just means nobody is watching.
        let _ = self.changes.send(path.to_vec());
    }

    fn next_push_key(&self) -> String {
        let mut last = self.last_push.lock();
        let now = chrono::Utc::now().timestamp_micros();
        let stamp = now.max(*last + 1);
        *last = stamp;
        let suffix = Uuid::new_v4().simple().to_string();
        format!("-{:016x}{}", stamp, &suffix[..6])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::backend::MemoryBackend;
    use crate::repository::error::RepositoryError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    /// Memory tree that refuses writes to any path ending in `key`.
    struct RefusingBackend {
        inner: MemoryBackend,
        key: &'static str,
    }

    #[async_trait]
    impl TreeBackend for RefusingBackend {
        async fn get(&self, path: &[String]) -> RepositoryResult<Option<Value>> {
            self.inner.get(path).await
        }

        async fn set(&self, path: &[String], value: Value) -> RepositoryResult<()> {
            if path.last().map(String::as_str) == Some(self.key) {
                return Err(RepositoryError::Backend(format!("refused {}", path.join("/"))));
            }
            self.inner.set(path, value).await
        }
    }

    fn path(p: &str) -> Vec<String> {
        p.split('/').map(str::to_string).collect()
    }

    fn setup() -> RealtimeDatabase {
        RealtimeDatabase::new(Arc::new(MemoryBackend::new()))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_watch_emits_current_then_changes() {
        let db = setup();
        db.set(&path("v2/pool/latest/a"), json!(1)).await.unwrap();

        let mut feed = db.watch(&path("v2/pool/latest"));
        assert_eq!(feed.next().await, Some(Ok(Some(json!({"a": 1})))));

        db.set(&path("v2/pool/latest/b"), json!(2)).await.unwrap();
        assert_eq!(feed.next().await, Some(Ok(Some(json!({"a": 1, "b": 2})))));

        db.remove(&path("v2/pool")).await.unwrap();
        assert_eq!(feed.next().await, Some(Ok(None)));
    }

    #[tokio::test]
    async fn test_unrelated_writes_are_ignored() {
        let db = setup();
        let mut feed = db.watch(&path("v2/user/u1"));
        assert_eq!(feed.next().await, Some(Ok(None)));

        db.set(&path("v2/user/u2/defaults/rig-profile"), json!("p")).await.unwrap();
        let next = tokio::time::timeout(Duration::from_millis(50), feed.next()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn test_watch_released_with_last_handle() {
        let db = setup();
        let feed = db.watch(&path("v2"));
        let copy = feed.clone();
        settle().await;
        assert_eq!(db.live_watches(), 1);

        drop(feed);
        settle().await;
        assert_eq!(db.live_watches(), 1);

        drop(copy);
        settle().await;
        assert_eq!(db.live_watches(), 0);
        assert_eq!(db.total_watches(), 1);
    }

    #[tokio::test]
    async fn test_push_keys_are_ordered() {
        let db = setup();
        let first = db.push(&path("v2/list"), json!("a")).await.unwrap();
        let second = db.push(&path("v2/list"), json!("b")).await.unwrap();
        assert!(first < second);
        assert_eq!(first.len(), 23);
        assert!(first.starts_with('-'));
    }

    #[tokio::test]
    async fn test_update_merges_children() {
        let db = setup();
        db.set(&path("v2/user/u1/pool-wallet/nicehash/BTC"), json!("n")).await.unwrap();
        let mut children = Map::new();
        children.insert("ahashpool".to_string(), json!({"BTC": "a"}));
        db.update(&path("v2/user/u1/pool-wallet"), children).await.unwrap();

        assert_eq!(
            db.get(&path("v2/user/u1/pool-wallet")).await.unwrap(),
            Some(json!({"nicehash": {"BTC": "n"}, "ahashpool": {"BTC": "a"}}))
        );
    }

    #[tokio::test]
    async fn test_partial_update_still_notifies_watchers() {
        let db = RealtimeDatabase::new(Arc::new(RefusingBackend {
            inner: MemoryBackend::new(),
            key: "zpool",
        }));
        let mut feed = db.watch(&path("v2/user/u1/pool-wallet"));
        assert_eq!(feed.next().await, Some(Ok(None)));

        let mut children = Map::new();
        children.insert("ahashpool".to_string(), json!({"BTC": "a"}));
        children.insert("zpool".to_string(), json!({"BTC": "z"}));
        let result = db.update(&path("v2/user/u1/pool-wallet"), children).await;
        assert!(matches!(result, Err(RepositoryError::Backend(_))));

        let next = tokio::time::timeout(Duration::from_millis(200), feed.next()).await;
        assert_eq!(next.unwrap(), Some(Ok(Some(json!({"ahashpool": {"BTC": "a"}})))));
    }
}
