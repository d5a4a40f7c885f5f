use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::trace;

/// Bound shared by every value that travels through a feed.
pub trait Item: Clone + PartialEq + Send + Sync + 'static {}

impl<T> Item for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// Failure delivered in-band to every consumer of a feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FeedError {
    message: Arc<str>,
}

impl FeedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Arc::from(message.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<anyhow::Error> for FeedError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

#[derive(Debug, Clone)]
enum Signal<T> {
    Pending,
    Value(T),
    Failed(FeedError),
}

#[derive(Debug)]
struct ChannelTag;

/// Write side of a feed. Cloning shares the same channel; the feed completes
/// once every publisher clone is gone.
pub struct Publisher<T> {
    tx: Arc<watch::Sender<Signal<T>>>,
    tag: Arc<ChannelTag>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            tag: self.tag.clone(),
        }
    }
}

impl<T: Item> Publisher<T> {
    /// Publishes `value` unless it equals the value consumers already hold.
    pub fn publish(&self, value: T) -> bool {
        self.tx.send_if_modified(|signal| {
            if matches!(signal, Signal::Value(current) if *current == value) {
                return false;
            }
            *signal = Signal::Value(value);
            true
        })
    }

    pub fn fail(&self, err: FeedError) {
        self.tx.send_replace(Signal::Failed(err));
    }

    pub fn subscribe(&self) -> Feed<T> {
        Feed::from_parts(self.tx.subscribe(), self.tag.clone())
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn same_channel(&self, other: &Publisher<T>) -> bool {
        Arc::ptr_eq(&self.tag, &other.tag)
    }

    /// Resolves once no consumer holds a handle to this channel.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn value(&self) -> Option<T> {
        match &*self.tx.borrow() {
            Signal::Value(value) => Some(value.clone()),
            _ => None,
        }
    }
}

/// Creates a publisher and its first consumer handle.
pub fn channel<T: Item>() -> (Publisher<T>, Feed<T>) {
    let (tx, rx) = watch::channel(Signal::Pending);
    let tag = Arc::new(ChannelTag);
    let feed = Feed::from_parts(rx, tag.clone());
    (
        Publisher {
            tx: Arc::new(tx),
            tag,
        },
        feed,
    )
}

/// Why a producer is being asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The last consumer went away.
    Idle,
    /// The producer body ran to completion.
    Finished,
}

/// Runs `body` on the runtime until it finishes or until `release(Release::Idle)`
/// agrees to stop after the last consumer left.
pub(crate) fn spawn_producer<T, F, Fut, R>(publisher: Publisher<T>, body: F, release: R)
where
    T: Item,
    F: FnOnce(Publisher<T>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
    R: Fn(Release) -> bool + Send + 'static,
{
    let watcher = publisher.clone();
    let body = body(publisher);
    tokio::spawn(async move {
        tokio::pin!(body);
        loop {
            tokio::select! {
                _ = &mut body => {
                    release(Release::Finished);
                    break;
                }
                _ = watcher.closed() => {
                    if release(Release::Idle) {
                        trace!("producer released after last consumer dropped");
                        break;
                    }
                }
            }
        }
    });
}

/// A replayed, reference-counted stream of values.
///
/// Every handle sees the latest value first, then each later change. The
/// producer behind a feed stops as soon as the last handle is dropped.
/// Consecutive equal values are never delivered twice.
pub struct Feed<T> {
    rx: watch::Receiver<Signal<T>>,
    tag: Arc<ChannelTag>,
    replayed: bool,
    failed: bool,
}

impl<T> Clone for Feed<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            tag: self.tag.clone(),
            replayed: false,
            failed: false,
        }
    }
}

impl<T> std::fmt::Debug for Feed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("channel", &Arc::as_ptr(&self.tag))
            .finish()
    }
}

impl<T: Item> Feed<T> {
    fn from_parts(rx: watch::Receiver<Signal<T>>, tag: Arc<ChannelTag>) -> Self {
        Self {
            rx,
            tag,
            replayed: false,
            failed: false,
        }
    }

    /// Spawns a producer task that owns the returned feed's channel.
    pub fn produce<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Publisher<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (publisher, feed) = channel();
        spawn_producer(publisher, body, |_| true);
        feed
    }

    /// A feed holding `value` that completes right after delivering it.
    pub fn constant(value: T) -> Self {
        let (publisher, feed) = channel();
        publisher.publish(value);
        feed
    }

    /// A feed that fails immediately.
    pub fn failed(err: FeedError) -> Self {
        let (publisher, feed) = channel();
        publisher.fail(err);
        feed
    }

    /// A feed that never emits and never completes.
    pub fn never() -> Self {
        Self::produce(|_out| std::future::pending())
    }

    /// Resolves `future` on the runtime and delivers its output once.
    pub fn from_future<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::produce(move |out| async move {
            out.publish(future.await);
        })
    }

    /// Waits for the next value. `None` means the feed completed.
    pub async fn next(&mut self) -> Option<Result<T, FeedError>> {
        if self.failed {
            return None;
        }
        if !self.replayed {
            self.replayed = true;
            let signal = self.rx.borrow_and_update().clone();
            if let Some(item) = self.accept(signal) {
                return Some(item);
            }
        }
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            let signal = self.rx.borrow_and_update().clone();
            if let Some(item) = self.accept(signal) {
                return Some(item);
            }
        }
    }

    fn accept(&mut self, signal: Signal<T>) -> Option<Result<T, FeedError>> {
        match signal {
            Signal::Pending => None,
            Signal::Value(value) => Some(Ok(value)),
            Signal::Failed(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }

    /// Waits for the first value and drops the handle.
    pub async fn first(mut self) -> Option<Result<T, FeedError>> {
        self.next().await
    }

    /// The value a new consumer would be replayed, if any.
    pub fn latest(&self) -> Option<T> {
        match &*self.rx.borrow() {
            Signal::Value(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// True when both handles read from the same producer.
    pub fn same_source(&self, other: &Feed<T>) -> bool {
        Arc::ptr_eq(&self.tag, &other.tag)
    }

    /// Forwards every value, failure and the completion into `out`.
    pub async fn forward(mut self, out: &Publisher<T>) {
        while let Some(item) = self.next().await {
            match item {
                Ok(value) => {
                    out.publish(value);
                }
                Err(err) => {
                    out.fail(err);
                    return;
                }
            }
        }
    }

    pub fn try_map<U, F>(self, f: F) -> Feed<U>
    where
        U: Item,
        F: Fn(T) -> Result<U, FeedError> + Send + Sync + 'static,
    {
        let mut input = self;
        Feed::produce(move |out| async move {
            while let Some(item) = input.next().await {
                match item.and_then(&f) {
                    Ok(value) => {
                        out.publish(value);
                    }
                    Err(err) => {
                        out.fail(err);
                        return;
                    }
                }
            }
        })
    }

    pub fn map<U, F>(self, f: F) -> Feed<U>
    where
        U: Item,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.try_map(move |value| Ok(f(value)))
    }

    /// Keeps the values for which `f` returns `Some`.
    pub fn filter_map<U, F>(self, f: F) -> Feed<U>
    where
        U: Item,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let mut input = self;
        Feed::produce(move |out| async move {
            while let Some(item) = input.next().await {
                match item {
                    Ok(value) => {
                        if let Some(mapped) = f(value) {
                            out.publish(mapped);
                        }
                    }
                    Err(err) => {
                        out.fail(err);
                        return;
                    }
                }
            }
        })
    }
}

/// Awaits the next item of an optional feed; pends forever when there is none.
pub(crate) async fn next_of<T: Item>(feed: &mut Option<Feed<T>>) -> Option<Result<T, FeedError>> {
    match feed {
        Some(feed) => feed.next().await,
        None => std::future::pending().await,
    }
}
