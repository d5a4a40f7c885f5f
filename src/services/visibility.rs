use crate::rx::{Feed, Item, Subject};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Visibility plus a counter bumped on every change, so an off-then-on pair
/// that lands between two reads still shows up as a new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VisibilityState {
    generation: u64,
    visible: bool,
}

/// Whether the dashboard is currently on screen. Starts visible.
#[derive(Clone)]
pub struct VisibilitySignal {
    state: Subject<VisibilityState>,
    write: Arc<Mutex<()>>,
}

impl Default for VisibilitySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilitySignal {
    pub fn new() -> Self {
        Self {
            state: Subject::new(VisibilityState {
                generation: 0,
                visible: true,
            }),
            write: Arc::new(Mutex::new(())),
        }
    }

    pub fn set_visible(&self, visible: bool) {
        let _write = self.write.lock();
        let current = self.current();
        if current.visible != visible {
            self.state.next(VisibilityState {
                generation: current.generation + 1,
                visible,
            });
        }
    }

    pub fn is_visible(&self) -> bool {
        self.current().visible
    }

    /// Distinct visibility changes, starting with the current state.
    pub fn feed(&self) -> Feed<bool> {
        self.state.feed().map(|state| state.visible)
    }

    fn current(&self) -> VisibilityState {
        self.state.value().unwrap_or(VisibilityState {
            generation: 0,
            visible: true,
        })
    }
}

/// Mirrors `factory()` while visible. Hiding drops the subscription, and each
/// return to visible subscribes once more. A replayed value equal to the last
/// one forwarded is not delivered again.
pub fn pause_when_invisible<T, F>(signal: &VisibilitySignal, factory: F) -> Feed<T>
where
    T: Item,
    F: Fn() -> Feed<T> + Send + Sync + 'static,
{
    let mut states = signal.state.feed();
    Feed::produce(move |out| async move {
        let mut source: Option<Feed<T>> = None;
        let mut subscribed_at = 0;
        let mut visible_done = false;
        loop {
            tokio::select! {
                item = states.next(), if !visible_done => match item {
                    Some(Ok(VisibilityState { generation, visible: true })) => {
                        // A newer generation means a hidden state came in between.
                        if source.is_none() || subscribed_at != generation {
                            debug!(generation, "visible, subscribing");
                            source = Some(factory());
                            subscribed_at = generation;
                        }
                    }
                    Some(Ok(VisibilityState { visible: false, .. })) => {
                        if source.take().is_some() {
                            debug!("hidden, dropping subscription");
                        }
                    }
                    _ => {
                        visible_done = true;
                        if source.is_none() {
                            return;
                        }
                    }
                },
                item = crate::rx::next_of(&mut source) => match item {
                    Some(Ok(value)) => {
                        out.publish(value);
                    }
                    Some(Err(err)) => return out.fail(err),
                    None => return,
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rx::channel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_resubscribes_once_per_return_to_visible() {
        let signal = VisibilitySignal::new();
        let (publisher, _keep) = channel::<u32>();
        publisher.publish(1);
        let subscriptions = Arc::new(AtomicUsize::new(0));

        let counter = subscriptions.clone();
        let source = publisher.clone();
        let mut gated = pause_when_invisible(&signal, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            source.subscribe()
        });
        assert_eq!(gated.next().await, Some(Ok(1)));
        assert_eq!(subscriptions.load(Ordering::SeqCst), 1);

        signal.set_visible(false);
        settle().await;
        publisher.publish(2);
        assert!(tokio::time::timeout(Duration::from_millis(20), gated.next()).await.is_err());

        signal.set_visible(true);
        signal.set_visible(true);
        assert_eq!(gated.next().await, Some(Ok(2)));
        assert_eq!(subscriptions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_back_to_back_hide_and_show_resubscribes() {
        let signal = VisibilitySignal::new();
        let (publisher, _keep) = channel::<u32>();
        publisher.publish(1);
        let subscriptions = Arc::new(AtomicUsize::new(0));

        let counter = subscriptions.clone();
        let source = publisher.clone();
        let mut gated = pause_when_invisible(&signal, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            source.subscribe()
        });
        assert_eq!(gated.next().await, Some(Ok(1)));

        signal.set_visible(false);
        signal.set_visible(true);
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(subscriptions.load(Ordering::SeqCst), 2);
        assert!(signal.is_visible());

        signal.set_visible(true);
        settle().await;
        assert_eq!(subscriptions.load(Ordering::SeqCst), 2);

        publisher.publish(2);
        assert_eq!(gated.next().await, Some(Ok(2)));
    }

    #[tokio::test]
    async fn test_feed_reports_distinct_visibility() {
        let signal = VisibilitySignal::new();
        let mut feed = signal.feed();
        assert_eq!(feed.next().await, Some(Ok(true)));

        signal.set_visible(false);
        assert_eq!(feed.next().await, Some(Ok(false)));
        assert!(!signal.is_visible());
    }

    #[tokio::test]
    async fn test_equal_replay_is_suppressed() {
        let signal = VisibilitySignal::new();
        let (publisher, _keep) = channel::<u32>();
        publisher.publish(7);
        let source = publisher.clone();
        let mut gated = pause_when_invisible(&signal, move || source.subscribe());
        assert_eq!(gated.next().await, Some(Ok(7)));

        signal.set_visible(false);
        settle().await;
        signal.set_visible(true);
        assert!(tokio::time::timeout(Duration::from_millis(20), gated.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_completion_and_failure_are_forwarded() {
        let signal = VisibilitySignal::new();
        let mut done = pause_when_invisible(&signal, || Feed::constant(3u32));
        assert_eq!(done.next().await, Some(Ok(3)));
        assert_eq!(done.next().await, None);

        let mut failed = pause_when_invisible(&signal, || {
            Feed::<u32>::failed(crate::rx::FeedError::new("gone"))
        });
        assert!(matches!(failed.next().await, Some(Err(_))));
    }
}
