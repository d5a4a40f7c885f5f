use super::feed::{next_of, Feed, FeedError, Item};
use futures::stream::{self, SelectAll, StreamExt};
use std::time::Duration;
use tokio::time::Instant;

/// Emits `f(a, b)` whenever either input changes, once both have a value.
pub fn combine_latest2<A, B, U, F>(a: Feed<A>, b: Feed<B>, f: F) -> Feed<U>
where
    A: Item,
    B: Item,
    U: Item,
    F: Fn(&A, &B) -> U + Send + Sync + 'static,
{
    let (mut a, mut b) = (a, b);
    Feed::produce(move |out| async move {
        let (mut last_a, mut last_b) = (None, None);
        let (mut a_done, mut b_done) = (false, false);
        loop {
            tokio::select! {
                item = a.next(), if !a_done => match item {
                    Some(Ok(value)) => last_a = Some(value),
                    Some(Err(err)) => return out.fail(err),
                    None if last_a.is_none() => return,
                    None => a_done = true,
                },
                item = b.next(), if !b_done => match item {
                    Some(Ok(value)) => last_b = Some(value),
                    Some(Err(err)) => return out.fail(err),
                    None if last_b.is_none() => return,
                    None => b_done = true,
                },
                else => return,
            }
            if let (Some(a), Some(b)) = (&last_a, &last_b) {
                out.publish(f(a, b));
            }
        }
    })
}

pub fn combine_latest3<A, B, C, U, F>(a: Feed<A>, b: Feed<B>, c: Feed<C>, f: F) -> Feed<U>
where
    A: Item,
    B: Item,
    C: Item,
    U: Item,
    F: Fn(&A, &B, &C) -> U + Send + Sync + 'static,
{
    let ab = combine_latest2(a, b, |a, b| (a.clone(), b.clone()));
    combine_latest2(ab, c, move |(a, b), c| f(a, b, c))
}

/// Combines a dynamic set of feeds into one vector, in input order.
///
/// An empty input yields an empty vector and completes.
pub fn combine_all<T: Item>(feeds: Vec<Feed<T>>) -> Feed<Vec<T>> {
    if feeds.is_empty() {
        return Feed::constant(Vec::new());
    }
    let total = feeds.len();
    Feed::produce(move |out| async move {
        let mut merged: SelectAll<_> = stream::select_all(feeds.into_iter().enumerate().map(
            |(index, feed)| {
                stream::unfold(feed, |mut feed| async move {
                    let item = feed.next().await?;
                    Some((item, feed))
                })
                .map(move |item| (index, item))
                .boxed()
            },
        ));
        let mut latest: Vec<Option<T>> = vec![None; total];
        while let Some((index, item)) = merged.next().await {
            match item {
                Ok(value) => latest[index] = Some(value),
                Err(err) => return out.fail(err),
            }
            if latest.iter().all(Option::is_some) {
                out.publish(latest.iter().flatten().cloned().collect());
            }
        }
    })
}

/// Ticks immediately, then every `period`.
pub fn interval(period: Duration) -> Feed<u64> {
    Feed::produce(move |out| async move {
        let mut ticker = tokio::time::interval(period);
        let mut count = 0u64;
        loop {
            ticker.tick().await;
            out.publish(count);
            count += 1;
        }
    })
}

impl<T: Item> Feed<T> {
    /// Maps every value to an inner feed and mirrors the most recent one,
    /// dropping the previous inner subscription on each new value.
    pub fn switch_map<U, F>(self, f: F) -> Feed<U>
    where
        U: Item,
        F: Fn(T) -> Feed<U> + Send + Sync + 'static,
    {
        let mut outer = self;
        Feed::produce(move |out| async move {
            let mut inner: Option<Feed<U>> = None;
            let mut outer_done = false;
            loop {
                tokio::select! {
                    item = outer.next(), if !outer_done => match item {
                        Some(Ok(value)) => inner = Some(f(value)),
                        Some(Err(err)) => return out.fail(err),
                        None if inner.is_none() => return,
                        None => outer_done = true,
                    },
                    item = next_of(&mut inner) => match item {
                        Some(Ok(value)) => {
                            out.publish(value);
                        }
                        Some(Err(err)) => return out.fail(err),
                        None if outer_done => return,
                        None => inner = None,
                    },
                }
            }
        })
    }

    /// Emits a value only after `quiet` has passed without a newer one.
    /// A pending value is flushed when the input completes.
    pub fn debounce(self, quiet: Duration) -> Feed<T> {
        let mut input = self;
        Feed::produce(move |out| async move {
            let mut pending: Option<T> = None;
            let mut deadline = Instant::now();
            loop {
                tokio::select! {
                    item = input.next() => match item {
                        Some(Ok(value)) => {
                            pending = Some(value);
                            deadline = Instant::now() + quiet;
                        }
                        Some(Err(err)) => return out.fail(err),
                        None => {
                            if let Some(value) = pending.take() {
                                out.publish(value);
                            }
                            return;
                        }
                    },
                    _ = tokio::time::sleep_until(deadline), if pending.is_some() => {
                        if let Some(value) = pending.take() {
                            out.publish(value);
                        }
                    }
                }
            }
        })
    }

    /// Keeps only the values for which `predicate` holds.
    pub fn filter<P>(self, predicate: P) -> Feed<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter_map(move |value| predicate(&value).then_some(value))
    }
}
