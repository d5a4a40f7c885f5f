use super::feed::{channel, Feed, Item, Publisher};

/// Holds a current value and replays it to every new feed.
pub struct Subject<T> {
    publisher: Publisher<T>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            publisher: self.publisher.clone(),
        }
    }
}

impl<T: Item> Subject<T> {
    pub fn new(initial: T) -> Self {
        let (publisher, _) = channel();
        publisher.publish(initial);
        Self { publisher }
    }

    pub fn next(&self, value: T) {
        self.publisher.publish(value);
    }

    pub fn value(&self) -> Option<T> {
        self.publisher.value()
    }

    pub fn feed(&self) -> Feed<T> {
        self.publisher.subscribe()
    }
}
