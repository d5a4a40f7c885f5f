//! Replayed, reference-counted feeds and the operators used to wire them.

mod feed;
mod operators;
mod shared;
mod subject;

pub use feed::{channel, Feed, FeedError, Item, Publisher, Release};
pub(crate) use feed::next_of;
pub use operators::{combine_all, combine_latest2, combine_latest3, interval};
pub use shared::SharedFeeds;
pub use subject::Subject;
