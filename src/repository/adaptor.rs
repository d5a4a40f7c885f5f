use super::error::{RepositoryError, RepositoryResult};
use super::paths::{ListPath, ObjectPath};
use super::realtime::RealtimeDatabase;
use crate::rx::{Feed, FeedError, Item};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Keep only the last `n` children in list order.
    pub limit_to_last: Option<usize>,
    /// Order by each child's `.priority` before its key.
    pub order_by_priority: bool,
}

impl ListOptions {
    pub fn last(n: usize) -> Self {
        Self {
            limit_to_last: Some(n),
            ..Self::default()
        }
    }

    pub fn by_priority(mut self) -> Self {
        self.order_by_priority = true;
        self
    }
}

/// Integer-like keys first in numeric order, then the rest lexicographically.
fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[derive(Debug, PartialEq, PartialOrd)]
enum Priority<'a> {
    Missing,
    Number(f64),
    Text(&'a str),
}

fn priority(value: &Value) -> Priority<'_> {
    match value.get(".priority") {
        Some(Value::Number(n)) => n.as_f64().map_or(Priority::Missing, Priority::Number),
        Some(Value::String(s)) => Priority::Text(s),
        _ => Priority::Missing,
    }
}

fn ordered_children(value: Option<Value>, options: ListOptions) -> Vec<(String, Value)> {
    let Some(Value::Object(map)) = value else {
        return Vec::new();
    };
    let mut children: Vec<(String, Value)> = map.into_iter().collect();
    children.sort_by(|(ka, va), (kb, vb)| {
        let by_priority = if options.order_by_priority {
            priority(va)
                .partial_cmp(&priority(vb))
                .unwrap_or(Ordering::Equal)
        } else {
            Ordering::Equal
        };
        by_priority.then_with(|| compare_keys(ka, kb))
    });
    if let Some(limit) = options.limit_to_last {
        let skip = children.len().saturating_sub(limit);
        children.drain(..skip);
    }
    children
}

fn decode_children<T: DeserializeOwned>(
    location: &str,
    value: Option<Value>,
    options: ListOptions,
) -> Vec<(String, T)> {
    ordered_children(value, options)
        .into_iter()
        .filter_map(|(key, child)| match serde_json::from_value(child) {
            Ok(record) => Some((key, record)),
            Err(err) => {
                warn!(path = %location, key = %key, error = %err, "skipping undecodable child");
                None
            }
        })
        .collect()
}

/// Typed access to the realtime tree.
#[derive(Clone)]
pub struct DatabaseAdaptor {
    db: RealtimeDatabase,
}

impl DatabaseAdaptor {
    pub fn new(db: RealtimeDatabase) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &RealtimeDatabase {
        &self.db
    }

    pub fn list<T>(&self, path: &ListPath<T>, options: ListOptions) -> Feed<Vec<T>>
    where
        T: DeserializeOwned + Item,
    {
        self.list_entries(path, options)
            .map(|entries| entries.into_iter().map(|(_, record)| record).collect())
    }

    /// Like [`list`](Self::list) but keeps each child's key.
    pub fn list_entries<T>(&self, path: &ListPath<T>, options: ListOptions) -> Feed<Vec<(String, T)>>
    where
        T: DeserializeOwned + Item,
    {
        let location = path.as_string();
        self.db
            .watch(path.segments())
            .map(move |value| decode_children(&location, value, options))
    }

    /// `None` while nothing is stored; undecodable data fails the feed.
    pub fn object<T>(&self, path: &ObjectPath<T>) -> Feed<Option<T>>
    where
        T: DeserializeOwned + Item,
    {
        let location = path.as_string();
        self.db.watch(path.segments()).try_map(move |value| match value {
            None => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|source| {
                let err = RepositoryError::Decode {
                    path: location.clone(),
                    source,
                };
                warn!(error = %err, "object decode failed");
                FeedError::new(err.to_string())
            }),
        })
    }

    pub async fn set_object<T: Serialize>(&self, path: &ObjectPath<T>, value: &T) -> RepositoryResult<()> {
        self.db.set(path.segments(), serde_json::to_value(value)?).await
    }

    /// Appends `value` to the list and returns its new key.
    pub async fn insert_object<T: Serialize>(&self, path: &ListPath<T>, value: &T) -> RepositoryResult<String> {
        self.db.push(path.segments(), serde_json::to_value(value)?).await
    }

    pub async fn remove_object<T>(&self, path: &ObjectPath<T>) -> RepositoryResult<()> {
        self.db.remove(path.segments()).await
    }
}
