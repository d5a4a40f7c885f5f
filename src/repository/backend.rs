use super::error::RepositoryResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

/// Storage for one JSON tree addressed by path segments.
///
/// Writing `null` removes a location, and a location whose children are all
/// gone disappears with them.
#[async_trait]
pub trait TreeBackend: Send + Sync {
    async fn get(&self, path: &[String]) -> RepositoryResult<Option<Value>>;

    async fn set(&self, path: &[String], value: Value) -> RepositoryResult<()>;

    async fn remove(&self, path: &[String]) -> RepositoryResult<()> {
        self.set(path, Value::Null).await
    }
}

/// Drops nulls and empty objects, and stores arrays as index-keyed objects.
/// Returns `None` when nothing is left.
pub(crate) fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Array(items) => {
            let map: Map<String, Value> = items
                .into_iter()
                .enumerate()
                .filter_map(|(index, item)| normalize(item).map(|item| (index.to_string(), item)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, child)| normalize(child).map(|child| (key, child)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        leaf => Some(leaf),
    }
}

fn lookup<'a>(node: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(node, |node, key| node.as_object()?.get(key))
}

fn is_empty(node: &Value) -> bool {
    node.is_null() || node.as_object().is_some_and(Map::is_empty)
}

fn set_in(node: &mut Value, path: &[String], value: Option<Value>) {
    let Some((head, rest)) = path.split_first() else {
        *node = value.unwrap_or(Value::Null);
        return;
    };
    if !node.is_object() {
        if value.is_none() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };
    if rest.is_empty() {
        match value {
            Some(value) => {
                map.insert(head.clone(), value);
            }
            None => {
                map.remove(head);
            }
        }
        return;
    }

    let child = map.entry(head.clone()).or_insert(Value::Null);
    set_in(child, rest, value);
    if is_empty(child) {
        map.remove(head);
    }
}

/// In-process tree, used by tests and short-lived CLI runs.
#[derive(Default)]
pub struct MemoryBackend {
    root: RwLock<Value>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(tree: Value) -> Self {
        Self {
            root: RwLock::new(normalize(tree).unwrap_or(Value::Null)),
        }
    }
}

#[async_trait]
impl TreeBackend for MemoryBackend {
    async fn get(&self, path: &[String]) -> RepositoryResult<Option<Value>> {
        let root = self.root.read();
        Ok(lookup(&root, path)
            .filter(|node| !is_empty(node))
            .cloned())
    }

    async fn set(&self, path: &[String], value: Value) -> RepositoryResult<()> {
        let mut root = self.root.write();
        set_in(&mut root, path, normalize(value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> Vec<String> {
        p.split('/').map(str::to_string).collect()
    }

    #[tokio::test]
    async fn test_set_and_get_subtree() {
        let backend = MemoryBackend::new();
        backend.set(&path("v2/pool/latest/a"), json!({"pool": "nicehash"})).await.unwrap();
        backend.set(&path("v2/pool/latest/b"), json!({"pool": "ahashpool"})).await.unwrap();

        let latest = backend.get(&path("v2/pool/latest")).await.unwrap().unwrap();
        assert_eq!(latest.as_object().unwrap().len(), 2);
        assert_eq!(
            backend.get(&path("v2/pool/latest/a/pool")).await.unwrap(),
            Some(json!("nicehash"))
        );
    }

    #[tokio::test]
    async fn test_remove_prunes_empty_parents() {
        let backend = MemoryBackend::new();
        backend.set(&path("v2/user/u1/bookmarks/pools/k"), json!({"pool": "nicehash"})).await.unwrap();
        backend.remove(&path("v2/user/u1/bookmarks/pools/k")).await.unwrap();

        assert_eq!(backend.get(&path("v2/user/u1")).await.unwrap(), None);
        assert_eq!(backend.get(&[]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_objects_read_as_absent() {
        let backend = MemoryBackend::new();
        backend.set(&path("v2/user/u1/pool-wallet"), json!({})).await.unwrap();
        assert_eq!(backend.get(&path("v2/user/u1/pool-wallet")).await.unwrap(), None);
    }

    #[test]
    fn test_normalize_arrays_become_indexed_objects() {
        let normalized = normalize(json!([1, null, {"a": null}, 4])).unwrap();
        assert_eq!(normalized, json!({"0": 1, "3": 4}));
    }
}
