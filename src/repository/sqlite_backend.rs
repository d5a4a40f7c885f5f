use super::backend::{normalize, TreeBackend};
use super::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::debug;

/// Tree stored in SQLite with one row per leaf, keyed by its slash path.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: Arc<SqlitePool>,
}

fn flatten(prefix: &str, value: Value, rows: &mut Vec<(String, String)>) -> RepositoryResult<()> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}/{key}")
                };
                flatten(&path, child, rows)?;
            }
        }
        leaf => rows.push((prefix.to_string(), serde_json::to_string(&leaf)?)),
    }
    Ok(())
}

fn insert_leaf(root: &mut Value, relative: &[&str], leaf: Value) {
    let Some((head, rest)) = relative.split_first() else {
        *root = leaf;
        return;
    };
    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
    if let Value::Object(map) = root {
        let child = map.entry(head.to_string()).or_insert(Value::Null);
        insert_leaf(child, rest, leaf);
    }
}

impl SqliteBackend {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Number of stored leaves.
    pub async fn leaf_count(&self) -> RepositoryResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS leaves FROM tree_nodes")
            .fetch_one(&*self.pool)
            .await?;
        Ok(row.get::<i64, _>("leaves"))
    }
}

#[async_trait]
impl TreeBackend for SqliteBackend {
    async fn get(&self, path: &[String]) -> RepositoryResult<Option<Value>> {
        let location = path.join("/");
        let rows = if location.is_empty() {
            sqlx::query("SELECT path, value FROM tree_nodes")
                .fetch_all(&*self.pool)
                .await?
        } else {
            // LIKE folds ASCII case, so `abc` would also match `ABC/...`.
            let below = format!("{location}/");
            sqlx::query(
                r#"
                SELECT path, value FROM tree_nodes
                WHERE path = ? OR substr(path, 1, length(?)) = ?
                "#,
            )
            .bind(&location)
            .bind(&below)
            .bind(&below)
            .fetch_all(&*self.pool)
            .await?
        };

        if rows.is_empty() {
            return Ok(None);
        }

        let mut root = Value::Null;
        for row in rows {
            let leaf_path: String = row.get("path");
            let raw: String = row.get("value");
            let leaf: Value = serde_json::from_str(&raw).map_err(|source| RepositoryError::Decode {
                path: leaf_path.clone(),
                source,
            })?;
            let relative = if location.is_empty() {
                leaf_path.as_str()
            } else {
                leaf_path[location.len()..].trim_start_matches('/')
            };
            let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
            insert_leaf(&mut root, &segments, leaf);
        }
        Ok(Some(root))
    }

    async fn set(&self, path: &[String], value: Value) -> RepositoryResult<()> {
        let location = path.join("/");
        let mut rows = Vec::new();
        if let Some(value) = normalize(value) {
            flatten(&location, value, &mut rows)?;
        }

        let mut tx = self.pool.begin().await?;
        if location.is_empty() {
            sqlx::query("DELETE FROM tree_nodes").execute(&mut *tx).await?;
        } else {
            let below = format!("{location}/");
            sqlx::query("DELETE FROM tree_nodes WHERE path = ? OR substr(path, 1, length(?)) = ?")
                .bind(&location)
                .bind(&below)
                .bind(&below)
                .execute(&mut *tx)
                .await?;
            // A scalar at an ancestor would shadow the new subtree.
            for depth in 1..path.len() {
                sqlx::query("DELETE FROM tree_nodes WHERE path = ?")
                    .bind(path[..depth].join("/"))
                    .execute(&mut *tx)
                    .await?;
            }
        }
        for (leaf_path, raw) in &rows {
            sqlx::query("INSERT INTO tree_nodes (path, value) VALUES (?, ?)")
                .bind(leaf_path)
                .bind(raw)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(path = %location, leaves = rows.len(), "tree write committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::database::init_test_database;
    use serde_json::json;

    fn path(p: &str) -> Vec<String> {
        p.split('/').map(str::to_string).collect()
    }

    async fn setup() -> SqliteBackend {
        let pool = init_test_database().await.unwrap();
        SqliteBackend::new(Arc::new(pool))
    }

    #[tokio::test]
    async fn test_subtree_round_trip() {
        let backend = setup().await;
        let profile = json!({"name": "rig", "hashrates": {"x11": 1.5, "myr-gr": 2}});
        backend.set(&path("v2/rig-profile/p1"), profile.clone()).await.unwrap();

        assert_eq!(backend.get(&path("v2/rig-profile/p1")).await.unwrap(), Some(profile));
        assert_eq!(
            backend.get(&path("v2/rig-profile/p1/name")).await.unwrap(),
            Some(json!("rig"))
        );
        assert_eq!(backend.leaf_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_write_replaces_subtree_and_ancestor_leaf() {
        let backend = setup().await;
        backend.set(&path("v2/user/u1/defaults"), json!("old")).await.unwrap();
        backend
            .set(&path("v2/user/u1/defaults/rig-profile"), json!("p1"))
            .await
            .unwrap();
        assert_eq!(
            backend.get(&path("v2/user/u1")).await.unwrap(),
            Some(json!({"defaults": {"rig-profile": "p1"}}))
        );

        backend.remove(&path("v2/user/u1/defaults")).await.unwrap();
        assert_eq!(backend.get(&path("v2/user/u1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wildcard_characters_match_literally() {
        let backend = setup().await;
        backend.set(&path("v2/a_b/x"), json!(1)).await.unwrap();
        backend.set(&path("v2/aXb/y"), json!(2)).await.unwrap();

        assert_eq!(backend.get(&path("v2/a_b")).await.unwrap(), Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_sibling_keys_differing_in_case_stay_separate() {
        let backend = setup().await;
        backend
            .set(&path("v2/rig-profile/abc"), json!({"name": "lower"}))
            .await
            .unwrap();
        backend
            .set(&path("v2/rig-profile/ABC"), json!({"name": "upper"}))
            .await
            .unwrap();

        assert_eq!(
            backend.get(&path("v2/rig-profile/abc")).await.unwrap(),
            Some(json!({"name": "lower"}))
        );
        assert_eq!(
            backend.get(&path("v2/rig-profile")).await.unwrap(),
            Some(json!({"abc": {"name": "lower"}, "ABC": {"name": "upper"}}))
        );

        backend.remove(&path("v2/rig-profile/ABC")).await.unwrap();
        assert_eq!(
            backend.get(&path("v2/rig-profile")).await.unwrap(),
            Some(json!({"abc": {"name": "lower"}}))
        );
    }
}
