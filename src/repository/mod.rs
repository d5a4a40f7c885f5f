pub mod adaptor;
pub mod backend;
pub mod database;
pub mod error;
pub mod paths;
pub mod realtime;
pub mod sqlite_backend;

pub use adaptor::{DatabaseAdaptor, ListOptions};
pub use backend::{MemoryBackend, TreeBackend};
pub use error::{RepositoryError, RepositoryResult};
pub use paths::{ListPath, ObjectPath};
pub use realtime::RealtimeDatabase;
pub use sqlite_backend::SqliteBackend;

use anyhow::Result;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Entry point to stored data: the realtime tree plus its typed adaptor.
#[derive(Clone)]
pub struct Repository {
    pub db: RealtimeDatabase,
    pub adaptor: DatabaseAdaptor,
}

impl Repository {
    pub fn new(backend: Arc<dyn TreeBackend>) -> Self {
        let db = RealtimeDatabase::new(backend);
        Self {
            adaptor: DatabaseAdaptor::new(db.clone()),
            db,
        }
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self::new(Arc::new(SqliteBackend::new(Arc::new(pool))))
    }

    /// Opens (creating when needed) the SQLite file at `db_path`.
    pub async fn open(db_path: &str) -> Result<Self> {
        let pool = database::init_database(db_path).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn new_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn from_tree(tree: Value) -> Self {
        Self::new(Arc::new(MemoryBackend::with_tree(tree)))
    }
}
