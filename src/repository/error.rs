use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invalid path segment {segment:?} in {path}")]
    InvalidPath { path: String, segment: String },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
