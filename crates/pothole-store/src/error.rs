use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("complaint already exists: {0}")]
    Duplicate(String),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },

    #[error("{0}")]
    Other(String),
}
