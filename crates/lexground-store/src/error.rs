use std::path::PathBuf;

use thiserror::Error;

/// Failures loading the corpus artifacts. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("corpus artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported embeddings format {0:?} (expected .npy or .parquet)")]
    UnsupportedFormat(PathBuf),

    #[error("corpus size mismatch: {vectors} embedding vectors but {records} records")]
    CountMismatch { vectors: usize, records: usize },

    #[error("corpus is empty")]
    Empty,

    #[error("embedding {row} contains a non-finite value")]
    NonFinite { row: usize },

    #[error("malformed embeddings in {path:?}: {reason}")]
    MalformedEmbeddings { path: PathBuf, reason: String },

    #[error("malformed records in {path:?}: {source}")]
    MalformedRecords {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("npy read error: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures searching the vector index. Scoped to a single query.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("query has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("query vector contains a non-finite value")]
    NonFiniteQuery,
}
