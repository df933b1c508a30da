use std::time::Duration;

use lexground_core::ConfigError;
use lexground_store::{IndexError, StoreError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("cannot encode an empty query")]
    EmptyInput,
    #[error("encoder failed: {0}")]
    Model(String),
}

/// Per-query retrieval failure. Never affects other queries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("question is empty")]
    EmptyQuery,
    #[error("k must be at least 1, got {0}")]
    InvalidK(usize),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// The generative model call failed. Distinct from a refusal.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model endpoint returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed model response: {0}")]
    Malformed(String),
}

/// Fatal at startup. The pipeline must not serve queries after one of these.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("corpus load failed: {0}")]
    Corpus(#[from] StoreError),
    #[error("generative model credential is missing ({0} is unset or empty)")]
    MissingCredential(&'static str),
    #[error("encoder {model} produces {encoder}-dim vectors but the corpus has {corpus}")]
    DimensionMismatch {
        model: String,
        encoder: usize,
        corpus: usize,
    },
    #[error("index ({index_rows} x {index_dim}) was not built from this corpus ({corpus_rows} x {corpus_dim})")]
    IndexMismatch {
        index_rows: usize,
        index_dim: usize,
        corpus_rows: usize,
        corpus_dim: usize,
    },
    #[error("encoder load failed: {0}")]
    Encoder(String),
    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}
