//! Storage layer: immutable legal corpus and its exact L2 vector index.

mod error;
pub use error::{IndexError, StoreError};

mod index;
pub use index::{EmbeddingMatrix, FlatIndex, Neighbor};

mod corpus;
pub use corpus::{CorpusCache, CorpusStore, load_embeddings, load_records};
