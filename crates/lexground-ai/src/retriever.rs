//! Retrieval: encode the question, search the index, deduplicate, and assemble
//! the bounded context handed to the answerer.

use std::collections::HashSet;
use std::sync::Arc;

use lexground_core::{CorpusStats, ProvisionRecord};
use lexground_store::{CorpusStore, FlatIndex};
use tracing::{debug, info, warn};

use crate::encoder::QueryEncoder;
use crate::{RetrievalError, StartupError};

/// A provision surfaced by search.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalHit {
    /// Position among the raw neighbours (0 = closest), before deduplication.
    pub rank: usize,
    pub distance: f32,
    pub corpus_index: usize,
    pub record: ProvisionRecord,
    /// Joined citation parts; may be empty.
    pub citation: String,
}

/// Deduplicated hits in ascending-distance order plus the assembled context.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievalHit>,
    pub context: String,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Read-only retrieval service. Cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct Retriever {
    corpus: Arc<CorpusStore>,
    index: Arc<FlatIndex>,
    encoder: Arc<dyn QueryEncoder>,
}

impl Retriever {
    /// Wire the services together, checking that all three share one dimensionality.
    pub fn new(
        corpus: Arc<CorpusStore>,
        index: Arc<FlatIndex>,
        encoder: Arc<dyn QueryEncoder>,
    ) -> Result<Self, StartupError> {
        let corpus_dim = corpus.dimensionality();
        if encoder.dim() != corpus_dim {
            return Err(StartupError::DimensionMismatch {
                model: encoder.model_name().to_string(),
                encoder: encoder.dim(),
                corpus: corpus_dim,
            });
        }
        if index.dim() != corpus_dim || index.len() != corpus.vector_count() {
            return Err(StartupError::IndexMismatch {
                index_rows: index.len(),
                index_dim: index.dim(),
                corpus_rows: corpus.vector_count(),
                corpus_dim,
            });
        }
        Ok(Self {
            corpus,
            index,
            encoder,
        })
    }

    pub fn corpus_stats(&self) -> CorpusStats {
        self.corpus.stats()
    }

    pub fn corpus(&self) -> &Arc<CorpusStore> {
        &self.corpus
    }

    /// Retrieve up to `k` distinct provisions for `question`.
    ///
    /// `k` may exceed the corpus size; fewer hits come back. Hits sharing a
    /// `(section, subsection)` key with a closer hit are dropped.
    pub fn retrieve(&self, question: &str, k: usize) -> Result<RetrievalResult, RetrievalError> {
        if question.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        if k == 0 {
            return Err(RetrievalError::InvalidK(k));
        }

        let query = self.encoder.encode(question)?;
        let neighbors = self.index.search(&query, k)?;

        let mut seen = HashSet::with_capacity(neighbors.len());
        let mut hits = Vec::with_capacity(neighbors.len());
        for (rank, neighbor) in neighbors.iter().enumerate() {
            let Some(record) = self.corpus.record_at(neighbor.index) else {
                warn!(index = neighbor.index, "neighbour outside corpus, skipping");
                continue;
            };
            if !seen.insert(record.key()) {
                debug!(rank, citation = %record.citation_label(), "duplicate provision dropped");
                continue;
            }
            hits.push(RetrievalHit {
                rank,
                distance: neighbor.distance,
                corpus_index: neighbor.index,
                record: record.clone(),
                citation: record.citation_label(),
            });
        }

        let context = build_context(&hits);
        info!(
            k,
            neighbors = neighbors.len(),
            retained = hits.len(),
            "retrieved provisions"
        );
        Ok(RetrievalResult { hits, context })
    }
}

/// `[citation] text` blocks separated by a blank line, in hit order.
pub fn build_context(hits: &[RetrievalHit]) -> String {
    hits.iter()
        .map(|hit| format!("[{}] {}", hit.citation, hit.record.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
