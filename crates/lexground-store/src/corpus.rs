//! Corpus store: provision records plus their index-aligned embedding vectors.
//!
//! Two artifacts make up a corpus:
//! - an `(N, D)` embedding matrix, either a NumPy `.npy` file (f32 or f64) or a
//!   Parquet file with an `embedding` column of `FixedSizeList<Float32, D>`
//! - a JSON array of N provision records
//!
//! Both are read once and never mutated. [`CorpusCache`] guarantees that
//! repeated requests for the corpus do not go back to disk.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use arrow::array::{Array, FixedSizeListArray, Float32Array};
use arrow::record_batch::RecordBatch;
use lexground_core::{CorpusStats, ProvisionRecord};
use ndarray::Array2;
use ndarray_npy::{ReadNpyError, ReadNpyExt};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::info;

use crate::{EmbeddingMatrix, StoreError};

const EMBEDDING_COLUMN: &str = "embedding";

/// Immutable corpus of provisions and embeddings.
#[derive(Debug)]
pub struct CorpusStore {
    records: Vec<ProvisionRecord>,
    vectors: EmbeddingMatrix,
    stats: CorpusStats,
}

impl CorpusStore {
    /// Pair records with vectors. Counts must agree.
    pub fn new(
        records: Vec<ProvisionRecord>,
        vectors: EmbeddingMatrix,
    ) -> Result<Self, StoreError> {
        if records.len() != vectors.len() {
            return Err(StoreError::CountMismatch {
                vectors: vectors.len(),
                records: records.len(),
            });
        }
        let stats = CorpusStats::from_records(&records);
        Ok(Self {
            records,
            vectors,
            stats,
        })
    }

    /// Read both artifacts from disk and validate them against each other.
    pub fn load(embeddings_path: &Path, records_path: &Path) -> Result<Self, StoreError> {
        let vectors = load_embeddings(embeddings_path)?;
        let records = load_records(records_path)?;
        let store = Self::new(records, vectors)?;
        info!(
            provisions = store.vector_count(),
            dim = store.dimensionality(),
            chapters = store.stats.distinct_chapters,
            "loaded legal corpus"
        );
        Ok(store)
    }

    pub fn vector_count(&self) -> usize {
        self.vectors.len()
    }

    pub fn dimensionality(&self) -> usize {
        self.vectors.dim()
    }

    pub fn record_at(&self, i: usize) -> Option<&ProvisionRecord> {
        self.records.get(i)
    }

    pub fn records(&self) -> &[ProvisionRecord] {
        &self.records
    }

    pub fn embeddings(&self) -> &EmbeddingMatrix {
        &self.vectors
    }

    pub fn stats(&self) -> CorpusStats {
        self.stats
    }
}

/// Load-once handle for a corpus on disk.
///
/// The first successful [`get_or_load`](Self::get_or_load) reads the artifacts;
/// later calls return the same `Arc` without touching the filesystem. A failed
/// load leaves the cache empty.
#[derive(Debug)]
pub struct CorpusCache {
    embeddings_path: PathBuf,
    records_path: PathBuf,
    slot: Mutex<Option<Arc<CorpusStore>>>,
}

impl CorpusCache {
    pub fn new(embeddings_path: impl Into<PathBuf>, records_path: impl Into<PathBuf>) -> Self {
        Self {
            embeddings_path: embeddings_path.into(),
            records_path: records_path.into(),
            slot: Mutex::new(None),
        }
    }

    pub fn get_or_load(&self) -> Result<Arc<CorpusStore>, StoreError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = slot.as_ref() {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(CorpusStore::load(&self.embeddings_path, &self.records_path)?);
        *slot = Some(Arc::clone(&store));
        Ok(store)
    }

    pub fn is_loaded(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Load the embedding matrix, choosing the reader by file extension.
pub fn load_embeddings(path: &Path) -> Result<EmbeddingMatrix, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("npy") => load_npy(path),
        Some("parquet") => load_parquet(path),
        _ => Err(StoreError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Load the JSON record array.
pub fn load_records(path: &Path) -> Result<Vec<ProvisionRecord>, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader).map_err(|source| StoreError::MalformedRecords {
        path: path.to_path_buf(),
        source,
    })
}

// ── Readers ──

fn load_npy(path: &Path) -> Result<EmbeddingMatrix, StoreError> {
    // sentence-transformers writes f32; accept f64 too and narrow it.
    let (values, dim) = match Array2::<f32>::read_npy(File::open(path)?) {
        Ok(arr) => {
            let dim = arr.ncols();
            (arr.iter().copied().collect::<Vec<f32>>(), dim)
        }
        Err(ReadNpyError::WrongDescriptor(_)) => {
            let arr = Array2::<f64>::read_npy(File::open(path)?)?;
            let dim = arr.ncols();
            (arr.iter().map(|&v| v as f32).collect(), dim)
        }
        Err(e) => return Err(e.into()),
    };
    EmbeddingMatrix::from_flat(values, dim).map_err(|e| with_path(e, path))
}

fn load_parquet(path: &Path) -> Result<EmbeddingMatrix, StoreError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Vec<RecordBatch> = reader.collect::<Result<_, _>>()?;
    let (values, dim) = flatten_embedding_column(&batches).map_err(|reason| {
        StoreError::MalformedEmbeddings {
            path: path.to_path_buf(),
            reason,
        }
    })?;
    EmbeddingMatrix::from_flat(values, dim).map_err(|e| with_path(e, path))
}

/// Concatenate the `embedding` column of every batch into one row-major buffer.
fn flatten_embedding_column(batches: &[RecordBatch]) -> Result<(Vec<f32>, usize), String> {
    let mut values = Vec::new();
    let mut dim: Option<usize> = None;

    for batch in batches {
        let col = batch
            .column_by_name(EMBEDDING_COLUMN)
            .ok_or_else(|| format!("missing '{EMBEDDING_COLUMN}' column"))?;
        let fsl = col
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .ok_or_else(|| "embedding column is not FixedSizeList".to_string())?;
        let width = fsl.value_length() as usize;
        match dim {
            Some(d) if d != width => {
                return Err(format!("batches disagree on dimension: {d} vs {width}"));
            }
            _ => dim = Some(width),
        }
        if fsl.null_count() > 0 {
            return Err("embedding column contains null rows".to_string());
        }
        if fsl.values().null_count() > 0 {
            return Err("embedding rows contain null values".to_string());
        }

        values.reserve(fsl.len() * width);
        for row in 0..fsl.len() {
            let row_values = fsl.value(row);
            let floats = row_values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| "embedding values are not Float32".to_string())?;
            values.extend_from_slice(floats.values());
        }
    }

    Ok((values, dim.unwrap_or(0)))
}

fn with_path(err: StoreError, path: &Path) -> StoreError {
    match err {
        StoreError::MalformedEmbeddings { reason, .. } => StoreError::MalformedEmbeddings {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    }
}
