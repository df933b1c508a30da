//! Exhaustive squared-L2 nearest-neighbour index.
//!
//! The corpus is in the low tens of thousands of vectors, so a flat scan over
//! a contiguous `f32` buffer is fast enough and gives exact results. The index
//! is static: it is built once from an [`EmbeddingMatrix`] and only read after.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::info;

use crate::{IndexError, StoreError};

/// Row-major `(N, D)` matrix of embedding vectors.
///
/// The buffer is shared (`Arc`) between the corpus store and the index.
#[derive(Debug, Clone)]
pub struct EmbeddingMatrix {
    dim: usize,
    data: Arc<[f32]>,
}

impl EmbeddingMatrix {
    /// Wrap a flat row-major buffer. Rejects empty, ragged or non-finite input.
    pub fn from_flat(data: Vec<f32>, dim: usize) -> Result<Self, StoreError> {
        if dim == 0 || data.is_empty() {
            return Err(StoreError::Empty);
        }
        if data.len() % dim != 0 {
            return Err(StoreError::MalformedEmbeddings {
                path: Default::default(),
                reason: format!("{} values do not divide into rows of {dim}", data.len()),
            });
        }
        if let Some(pos) = data.iter().position(|v| !v.is_finite()) {
            return Err(StoreError::NonFinite { row: pos / dim });
        }
        Ok(Self {
            dim,
            data: data.into(),
        })
    }

    /// Build from one `Vec` per row. All rows must share the first row's length.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, StoreError> {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut flat = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != dim {
                return Err(StoreError::MalformedEmbeddings {
                    path: Default::default(),
                    reason: format!("row {i} has {} values, expected {dim}", row.len()),
                });
            }
            flat.extend_from_slice(row);
        }
        Self::from_flat(flat, dim)
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row(&self, i: usize) -> Option<&[f32]> {
        let start = i.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }
}

/// One search result: squared L2 distance and the corpus row it refers to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f32,
    pub index: usize,
}

/// Static flat index over an [`EmbeddingMatrix`].
///
/// An index value always holds a built matrix; there is no unbuilt state.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    vectors: EmbeddingMatrix,
}

impl FlatIndex {
    pub fn build(vectors: &EmbeddingMatrix) -> Self {
        info!(
            rows = vectors.len(),
            dim = vectors.dim(),
            "built flat L2 index"
        );
        Self {
            vectors: vectors.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.vectors.dim()
    }

    /// The `k` nearest rows to `query`, ascending by squared L2 distance.
    ///
    /// Returns at most `min(k, len)` neighbours. Equal distances are ordered by
    /// row index so results are stable across calls.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        let dim = self.dim();
        if query.len() != dim {
            return Err(IndexError::DimensionMismatch {
                expected: dim,
                actual: query.len(),
            });
        }
        if query.iter().any(|v| !v.is_finite()) {
            return Err(IndexError::NonFiniteQuery);
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<Neighbor> = self
            .vectors
            .data
            .chunks_exact(dim)
            .enumerate()
            .map(|(index, row)| Neighbor {
                distance: squared_l2(query, row),
                index,
            })
            .collect();

        let k = k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_distance);
        Ok(scored)
    }
}

fn by_distance(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.index.cmp(&b.index))
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[[f32; 2]]) -> EmbeddingMatrix {
        let rows: Vec<Vec<f32>> = rows.iter().map(|r| r.to_vec()).collect();
        EmbeddingMatrix::from_rows(&rows).unwrap()
    }

    #[test]
    fn search_orders_by_ascending_distance() {
        let index = FlatIndex::build(&matrix(&[[5.0, 0.0], [1.0, 0.0], [3.0, 0.0], [0.0, 0.0]]));
        let hits = index.search(&[0.0, 0.0], 4).unwrap();
        let order: Vec<usize> = hits.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
        assert_eq!(hits[1].distance, 1.0);
        assert_eq!(hits[2].distance, 9.0);
    }

    #[test]
    fn search_truncates_to_k() {
        let index = FlatIndex::build(&matrix(&[[5.0, 0.0], [1.0, 0.0], [3.0, 0.0], [0.0, 0.0]]));
        let hits = index.search(&[0.9, 0.0], 2).unwrap();
        let order: Vec<usize> = hits.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![1, 3]);
    }

    #[test]
    fn k_larger_than_corpus_returns_everything() {
        let index = FlatIndex::build(&matrix(&[[1.0, 1.0], [2.0, 2.0]]));
        let hits = index.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn ties_break_by_row_index() {
        let index = FlatIndex::build(&matrix(&[[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, -1.0]]));
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn k_zero_is_empty() {
        let index = FlatIndex::build(&matrix(&[[1.0, 0.0]]));
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn dimension_mismatch_errors() {
        let index = FlatIndex::build(&matrix(&[[1.0, 0.0]]));
        let err = index.search(&[0.0, 0.0, 0.0], 1).unwrap_err();
        assert_eq!(
            err,
            IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn non_finite_query_errors() {
        let index = FlatIndex::build(&matrix(&[[1.0, 0.0]]));
        assert_eq!(
            index.search(&[f32::NAN, 0.0], 1).unwrap_err(),
            IndexError::NonFiniteQuery
        );
    }

    #[test]
    fn repeated_search_is_identical() {
        let index = FlatIndex::build(&matrix(&[[0.3, 0.1], [0.2, 0.2], [0.1, 0.3], [0.9, 0.9]]));
        let a = index.search(&[0.2, 0.2], 3).unwrap();
        let b = index.search(&[0.2, 0.2], 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn matrix_rejects_ragged_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matches!(
            EmbeddingMatrix::from_rows(&rows),
            Err(StoreError::MalformedEmbeddings { .. })
        ));
    }

    #[test]
    fn matrix_rejects_non_finite() {
        let err = EmbeddingMatrix::from_flat(vec![0.0, 1.0, f32::INFINITY, 0.0], 2).unwrap_err();
        assert!(matches!(err, StoreError::NonFinite { row: 1 }));
    }

    #[test]
    fn matrix_rejects_empty() {
        assert!(matches!(
            EmbeddingMatrix::from_flat(Vec::new(), 4),
            Err(StoreError::Empty)
        ));
    }

    #[test]
    fn matrix_row_access() {
        let m = matrix(&[[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(m.len(), 2);
        assert_eq!(m.row(1), Some(&[3.0, 4.0][..]));
        assert_eq!(m.row(2), None);
    }
}
