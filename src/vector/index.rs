//! Exact nearest-neighbor index over a frozen embedding matrix.
//!
//! [`VectorIndex`] is the contract every index implementation satisfies:
//! build once from an ordered batch, answer k-NN queries, persist and load.
//! Callers (the query service and the joiner) only see this trait, so an
//! approximate index can be swapped in without touching them.
//!
//! [`FlatIndex`] is the exact implementation: it stores every vector
//! uncompressed and answers a query by scanning all of them, computing the
//! squared Euclidean distance, and keeping the `k` smallest.

use std::path::Path;

use rayon::prelude::*;

use crate::vector::storage::{read_matrix, write_matrix};
use crate::vector::types::{Distance, Neighbor, Position, VectorDimension, VectorError};

/// Polymorphic k-NN index contract.
///
/// Implementations are immutable once built or loaded; `search` takes `&self`
/// and may be called from any number of threads at once.
pub trait VectorIndex: Send + Sync + Sized {
    /// Builds an index from embeddings in corpus position order.
    ///
    /// # Errors
    /// Returns [`VectorError::DimensionMismatch`] if the vectors do not all
    /// share one length.
    fn build(embeddings: &[Vec<f32>]) -> Result<Self, VectorError>;

    /// Returns the `min(k, len)` nearest stored vectors, closest first,
    /// equal distances ordered by ascending position.
    ///
    /// # Errors
    /// [`VectorError::EmptyIndex`] when the index holds no vectors and
    /// [`VectorError::DimensionMismatch`] when `query` has the wrong length.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorError>;

    /// Writes the index to `path`.
    fn persist(&self, path: &Path) -> Result<(), VectorError>;

    /// Reads an index written by [`VectorIndex::persist`].
    fn load(path: &Path) -> Result<Self, VectorError>;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension of the stored vectors, `None` for an empty index.
    fn dimension(&self) -> Option<VectorDimension>;
}

/// Brute-force index over a contiguous row-major `f32` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: Option<VectorDimension>,
    count: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Creates an index directly from a row-major matrix.
    ///
    /// Used when the embeddings are already contiguous, e.g. read back from
    /// the embedding cache.
    pub fn from_flat(dimension: VectorDimension, data: Vec<f32>) -> Result<Self, VectorError> {
        let remainder = data.len() % dimension.get();
        if remainder != 0 {
            return Err(VectorError::DimensionMismatch {
                expected: dimension.get(),
                actual: remainder,
            });
        }
        let count = data.len() / dimension.get();
        check_capacity(count)?;

        Ok(Self {
            dimension: Some(dimension),
            count,
            data,
        })
    }

    /// Returns the stored vector at `position`.
    #[must_use]
    pub fn vector(&self, position: Position) -> Option<&[f32]> {
        let dim = self.dimension?.get();
        let start = position.as_usize().checked_mul(dim)?;
        self.data.get(start..start + dim)
    }

    /// Returns the raw row-major matrix.
    #[must_use]
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }
}

impl VectorIndex for FlatIndex {
    fn build(embeddings: &[Vec<f32>]) -> Result<Self, VectorError> {
        let Some(first) = embeddings.first() else {
            return Ok(Self {
                dimension: None,
                count: 0,
                data: Vec::new(),
            });
        };

        let dimension = match VectorDimension::new(first.len()) {
            Ok(dimension) => dimension,
            // A zero-length first vector can only be valid if every vector is
            // zero-length, which cannot be indexed; report it against the next
            // non-empty one if there is one.
            Err(err) => {
                return Err(embeddings
                    .iter()
                    .find(|v| !v.is_empty())
                    .map(|v| VectorError::DimensionMismatch {
                        expected: 0,
                        actual: v.len(),
                    })
                    .unwrap_or(err));
            }
        };
        check_capacity(embeddings.len())?;

        let mut data = Vec::with_capacity(embeddings.len() * dimension.get());
        for embedding in embeddings {
            dimension.validate_vector(embedding)?;
            data.extend_from_slice(embedding);
        }

        tracing::info!(
            "built flat index: {} vectors, dimension {}",
            embeddings.len(),
            dimension.get()
        );

        Ok(Self {
            dimension: Some(dimension),
            count: embeddings.len(),
            data,
        })
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorError> {
        let Some(dimension) = self.dimension.filter(|_| self.count > 0) else {
            return Err(VectorError::EmptyIndex);
        };
        dimension.validate_vector(query)?;

        let k = k.min(self.count);
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<Neighbor> = self
            .data
            .par_chunks_exact(dimension.get())
            .enumerate()
            .map(|(row, vector)| {
                Neighbor::new(
                    Position::new(row as u32),
                    Distance::new(squared_euclidean(query, vector)),
                )
            })
            .collect();

        // Partial sort: everything before k-1 ranks no worse than the k-th.
        if k < scored.len() {
            scored.select_nth_unstable(k - 1);
            scored.truncate(k);
        }
        scored.sort_unstable();

        Ok(scored)
    }

    fn persist(&self, path: &Path) -> Result<(), VectorError> {
        let Some(dimension) = self.dimension.filter(|_| self.count > 0) else {
            return Err(VectorError::EmptyIndex);
        };
        write_matrix(path, dimension, &self.data)?;
        tracing::info!(
            "persisted index ({} vectors) to {}",
            self.count,
            path.display()
        );
        Ok(())
    }

    fn load(path: &Path) -> Result<Self, VectorError> {
        let stored = read_matrix(path)?;
        tracing::info!(
            "loaded index from {}: {} vectors, dimension {}",
            path.display(),
            stored.count,
            stored.dimension.get()
        );
        Self::from_flat(stored.dimension, stored.data)
    }

    fn len(&self) -> usize {
        self.count
    }

    fn dimension(&self) -> Option<VectorDimension> {
        self.dimension
    }
}

/// Sum of squared per-dimension differences. No square root: ordering is
/// identical to true Euclidean distance.
#[inline]
#[must_use]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

fn check_capacity(count: usize) -> Result<(), VectorError> {
    if Position::from_usize(count).is_none() {
        return Err(VectorError::CapacityExceeded { count });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_index() -> FlatIndex {
        FlatIndex::build(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![10.0, 10.0]]).unwrap()
    }

    fn positions(neighbors: &[Neighbor]) -> Vec<u32> {
        neighbors.iter().map(|n| n.position.get()).collect()
    }

    #[test]
    fn test_two_nearest_of_three() {
        let index = sample_index();
        let results = index.search(&[0.1, 0.0], 2).unwrap();

        assert_eq!(positions(&results), vec![0, 1]);
        assert!((results[0].distance.get() - 0.01).abs() < 1e-6);
        assert!((results[1].distance.get() - 0.81).abs() < 1e-6);
    }

    #[test]
    fn test_build_rejects_mismatched_lengths() {
        let result = FlatIndex::build(&[vec![0.0, 0.0], vec![1.0, 1.0, 1.0]]);
        match result {
            Err(VectorError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 3);
            }
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_build_rejects_zero_length_first_vector() {
        let result = FlatIndex::build(&[vec![], vec![1.0]]);
        assert!(matches!(
            result,
            Err(VectorError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_exact_match_ranks_first_with_zero_distance() {
        let index = sample_index();
        let results = index.search(&[10.0, 10.0], 3).unwrap();

        assert_eq!(results[0].position, Position::new(2));
        assert_eq!(results[0].distance.get(), 0.0);
    }

    #[test]
    fn test_k_is_clamped_to_len() {
        let index = sample_index();
        let clamped = index.search(&[3.0, 3.0], 50).unwrap();
        let exact = index.search(&[3.0, 3.0], 3).unwrap();

        assert_eq!(clamped.len(), 3);
        assert_eq!(clamped, exact);
    }

    #[test]
    fn test_k_zero_returns_empty() {
        let index = sample_index();
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_break_by_ascending_position() {
        let index = FlatIndex::build(&[
            vec![1.0, 0.0],
            vec![-1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.0, -1.0],
            vec![5.0, 5.0],
        ])
        .unwrap();

        let results = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(positions(&results), vec![0, 1, 2]);

        let all = index.search(&[0.0, 0.0], 5).unwrap();
        assert_eq!(positions(&all), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_results_sorted_non_decreasing() {
        let embeddings: Vec<Vec<f32>> = (0..200)
            .map(|i| {
                let x = i as f32;
                vec![(x * 0.37).sin(), (x * 0.11).cos(), x % 7.0]
            })
            .collect();
        let index = FlatIndex::build(&embeddings).unwrap();

        for k in [1, 5, 17, 200, 500] {
            let results = index.search(&[0.2, -0.4, 3.0], k).unwrap();
            assert_eq!(results.len(), k.min(200));
            for pair in results.windows(2) {
                assert!(pair[0] <= pair[1]);
            }
        }
    }

    #[test]
    fn test_partial_sort_matches_full_sort() {
        let embeddings: Vec<Vec<f32>> = (0..64).map(|i| vec![(i % 9) as f32, 1.0]).collect();
        let index = FlatIndex::build(&embeddings).unwrap();

        let top = index.search(&[4.0, 1.0], 10).unwrap();
        let all = index.search(&[4.0, 1.0], 64).unwrap();
        assert_eq!(top, all[..10]);
    }

    #[test]
    fn test_empty_index_search_fails() {
        let index = FlatIndex::build(&[]).unwrap();
        assert!(index.is_empty());
        assert!(index.dimension().is_none());
        assert!(matches!(
            index.search(&[0.0], 1),
            Err(VectorError::EmptyIndex)
        ));
    }

    #[test]
    fn test_query_dimension_validated() {
        let index = sample_index();
        assert!(matches!(
            index.search(&[0.0, 0.0, 0.0], 1),
            Err(VectorError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_persist_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.vec");
        let index = sample_index();

        index.persist(&path).unwrap();
        let loaded = FlatIndex::load(&path).unwrap();

        assert_eq!(loaded, index);
        for query in [[0.1, 0.0], [9.0, 9.5], [-3.0, 2.0]] {
            assert_eq!(
                loaded.search(&query, 3).unwrap(),
                index.search(&query, 3).unwrap()
            );
        }
    }

    #[test]
    fn test_persist_empty_index_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.vec");
        let index = FlatIndex::build(&[]).unwrap();

        assert!(matches!(index.persist(&path), Err(VectorError::EmptyIndex)));
        assert!(!path.exists());
    }

    #[test]
    fn test_build_is_deterministic() {
        let embeddings = vec![vec![0.3, 0.1], vec![0.2, 0.9], vec![0.7, 0.4]];
        let a = FlatIndex::build(&embeddings).unwrap();
        let b = FlatIndex::build(&embeddings).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.as_flat(), &[0.3, 0.1, 0.2, 0.9, 0.7, 0.4]);
    }

    #[test]
    fn test_vector_lookup() {
        let index = sample_index();
        assert_eq!(index.vector(Position::new(1)), Some(&[1.0, 0.0][..]));
        assert!(index.vector(Position::new(3)).is_none());
    }

    #[test]
    fn test_from_flat_rejects_ragged_matrix() {
        let dim = VectorDimension::new(3).unwrap();
        assert!(FlatIndex::from_flat(dim, vec![1.0; 7]).is_err());
        assert_eq!(FlatIndex::from_flat(dim, vec![1.0; 9]).unwrap().len(), 3);
    }
}
