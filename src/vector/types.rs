//! Type-safe wrappers and core types for the vector index.
//!
//! Positions and distances are newtypes so that a neighbor's rank origin
//! can never be confused with a record count or a raw float.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard vector dimension for all-MiniLM-L6-v2 sentence embeddings.
pub const VECTOR_DIMENSION_384: usize = 384;

/// Zero-based position of a record in the corpus the index was built from.
///
/// Positions are the index's only link back to corpus records: the vector
/// stored at position `i` was produced from record `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(u32);

impl Position {
    #[must_use]
    pub const fn new(position: u32) -> Self {
        Self(position)
    }

    /// Converts a `usize` row number, returning `None` above `u32::MAX`.
    #[must_use]
    pub fn from_usize(position: usize) -> Option<Self> {
        u32::try_from(position).ok().map(Self)
    }

    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Squared Euclidean distance between a query and a stored vector.
///
/// Smaller is closer. Ordering uses `f32::total_cmp` so that every value,
/// including NaN produced by non-finite inputs, has a defined rank.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distance(f32);

impl Distance {
    #[must_use]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(&self) -> f32 {
        self.0
    }
}

impl PartialEq for Distance {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Distance {}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Distance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// One ranked neighbor returned by an index search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub position: Position,
    pub distance: Distance,
}

impl Neighbor {
    #[must_use]
    pub const fn new(position: Position, distance: Distance) -> Self {
        Self { position, distance }
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order used for ranking: distance ascending, then position ascending.
impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

/// Type-safe wrapper for vector dimensions.
///
/// A dimension is never zero; an index with no vectors has no dimension at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Creates a standard 384-dimensional vector dimension.
    #[must_use]
    pub const fn dimension_384() -> Self {
        Self(VECTOR_DIMENSION_384)
    }

    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl TryFrom<usize> for VectorDimension {
    type Error = VectorError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VectorDimension> for usize {
    fn from(value: VectorDimension) -> Self {
        value.0
    }
}

/// Errors that can occur during vector index operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Index contains no vectors\nSuggestion: Build the index from a non-empty corpus")]
    EmptyIndex,

    #[error("Corrupt index file: {reason}\nSuggestion: Rebuild the index from the corpus")]
    CorruptIndex { reason: String },

    #[error("Index cannot address {count} vectors\nSuggestion: Split the corpus into smaller indexes")]
    CapacityExceeded { count: usize },

    #[error("Storage error: {0}\nSuggestion: Check disk space and file permissions")]
    Storage(#[from] std::io::Error),

    #[error(
        "Embedding generation failed: {0}\nSuggestion: Verify the embedding model is properly initialized"
    )]
    EmbeddingFailed(String),
}

impl VectorError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptIndex {
            reason: reason.into(),
        }
    }
}
