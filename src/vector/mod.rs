//! Vector similarity search.
//!
//! An index is built once from an ordered batch of embeddings and then frozen:
//! searches only read it, so any number may run concurrently. Replacing the
//! index means building a new one and swapping it in whole.
//!
//! # Architecture
//! - [`VectorIndex`]: Build / Search / Persist / Load contract
//! - [`FlatIndex`]: exact brute-force scan by squared Euclidean distance,
//!   ties broken by ascending position
//! - `storage`: header + row-major `f32` file format shared by the index and
//!   the embedding cache

mod embedding;
mod index;
mod storage;
mod types;

// Re-export core types for public API
pub use embedding::{
    EmbeddingGenerator, FastEmbedGenerator, StaticEmbeddingGenerator, parse_embedding_model,
};
pub use index::{FlatIndex, VectorIndex, squared_euclidean};
pub use storage::{StoredMatrix, read_matrix, write_matrix};
pub use types::{
    Distance, Neighbor, Position, VECTOR_DIMENSION_384, VectorDimension, VectorError,
};
