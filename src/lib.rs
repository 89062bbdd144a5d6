//! Semantic search over the hadith corpus.
//!
//! Records are loaded from CSV, embedded with a sentence-transformer and
//! stored in an exact nearest-neighbor index. Queries are embedded with the
//! same model and answered with the closest records.

pub mod config;
pub mod corpus;
pub mod error;
pub mod io;
pub mod search;
pub mod server;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use corpus::{Corpus, CorpusLoader, Record};
pub use error::{ErrorBody, SearchError, SearchResult};
pub use search::{IndexSnapshot, QueryService, SearchHit};
pub use vector::{FlatIndex, Neighbor, Position, VectorIndex};
