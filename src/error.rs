//! Error types for the hadith search service
//!
//! Each layer has its own `thiserror` enum; [`SearchError`] is what the
//! query service and the CLI surface. It carries a stable status code and
//! converts into a structured [`ErrorBody`] so callers never see a raw
//! internal error chain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::corpus::CorpusError;
use crate::search::JoinError;
use crate::vector::VectorError;

/// Main error type for query service operations
#[derive(Error, Debug)]
pub enum SearchError {
    /// The caller sent no query text
    #[error("Query text is empty. Provide a non-empty query")]
    EmptyQuery,

    /// The request could not be read, e.g. a malformed JSON body
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The embedding model failed; surfaced unchanged, never retried
    #[error("{0}")]
    Embedding(VectorError),

    /// Index build, search, persist or load failed
    #[error(transparent)]
    Index(#[from] VectorError),

    /// Result positions could not be joined to records
    #[error(transparent)]
    Join(#[from] JoinError),

    /// Corpus could not be loaded
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    /// The query embedding did not finish before the deadline
    #[error("Query embedding timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Index and corpus disagree on the number of entries
    #[error(
        "Index holds {index_len} vectors but the corpus has {corpus_len} records. Rebuild the index"
    )]
    OutOfSync { index_len: usize, corpus_len: usize },
}

/// Structured error returned to query callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable kind, see [`SearchError::status_code`]
    pub kind: String,
    /// Human-readable message
    pub message: String,
}

impl SearchError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "EMPTY_QUERY",
            Self::Embedding(_) => "EMBEDDING_FAILED",
            Self::Index(err) => match err {
                VectorError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
                VectorError::InvalidDimension { .. } => "INVALID_DIMENSION",
                VectorError::EmptyIndex => "EMPTY_INDEX",
                VectorError::CorruptIndex { .. } => "CORRUPT_INDEX",
                VectorError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
                VectorError::Storage(_) => "STORAGE_ERROR",
                VectorError::EmbeddingFailed(_) => "EMBEDDING_FAILED",
            },
            Self::Join(JoinError::IndexOutOfRange { .. }) => "INDEX_OUT_OF_RANGE",
            Self::Corpus(_) => "CORPUS_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::OutOfSync { .. } => "INDEX_OUT_OF_SYNC",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
        }
    }

    /// Errors caused by the request itself rather than the system.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::EmptyQuery | Self::InvalidRequest { .. })
    }

    /// Index/corpus integrity faults. These indicate a bug or a stale index
    /// and must be surfaced, not swallowed.
    #[must_use]
    pub fn is_integrity_fault(&self) -> bool {
        matches!(self, Self::Join(_) | Self::OutOfSync { .. })
    }

    /// Converts into the structured body returned to callers.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.status_code().to_string(),
            message: self.to_string(),
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Index(VectorError::CorruptIndex { .. }) => vec![
                "Run 'hadith-search index --force' to rebuild from the corpus",
                "Check for disk errors or an interrupted copy of the index file",
            ],
            Self::Join(_) | Self::OutOfSync { .. } => vec![
                "The index was built from a different corpus",
                "Run 'hadith-search index --force' to rebuild it",
            ],
            Self::Index(VectorError::EmptyIndex) => vec![
                "Check corpus.dir points at the CSV files",
                "Run 'hadith-search index' after adding records",
            ],
            Self::Embedding(_) => vec![
                "Check the embedding model name in settings.toml",
                "The first run downloads the model; ensure network access",
            ],
            Self::Timeout { .. } => vec!["Raise search.timeout_ms in settings.toml"],
            Self::Corpus(_) => vec!["Check corpus.dir and corpus.columns in settings.toml"],
            _ => vec![],
        }
    }
}

/// Result type alias for query service operations
pub type SearchResult<T> = Result<T, SearchError>;
