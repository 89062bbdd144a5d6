//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success - operation completed, results found (or no results is acceptable)
//! - `1`: General error - unspecified failure
//! - `2`: Blocking error - the index and corpus disagree; scripts should stop
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

use crate::error::SearchError;
use crate::vector::VectorError;

/// Standard exit codes for CLI operations.
///
/// These codes follow Unix conventions where 0 indicates success,
/// and non-zero values indicate various error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Critical error that should halt automation (code 2)
    BlockingError = 2,

    /// Search ran but matched nothing (code 3)
    NotFound = 3,

    /// The query was rejected before searching (code 4)
    InvalidQuery = 4,

    /// File I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Index corruption detected (code 7)
    IndexCorrupted = 7,

    /// Embedding model failed or timed out (code 8)
    EmbeddingError = 8,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl ExitCode {
    /// `Success` if the search produced hits, `NotFound` otherwise.
    pub fn from_hits<T>(hits: &[T]) -> Self {
        if hits.is_empty() {
            ExitCode::NotFound
        } else {
            ExitCode::Success
        }
    }

    /// Convert a `SearchError` to the appropriate exit code.
    ///
    /// Maps specific error types to semantic exit codes that scripts
    /// can use to determine appropriate recovery actions.
    pub fn from_error(error: &SearchError) -> Self {
        match error {
            SearchError::EmptyQuery | SearchError::InvalidRequest { .. } => {
                ExitCode::InvalidQuery
            }

            // Index and corpus out of step is a blocking error
            SearchError::Join(_) | SearchError::OutOfSync { .. } => ExitCode::BlockingError,

            SearchError::Index(VectorError::CorruptIndex { .. }) => ExitCode::IndexCorrupted,
            SearchError::Index(VectorError::EmptyIndex) => ExitCode::NotFound,
            SearchError::Index(VectorError::Storage(_)) => ExitCode::IoError,

            SearchError::Embedding(_)
            | SearchError::Index(VectorError::EmbeddingFailed(_))
            | SearchError::Timeout { .. } => ExitCode::EmbeddingError,

            SearchError::Corpus(_) => ExitCode::ConfigError,

            // Everything else is a general error
            _ => ExitCode::GeneralError,
        }
    }

    /// Check if this exit code indicates a blocking error.
    ///
    /// Blocking errors should halt automation pipelines.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExitCode::BlockingError)
    }

    /// Check if this exit code indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }
}
