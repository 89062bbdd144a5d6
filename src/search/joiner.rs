//! Maps ranked neighbor positions back to corpus records.
//!
//! Joining is a pure lookup: hits come out in exactly the order the index
//! ranked them, with the distance untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::corpus::{Record, columns};
use crate::vector::{Neighbor, Position};

/// A position the index returned has no record behind it.
///
/// Only possible when the index and corpus were built from different data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error(
        "Index position {position} is out of range for a corpus of {len} records\nSuggestion: The index and corpus are out of sync; rebuild the index with 'hadith-search index --force'"
    )]
    IndexOutOfRange { position: Position, len: usize },
}

/// A search result as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Corpus position of the record
    pub position: Position,
    /// Raw record text
    #[serde(rename = "hadith")]
    pub text: String,
    /// Squared Euclidean distance to the query; smaller is closer
    pub distance: f32,
    /// Human-readable origin, e.g. `Chapter: Prayer, Section: Times`
    pub source: String,
    pub arabic_hadith: String,
    pub grade: String,
    /// Every metadata field of the record
    pub metadata: BTreeMap<String, String>,
}

impl SearchHit {
    fn from_record(record: &Record, neighbor: &Neighbor) -> Self {
        let field = |name: &str| record.field(name).unwrap_or_default().to_string();
        Self {
            position: neighbor.position,
            text: record.text().to_string(),
            distance: neighbor.distance.get(),
            source: format!(
                "Chapter: {}, Section: {}",
                field(columns::CHAPTER_ENGLISH),
                field(columns::SECTION_ENGLISH)
            ),
            arabic_hadith: field(columns::ARABIC_HADITH),
            grade: field(columns::ENGLISH_GRADE),
            metadata: record.metadata().clone(),
        }
    }
}

/// Resolves every neighbor against `records`, preserving order.
///
/// # Errors
/// [`JoinError::IndexOutOfRange`] for the first position with no record.
pub fn join(results: &[Neighbor], records: &[Record]) -> Result<Vec<SearchHit>, JoinError> {
    results
        .iter()
        .map(|neighbor| {
            records
                .get(neighbor.position.as_usize())
                .map(|record| SearchHit::from_record(record, neighbor))
                .ok_or(JoinError::IndexOutOfRange {
                    position: neighbor.position,
                    len: records.len(),
                })
        })
        .collect()
}
