//! Immutable corpus records and the ordered collection that owns them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::corpus::normalize_text;
use crate::vector::Position;

/// A single corpus entry.
///
/// Created once during ingestion and never mutated. Its position is its rank
/// origin: the embedding at the same index position was produced from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    position: Position,
    text: String,
    normalized: String,
    metadata: BTreeMap<String, String>,
}

impl Record {
    /// Creates a record, normalizing `text` for embedding.
    #[must_use]
    pub fn new(position: Position, text: String, metadata: BTreeMap<String, String>) -> Self {
        let normalized = normalize_text(&text);
        Self {
            position,
            text,
            normalized,
            metadata,
        }
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    /// The raw text as read from the corpus.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The text after [`normalize_text`]; this is what gets embedded.
    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Returns a metadata field, `None` if the column was absent.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).map(String::as_str)
    }
}

/// Ordered, read-only collection of records; `records[i].position() == i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    records: Vec<Record>,
}

impl Corpus {
    /// Builds a corpus from rows in enumeration order, assigning positions
    /// `0..n`.
    ///
    /// Rows beyond `u32::MAX` cannot be addressed by an index and are dropped
    /// with a warning.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, BTreeMap<String, String>)>,
    {
        let mut records = Vec::new();
        for (row, (text, metadata)) in rows.into_iter().enumerate() {
            let Some(position) = Position::from_usize(row) else {
                tracing::warn!("corpus exceeds addressable positions, truncating at {row}");
                break;
            };
            records.push(Record::new(position, text, metadata));
        }
        Self { records }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, position: Position) -> Option<&Record> {
        self.records.get(position.as_usize())
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Normalized texts in position order, ready for batch embedding.
    #[must_use]
    pub fn normalized_texts(&self) -> Vec<&str> {
        self.records.iter().map(Record::normalized).collect()
    }

    /// SHA-256 over every normalized text in order.
    ///
    /// Two corpora with the same fingerprint produce the same embeddings
    /// under the same model, so persisted artifacts keyed by it can be reused.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.records.len() as u64).to_le_bytes());
        for record in &self.records {
            hasher.update((record.normalized.len() as u64).to_le_bytes());
            hasher.update(record.normalized.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

impl std::ops::Index<Position> for Corpus {
    type Output = Record;

    fn index(&self, position: Position) -> &Self::Output {
        &self.records[position.as_usize()]
    }
}
