//! Sidecar metadata for persisted matrices.
//!
//! Every persisted index or embedding cache gets a `<name>.meta.json` next to
//! it recording which model and which corpus produced it. A matrix is only
//! reused when its sidecar matches the current corpus and model.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::vector::VectorError;

/// Metadata describing how a persisted matrix was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Name of the embedding model used
    pub model_name: String,

    /// Dimension of embeddings
    pub dimension: usize,

    /// Number of vectors stored
    pub count: usize,

    /// Fingerprint of the normalized corpus texts
    pub corpus_fingerprint: String,

    /// Unix timestamp when created
    pub created_at: u64,

    /// Version of the metadata format
    pub version: u32,
}

impl IndexMetadata {
    /// Current metadata version
    pub const CURRENT_VERSION: u32 = 1;

    #[must_use]
    pub fn new(
        model_name: &str,
        dimension: usize,
        count: usize,
        corpus_fingerprint: String,
    ) -> Self {
        Self {
            model_name: model_name.to_string(),
            dimension,
            count,
            corpus_fingerprint,
            created_at: chrono::Utc::now().timestamp().max(0) as u64,
            version: Self::CURRENT_VERSION,
        }
    }

    /// Path of the sidecar for the matrix at `artifact`.
    #[must_use]
    pub fn sidecar_path(artifact: &Path) -> PathBuf {
        artifact.with_extension("meta.json")
    }

    /// True when this metadata describes `other`'s model, shape and corpus.
    #[must_use]
    pub fn matches(&self, other: &IndexMetadata) -> bool {
        self.version == other.version
            && self.model_name == other.model_name
            && self.dimension == other.dimension
            && self.count == other.count
            && self.corpus_fingerprint == other.corpus_fingerprint
    }

    /// Writes the sidecar for `artifact`.
    pub fn save(&self, artifact: &Path) -> Result<(), VectorError> {
        let path = Self::sidecar_path(artifact);
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| VectorError::Storage(std::io::Error::other(e)))?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| VectorError::Storage(e.error))?;
        Ok(())
    }

    /// Deletes the sidecar for `artifact`, if there is one.
    ///
    /// Called before the artifact is replaced so a sidecar never describes a
    /// matrix it was not written for.
    pub fn remove(artifact: &Path) -> Result<(), VectorError> {
        match std::fs::remove_file(Self::sidecar_path(artifact)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Reads the sidecar for `artifact`.
    ///
    /// An unparsable sidecar is reported as [`VectorError::CorruptIndex`].
    pub fn load(artifact: &Path) -> Result<Self, VectorError> {
        let path = Self::sidecar_path(artifact);
        let json = std::fs::read(&path)?;
        serde_json::from_slice(&json).map_err(|e| {
            VectorError::corrupt(format!("unreadable metadata {}: {e}", path.display()))
        })
    }
}
