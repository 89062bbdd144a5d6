//! Embedding generation for corpus records and queries.
//!
//! The embedding model is an external collaborator: a deterministic function
//! from text to a fixed-dimension vector. [`EmbeddingGenerator`] is the seam;
//! [`FastEmbedGenerator`] runs a real sentence-transformer through fastembed
//! and [`StaticEmbeddingGenerator`] is a deterministic stand-in for tests and
//! offline use.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::vector::{VectorDimension, VectorError};

/// Trait for generating embeddings from text.
///
/// Implementations must be thread-safe and return vectors of exactly
/// [`EmbeddingGenerator::dimension`] floats for the lifetime of the loaded model.
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate embeddings for multiple texts, in input order.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Generate the embedding for a single text.
    fn encode(&self, text: &str) -> Result<Vec<f32>, VectorError> {
        self.encode_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| VectorError::EmbeddingFailed("model returned no embedding".to_string()))
    }

    /// Dimension of embeddings produced by this generator.
    fn dimension(&self) -> VectorDimension;

    /// Stable model identifier, recorded next to persisted indexes.
    fn model_name(&self) -> &str;
}

/// Parses a model name from configuration into a fastembed model.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, VectorError> {
    match name {
        "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML12V2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "BGESmallENV15" => Ok(EmbeddingModel::BGESmallENV15),
        "BGEBaseENV15" => Ok(EmbeddingModel::BGEBaseENV15),
        "ParaphraseMLMiniLML12V2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
        other => Err(VectorError::EmbeddingFailed(format!(
            "unknown embedding model '{other}'. Supported: AllMiniLML6V2, AllMiniLML12V2, BGESmallENV15, BGEBaseENV15, ParaphraseMLMiniLML12V2"
        ))),
    }
}

/// FastEmbed implementation (all-MiniLM-L6-v2 by default, 384 dimensions).
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: VectorDimension,
    batch_size: Option<usize>,
}

impl std::fmt::Debug for FastEmbedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedGenerator")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl FastEmbedGenerator {
    /// Loads the named model, downloading it into `cache_dir` on first use.
    ///
    /// # Errors
    /// Returns an error if the name is unknown or the model fails to initialize.
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        show_progress: bool,
        batch_size: Option<usize>,
    ) -> Result<Self, VectorError> {
        let model = parse_embedding_model(model_name)?;

        tracing::info!("loading embedding model {model_name} (cache: {})", cache_dir.display());
        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(show_progress),
        )
        .map_err(|e| VectorError::EmbeddingFailed(
            format!("Failed to initialize embedding model: {e}. Ensure you have internet connection for first-time model download")
        ))?;

        // Probe the output size once instead of trusting a table.
        let probe = text_model
            .embed(vec!["probe"], None)
            .map_err(|e| VectorError::EmbeddingFailed(e.to_string()))?;
        let dimension = VectorDimension::new(probe.first().map_or(0, Vec::len))?;

        Ok(Self {
            model: Mutex::new(text_model),
            model_name: model_name.to_string(),
            dimension,
            // fastembed chunks by this value; zero would mean empty chunks
            batch_size: batch_size.filter(|&n| n > 0),
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(texts.to_vec(), self.batch_size)
            .map_err(|e| {
                VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
            })?;

        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Deterministic embedding generator.
///
/// Known texts map to fixed vectors; any other text is embedded as a
/// normalized bag of hashed tokens, so texts sharing words land near each
/// other. Can also be configured to fail or to stall, which makes model
/// outages and slow models reproducible.
#[derive(Debug, Clone)]
pub struct StaticEmbeddingGenerator {
    dimension: VectorDimension,
    known: HashMap<String, Vec<f32>>,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl StaticEmbeddingGenerator {
    pub const MODEL_NAME: &'static str = "static-hash";

    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            known: HashMap::new(),
            failure: None,
            delay: None,
        }
    }

    /// Pins `text` to `vector`.
    ///
    /// # Errors
    /// Fails if `vector` does not have the generator's dimension.
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Result<Self, VectorError> {
        self.dimension.validate_vector(&vector)?;
        self.known.insert(text.to_string(), vector);
        Ok(self)
    }

    /// Every call fails with `EmbeddingFailed(message)`.
    #[must_use]
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Every call sleeps for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn hashed(&self, text: &str) -> Vec<f32> {
        let dim = self.dimension.get();
        let mut embedding = vec![0.0f32; dim];

        for token in text.split_whitespace() {
            let bucket = (fnv1a(token.as_bytes()) % dim as u64) as usize;
            embedding[bucket] += 1.0;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }
        embedding
    }
}

impl EmbeddingGenerator for StaticEmbeddingGenerator {
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(message) = &self.failure {
            return Err(VectorError::EmbeddingFailed(message.clone()));
        }

        Ok(texts
            .iter()
            .map(|text| {
                self.known
                    .get(*text)
                    .cloned()
                    .unwrap_or_else(|| self.hashed(text))
            })
            .collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        Self::MODEL_NAME
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}
