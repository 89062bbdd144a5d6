//! Offline half of the search pipeline: corpus → embeddings → index.
//!
//! Persisted artifacts are reused only when their sidecar metadata matches the
//! current corpus and model. A corrupt or stale index is never repaired; it is
//! rebuilt from the corpus.

use std::io::ErrorKind;
use std::path::Path;

use crate::config::Settings;
use crate::corpus::Corpus;
use crate::error::{SearchError, SearchResult};
use crate::search::IndexMetadata;
use crate::vector::{EmbeddingGenerator, VectorError, VectorIndex, read_matrix, write_matrix};

/// Embeds every record's normalized text in position order.
///
/// Texts are sent in batches of `batch_size`; every returned vector must have
/// the generator's dimension.
pub fn embed_corpus(
    embedder: &dyn EmbeddingGenerator,
    corpus: &Corpus,
    batch_size: usize,
) -> SearchResult<Vec<Vec<f32>>> {
    let texts = corpus.normalized_texts();
    let dimension = embedder.dimension();
    let mut embeddings = Vec::with_capacity(texts.len());

    for (batch_number, batch) in texts.chunks(batch_size.max(1)).enumerate() {
        let vectors = embedder.encode_batch(batch).map_err(SearchError::Embedding)?;
        if vectors.len() != batch.len() {
            return Err(SearchError::Embedding(VectorError::EmbeddingFailed(format!(
                "model returned {} embeddings for {} texts",
                vectors.len(),
                batch.len()
            ))));
        }
        for vector in &vectors {
            dimension.validate_vector(vector)?;
        }
        embeddings.extend(vectors);
        tracing::debug!(
            "embedded batch {} ({}/{} records)",
            batch_number + 1,
            embeddings.len(),
            texts.len()
        );
    }

    Ok(embeddings)
}

/// Returns the corpus embeddings, from the cache when it is current.
///
/// A fresh embedding run rewrites the cache. Cache write failures are logged
/// and do not fail the build.
pub fn load_or_embed(
    settings: &Settings,
    corpus: &Corpus,
    embedder: &dyn EmbeddingGenerator,
    force: bool,
) -> SearchResult<Vec<Vec<f32>>> {
    let cache_path = settings.index.embedding_cache.as_path();
    let expected = expected_metadata(corpus, embedder);

    if !force && !corpus.is_empty() {
        match read_current(cache_path, &expected) {
            Ok(Some(data)) => {
                tracing::info!("loaded {} embeddings from cache", corpus.len());
                let rows = data
                    .chunks_exact(expected.dimension)
                    .map(<[f32]>::to_vec)
                    .collect();
                return Ok(rows);
            }
            Ok(None) => tracing::info!("embedding cache is stale, regenerating"),
            Err(e) => log_unusable("embedding cache", cache_path, &e),
        }
    }

    tracing::info!(
        "generating embeddings for {} records with {}",
        corpus.len(),
        embedder.model_name()
    );
    let embeddings = embed_corpus(embedder, corpus, settings.embedding.batch_size)?;

    if !embeddings.is_empty() {
        let flat: Vec<f32> = embeddings.iter().flatten().copied().collect();
        let written = IndexMetadata::remove(cache_path)
            .and_then(|()| write_matrix(cache_path, embedder.dimension(), &flat))
            .and_then(|()| expected.save(cache_path));
        if let Err(e) = written {
            tracing::warn!("could not write embedding cache {}: {e}", cache_path.display());
        }
    }

    Ok(embeddings)
}

/// Loads the persisted index if it matches `corpus`, otherwise builds a new
/// one from the corpus and persists it with its metadata.
pub fn load_or_build_index<I: VectorIndex>(
    settings: &Settings,
    corpus: &Corpus,
    embedder: &dyn EmbeddingGenerator,
    force: bool,
) -> SearchResult<I> {
    let index_path = settings.index.path.as_path();
    let expected = expected_metadata(corpus, embedder);

    if !force && !corpus.is_empty() {
        match load_current::<I>(index_path, &expected) {
            Ok(Some(index)) => return Ok(index),
            Ok(None) => tracing::warn!(
                "index at {} was built from a different corpus or model, rebuilding",
                index_path.display()
            ),
            Err(e) => log_unusable("index", index_path, &e),
        }
    }

    let embeddings = load_or_embed(settings, corpus, embedder, force)?;
    let index = I::build(&embeddings)?;

    if index.is_empty() {
        tracing::warn!("corpus is empty; index not persisted and searches will fail");
    } else {
        IndexMetadata::remove(index_path)?;
        index.persist(index_path)?;
        expected.save(index_path)?;
    }

    Ok(index)
}

fn expected_metadata(corpus: &Corpus, embedder: &dyn EmbeddingGenerator) -> IndexMetadata {
    IndexMetadata::new(
        embedder.model_name(),
        embedder.dimension().get(),
        corpus.len(),
        corpus.fingerprint(),
    )
}

fn load_current<I: VectorIndex>(
    path: &Path,
    expected: &IndexMetadata,
) -> Result<Option<I>, VectorError> {
    let metadata = IndexMetadata::load(path)?;
    if !metadata.matches(expected) {
        return Ok(None);
    }
    let index = I::load(path)?;
    if index.len() != expected.count
        || index.dimension().map(|d| d.get()) != Some(expected.dimension)
    {
        return Err(VectorError::corrupt(format!(
            "index shape does not match its metadata ({} vectors expected)",
            expected.count
        )));
    }
    Ok(Some(index))
}

fn read_current(path: &Path, expected: &IndexMetadata) -> Result<Option<Vec<f32>>, VectorError> {
    let metadata = IndexMetadata::load(path)?;
    if !metadata.matches(expected) {
        return Ok(None);
    }
    let stored = read_matrix(path)?;
    if stored.count != expected.count || stored.dimension.get() != expected.dimension {
        return Err(VectorError::corrupt("cache shape does not match its metadata"));
    }
    Ok(Some(stored.data))
}

fn log_unusable(what: &str, path: &Path, err: &VectorError) {
    match err {
        VectorError::Storage(io) if io.kind() == ErrorKind::NotFound => {
            tracing::info!("no {what} at {}, building", path.display());
        }
        _ => tracing::warn!("{what} at {} is unusable, rebuilding: {err}", path.display()),
    }
}
