//! Online half of the search pipeline.
//!
//! [`QueryService`] owns the embedding model and the current
//! [`IndexSnapshot`]. A search embeds the query, ranks with the index and
//! joins positions back to records. The corpus and index always travel
//! together in one snapshot; a rebuild installs a new snapshot atomically and
//! searches already running keep the one they started with.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::config::{DEFAULT_BATCH_SIZE, SearchConfig, Settings};
use crate::corpus::{Corpus, CorpusLoader};
use crate::error::{SearchError, SearchResult};
use crate::search::pipeline::{embed_corpus, load_or_build_index};
use crate::search::{SearchHit, join};
use crate::vector::{EmbeddingGenerator, FlatIndex, VectorDimension, VectorError, VectorIndex};

/// A corpus and the index built from it.
#[derive(Debug)]
pub struct IndexSnapshot<I = FlatIndex> {
    corpus: Corpus,
    index: I,
}

impl<I: VectorIndex> IndexSnapshot<I> {
    /// Pairs `corpus` with `index`.
    ///
    /// # Errors
    /// [`SearchError::OutOfSync`] when they disagree on the number of entries.
    pub fn new(corpus: Corpus, index: I) -> SearchResult<Self> {
        if index.len() != corpus.len() {
            return Err(SearchError::OutOfSync {
                index_len: index.len(),
                corpus_len: corpus.len(),
            });
        }
        Ok(Self { corpus, index })
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Ranks `query` and joins the ranking to records.
    fn search(&self, query: &[f32], limit: usize) -> SearchResult<Vec<SearchHit>> {
        let neighbors = self.index.search(query, limit)?;
        Ok(join(&neighbors, self.corpus.records())?)
    }
}

/// Answers text queries against the current snapshot.
pub struct QueryService<I: VectorIndex = FlatIndex> {
    embedder: Arc<dyn EmbeddingGenerator>,
    snapshot: ArcSwap<IndexSnapshot<I>>,
    config: SearchConfig,
    batch_size: usize,
}

impl<I: VectorIndex> std::fmt::Debug for QueryService<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("model", &self.embedder.model_name())
            .field("records", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

impl<I: VectorIndex> QueryService<I> {
    /// Creates a service over an already built snapshot.
    ///
    /// # Errors
    /// [`VectorError::DimensionMismatch`] when the index was built with a
    /// different dimension than the embedder produces.
    pub fn new(
        embedder: Arc<dyn EmbeddingGenerator>,
        snapshot: IndexSnapshot<I>,
        config: SearchConfig,
    ) -> SearchResult<Self> {
        check_dimension(embedder.dimension(), &snapshot.index)?;
        Ok(Self {
            embedder,
            snapshot: ArcSwap::from_pointee(snapshot),
            config,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Batch size used when [`QueryService::rebuild`] re-embeds a corpus.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Embeds `corpus`, builds an index and wraps both in a service.
    ///
    /// Nothing is persisted.
    pub fn build(
        embedder: Arc<dyn EmbeddingGenerator>,
        corpus: Corpus,
        config: SearchConfig,
    ) -> SearchResult<Self> {
        let embeddings = embed_corpus(embedder.as_ref(), &corpus, DEFAULT_BATCH_SIZE)?;
        let index = I::build(&embeddings)?;
        Self::new(embedder, IndexSnapshot::new(corpus, index)?, config)
    }

    /// Loads the corpus named by `settings` and brings the service up.
    ///
    /// A persisted index is reused when its metadata matches the corpus and
    /// model. Otherwise it is rebuilt and persisted first. Any corpus,
    /// embedding or build failure aborts startup.
    pub fn initialize(
        settings: &Settings,
        embedder: Arc<dyn EmbeddingGenerator>,
    ) -> SearchResult<Self> {
        let (corpus, stats) = CorpusLoader::from_config(&settings.corpus)?.load_with_stats()?;
        tracing::info!(
            "loaded {} records from {} files ({} rows skipped, {} files skipped)",
            corpus.len(),
            stats.files,
            stats.skipped_rows,
            stats.skipped_files
        );
        if corpus.is_empty() {
            tracing::warn!("corpus at {} is empty", settings.corpus.dir.display());
        }

        let index = load_or_build_index::<I>(settings, &corpus, embedder.as_ref(), false)?;
        let service = Self::new(
            embedder,
            IndexSnapshot::new(corpus, index)?,
            settings.search.clone(),
        )?
        .with_batch_size(settings.embedding.batch_size);

        tracing::info!("query service ready with {} records", service.len());
        Ok(service)
    }

    /// Searches for the records closest to `text`.
    ///
    /// `limit` defaults to `search.default_limit` and is capped at
    /// `search.max_limit`; fewer hits come back when the corpus is smaller.
    pub fn search(&self, text: &str, limit: Option<usize>) -> SearchResult<Vec<SearchHit>> {
        let query = prepare_query(text)?;
        let limit = self.config.resolve_limit(limit);

        let embedding = self
            .embedder
            .encode(&query)
            .map_err(SearchError::Embedding)?;
        self.search_embedding(&embedding, limit)
    }

    /// Like [`QueryService::search`], but gives up if embedding the query
    /// takes longer than `timeout`.
    ///
    /// The model call runs on tokio's blocking pool. On timeout it is left to
    /// finish in the background and its result is discarded.
    pub async fn search_with_timeout(
        &self,
        text: &str,
        limit: Option<usize>,
        timeout: Duration,
    ) -> SearchResult<Vec<SearchHit>> {
        let query = prepare_query(text)?;
        let limit = self.config.resolve_limit(limit);

        let embedder = Arc::clone(&self.embedder);
        let task = tokio::task::spawn_blocking(move || embedder.encode(&query));

        let embedding = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result.map_err(SearchError::Embedding)?,
            Ok(Err(join_error)) => {
                return Err(SearchError::Embedding(VectorError::EmbeddingFailed(format!(
                    "embedding task failed: {join_error}"
                ))));
            }
            Err(_) => {
                tracing::warn!("query embedding exceeded {}ms", timeout.as_millis());
                return Err(SearchError::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };

        self.search_embedding(&embedding, limit)
    }

    /// Ranks an already embedded query against the current snapshot.
    pub fn search_embedding(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> SearchResult<Vec<SearchHit>> {
        let snapshot = self.snapshot.load();
        snapshot.search(embedding, limit)
    }

    /// Re-embeds `corpus`, builds a fresh index and installs both.
    ///
    /// On failure the current snapshot stays in place.
    pub fn rebuild(&self, corpus: Corpus) -> SearchResult<()> {
        tracing::info!("rebuilding index for {} records", corpus.len());
        let embeddings = embed_corpus(self.embedder.as_ref(), &corpus, self.batch_size)?;
        let index = I::build(&embeddings)?;
        self.install(IndexSnapshot::new(corpus, index)?)
    }

    /// Atomically replaces the current snapshot.
    pub fn install(&self, snapshot: IndexSnapshot<I>) -> SearchResult<()> {
        check_dimension(self.embedder.dimension(), &snapshot.index)?;
        let records = snapshot.corpus.len();
        self.snapshot.store(Arc::new(snapshot));
        tracing::info!("installed index snapshot with {records} records");
        Ok(())
    }

    /// The snapshot searches currently run against.
    pub fn snapshot(&self) -> Arc<IndexSnapshot<I>> {
        self.snapshot.load_full()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Number of searchable records.
    pub fn len(&self) -> usize {
        self.snapshot.load().corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> VectorDimension {
        self.embedder.dimension()
    }

    /// Tears the service down. Snapshots still held by in-flight searches
    /// are released when those searches finish.
    pub fn shutdown(self) {
        tracing::info!("shutting down query service ({} records)", self.len());
    }
}

/// Trims the query text. The model sees it otherwise unchanged.
fn prepare_query(text: &str) -> SearchResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    Ok(trimmed.to_string())
}

fn check_dimension<I: VectorIndex>(expected: VectorDimension, index: &I) -> SearchResult<()> {
    match index.dimension() {
        Some(actual) if actual != expected => Err(VectorError::DimensionMismatch {
            expected: expected.get(),
            actual: actual.get(),
        }
        .into()),
        _ => Ok(()),
    }
}
