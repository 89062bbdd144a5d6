//! End-to-end query tests: CSV corpus on disk → index → ranked, joined hits.

use std::sync::Arc;
use std::time::Duration;

use hadith_search::search::IndexMetadata;
use hadith_search::vector::{EmbeddingGenerator, VectorError};
use hadith_search::{Position, QueryService, SearchError};

use crate::common::{Row, TestCorpus, embedder, sample_books};

fn service(corpus: &TestCorpus) -> QueryService {
    QueryService::initialize(&corpus.settings(), Arc::new(embedder()))
        .expect("service should initialize")
}

#[test]
fn test_exact_text_ranks_first_with_zero_distance() {
    let corpus = TestCorpus::new();
    sample_books(&corpus);
    let service = service(&corpus);

    let hits = service
        .search("fasting in ramadan is an obligation", Some(2))
        .unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].position, Position::new(2));
    assert_eq!(hits[0].text, "Fasting in Ramadan is an obligation");
    assert!(hits[0].distance.abs() < 1e-6);
    assert_eq!(hits[0].source, "Chapter: Fasting, Section: Ramadan");
    assert_eq!(hits[0].grade, "Sahih");
    assert!(hits[0].distance <= hits[1].distance);
}

#[test]
fn test_query_reaches_the_model_as_typed() {
    let corpus = TestCorpus::new();
    sample_books(&corpus);
    let intentions = embedder().encode("actions are judged by intentions").unwrap();
    let pinned = embedder()
        .with_vector("Which deeds count, and why?", intentions)
        .unwrap();
    let service = <QueryService>::initialize(&corpus.settings(), Arc::new(pinned)).unwrap();

    let hits = service
        .search("  Which deeds count, and why?\n", Some(1))
        .unwrap();
    assert_eq!(hits[0].text, "Actions are judged by intentions");
    assert!(hits[0].distance.abs() < 1e-6);
}

#[test]
fn test_limit_defaults_and_caps_at_corpus_size() {
    let corpus = TestCorpus::new();
    sample_books(&corpus);
    let mut settings = corpus.settings();
    settings.search.default_limit = 3;
    let service = <QueryService>::initialize(&settings, Arc::new(embedder())).unwrap();

    assert_eq!(service.search("prayer", None).unwrap().len(), 3);
    assert_eq!(service.search("prayer", Some(50)).unwrap().len(), 4);
    assert!(service.search("prayer", Some(0)).unwrap().is_empty());
}

#[test]
fn test_empty_query_is_a_caller_error() {
    let corpus = TestCorpus::new();
    sample_books(&corpus);
    let service = service(&corpus);

    let err = service.search(" \t ", None).unwrap_err();
    assert!(err.is_caller_error());
    assert_eq!(err.to_body().kind, "EMPTY_QUERY");
}

#[test]
fn test_second_start_reuses_persisted_index() {
    let corpus = TestCorpus::new();
    sample_books(&corpus);
    let settings = corpus.settings();
    let first = service(&corpus);
    let expected = first.search("intentions", Some(4)).unwrap();
    first.shutdown();

    assert!(settings.index.path.exists());
    let metadata = IndexMetadata::load(&settings.index.path).unwrap();
    assert_eq!(metadata.count, 4);
    assert_eq!(metadata.dimension, 64);

    // Startup never embeds when the index is current, so a broken model
    // still comes up; only queries need it.
    let broken = <QueryService>::initialize(&settings, Arc::new(embedder().failing("offline")))
        .expect("current index should load without embedding");
    assert_eq!(broken.len(), 4);
    assert!(matches!(
        broken.search("intentions", None),
        Err(SearchError::Embedding(VectorError::EmbeddingFailed(_)))
    ));

    let restarted = service(&corpus);
    assert_eq!(restarted.search("intentions", Some(4)).unwrap(), expected);
}

#[test]
fn test_changed_corpus_triggers_rebuild_on_start() {
    let corpus = TestCorpus::new();
    sample_books(&corpus);
    service(&corpus).shutdown();

    corpus.add_book(
        "tirmidhi/book1.csv",
        &[Row::new("Manners", "Smiling", "Smiling at your brother is charity")],
    );
    let service = service(&corpus);

    assert_eq!(service.len(), 5);
    let hits = service
        .search("smiling at your brother is charity", Some(1))
        .unwrap();
    assert_eq!(hits[0].position, Position::new(4));
    assert_eq!(
        IndexMetadata::load(&corpus.settings().index.path).unwrap().count,
        5
    );
}

#[test]
fn test_corrupt_index_file_is_rebuilt_on_start() {
    let corpus = TestCorpus::new();
    sample_books(&corpus);
    let settings = corpus.settings();
    service(&corpus).shutdown();

    let bytes = std::fs::read(&settings.index.path).unwrap();
    std::fs::write(&settings.index.path, &bytes[..bytes.len() - 3]).unwrap();

    let service = service(&corpus);
    assert_eq!(service.len(), 4);
    assert!(service.search("prayers", Some(1)).is_ok());
}

#[test]
fn test_missing_corpus_directory_aborts_start() {
    let corpus = TestCorpus::new();
    let mut settings = corpus.settings();
    settings.corpus.dir = corpus.path().join("does-not-exist");

    let err = <QueryService>::initialize(&settings, Arc::new(embedder())).unwrap_err();
    assert!(matches!(err, SearchError::Corpus(_)));
    assert!(!settings.index.path.exists());
}

#[test]
fn test_empty_corpus_starts_but_searches_fail() {
    let corpus = TestCorpus::new();
    let service = service(&corpus);

    assert!(service.is_empty());
    let err = service.search("anything", None).unwrap_err();
    assert_eq!(err.status_code(), "EMPTY_INDEX");
}

#[test]
fn test_rebuild_installs_new_corpus() {
    let corpus = TestCorpus::new();
    sample_books(&corpus);
    let service = service(&corpus);
    let old = service.snapshot();

    corpus.add_book(
        "bukhari/book2.csv",
        &[Row::new("Knowledge", "Seeking", "Seeking knowledge is an obligation")],
    );
    let reloaded = hadith_search::CorpusLoader::from_config(&corpus.settings().corpus)
        .unwrap()
        .load()
        .unwrap();
    service.rebuild(reloaded).unwrap();

    assert_eq!(old.corpus().len(), 4);
    assert_eq!(service.len(), 5);
    let hits = service
        .search("seeking knowledge is an obligation", Some(1))
        .unwrap();
    // bukhari/book2.csv sorts between bukhari/book1.csv and muslim/book1.csv
    assert_eq!(hits[0].position, Position::new(2));
}

#[tokio::test]
async fn test_slow_model_times_out() {
    let corpus = TestCorpus::new();
    sample_books(&corpus);
    let settings = corpus.settings();
    service(&corpus).shutdown();

    let slow = embedder().with_delay(Duration::from_millis(300));
    assert_eq!(slow.model_name(), embedder().model_name());
    let service = <QueryService>::initialize(&settings, Arc::new(slow)).unwrap();

    let err = service
        .search_with_timeout("prayer", None, Duration::from_millis(10))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), "TIMEOUT");

    let hits = service
        .search_with_timeout("prayer", Some(1), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
}
