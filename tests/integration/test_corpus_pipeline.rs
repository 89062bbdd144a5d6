//! Corpus ingestion through to joined hits.

use hadith_search::corpus::{CorpusError, columns};
use hadith_search::search::{embed_corpus, join};
use hadith_search::{CorpusLoader, FlatIndex, Position, VectorIndex};

use crate::common::{HEADER, Row, TestCorpus, embedder, sample_books};

#[test]
fn test_positions_follow_sorted_file_order() {
    let corpus = TestCorpus::new();
    sample_books(&corpus);
    // Not a CSV; never read.
    corpus.add_file("muslim/notes.txt", "ignored");

    let loaded = CorpusLoader::from_config(&corpus.settings().corpus)
        .unwrap()
        .load()
        .unwrap();

    let texts: Vec<&str> = loaded.records().iter().map(|r| r.text()).collect();
    assert_eq!(
        texts,
        vec![
            "Actions are judged by intentions",
            "Pray the five daily prayers on time",
            "Fasting in Ramadan is an obligation",
            "Give charity even with half a date",
        ]
    );
    for (i, record) in loaded.records().iter().enumerate() {
        assert_eq!(record.position().as_usize(), i);
    }
    assert_eq!(
        loaded.records()[1].field(columns::CHAPTER_ENGLISH),
        Some("Prayer")
    );
    assert_eq!(
        loaded.records()[1].normalized(),
        "pray the five daily prayers on time"
    );
}

#[test]
fn test_oversized_rows_are_skipped_and_counted() {
    let corpus = TestCorpus::new();
    let good = "1,Faith,,1,Pillars,,1,Faith has branches,,,,,,,Sahih,";
    let too_long = "1,Faith,,1,Pillars,,2,Too many fields,,,,,,,Sahih,,extra";
    corpus.add_file("book.csv", &format!("{HEADER}\n{good}\n{too_long}\n{good}\n"));

    let (loaded, stats) = CorpusLoader::from_config(&corpus.settings().corpus)
        .unwrap()
        .load_with_stats()
        .unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(stats.files, 1);
    assert_eq!(stats.rows, 2);
    assert_eq!(stats.skipped_rows, 1);
}

#[test]
fn test_unknown_text_column_is_rejected() {
    let corpus = TestCorpus::new();
    let mut settings = corpus.settings();
    settings.corpus.text_column = "Hadith_Text".to_string();

    assert!(matches!(
        CorpusLoader::from_config(&settings.corpus),
        Err(CorpusError::UnknownTextColumn { .. })
    ));
}

#[test]
fn test_same_corpus_has_same_fingerprint() {
    let first = TestCorpus::new();
    sample_books(&first);
    let second = TestCorpus::new();
    sample_books(&second);

    let load = |c: &TestCorpus| {
        CorpusLoader::from_config(&c.settings().corpus)
            .unwrap()
            .load()
            .unwrap()
    };
    let a = load(&first);
    let b = load(&second);
    assert_eq!(a.fingerprint(), b.fingerprint());

    second.add_book("zz.csv", &[Row::new("Extra", "Extra", "One more hadith")]);
    assert_ne!(a.fingerprint(), load(&second).fingerprint());
}

#[test]
fn test_embed_build_search_join() {
    let corpus = TestCorpus::new();
    sample_books(&corpus);
    let loaded = CorpusLoader::from_config(&corpus.settings().corpus)
        .unwrap()
        .load()
        .unwrap();
    let embedder = embedder();

    let embeddings = embed_corpus(&embedder, &loaded, 3).unwrap();
    let index = FlatIndex::build(&embeddings).unwrap();
    let query = embeddings[3].clone();

    let neighbors = index.search(&query, 2).unwrap();
    let hits = join(&neighbors, loaded.records()).unwrap();

    assert_eq!(hits[0].position, Position::new(3));
    assert_eq!(hits[0].source, "Chapter: Charity, Section: Zakat");
    assert_eq!(
        hits[0].metadata.get(columns::ENGLISH_GRADE).map(String::as_str),
        Some("Sahih")
    );
    assert_eq!(hits.len(), 2);

    // An index from a bigger corpus cannot be joined to this one.
    let err = join(&neighbors, &loaded.records()[..2]).unwrap_err();
    assert!(err.to_string().contains("out of range"));
}
