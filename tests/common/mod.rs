use hadith_search::Settings;
use hadith_search::vector::{StaticEmbeddingGenerator, VectorDimension};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const HEADER: &str = "Chapter_Number,Chapter_English,Chapter_Arabic,Section_Number,Section_English,Section_Arabic,Hadith_Number,English_Hadith,English_Isnad,English_Matn,Arabic_Hadith,Arabic_Isnad,Arabic_Matn,Arabic_Comment,English_Grade,Arabic_Grade";

/// A temporary workspace holding a corpus directory and index artifacts.
pub struct TestCorpus {
    pub dir: TempDir,
}

impl TestCorpus {
    pub fn new() -> Self {
        let corpus = Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        };
        fs::create_dir_all(corpus.corpus_dir()).expect("Failed to create corpus dir");
        corpus
    }

    pub fn corpus_dir(&self) -> PathBuf {
        self.dir.path().join("corpus")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a CSV with the standard header and one row per hadith.
    pub fn add_book(&self, relative: &str, rows: &[Row]) -> PathBuf {
        let mut content = String::from(HEADER);
        content.push('\n');
        for row in rows {
            content.push_str(&row.to_csv());
            content.push('\n');
        }
        self.add_file(relative, &content)
    }

    pub fn add_file(&self, relative: &str, content: &str) -> PathBuf {
        let file_path = self.corpus_dir().join(relative);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    /// Settings pointing every path into this workspace.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.corpus.dir = self.corpus_dir();
        settings.index.path = self.path().join("index/hadith.vec");
        settings.index.embedding_cache = self.path().join("index/embeddings.vec");
        settings.embedding.models_dir = self.path().join("models");
        settings.embedding.batch_size = 4;
        settings
    }
}

/// One row of the LK-Hadith-Corpus layout.
pub struct Row {
    pub chapter: &'static str,
    pub section: &'static str,
    pub english: &'static str,
    pub arabic: &'static str,
    pub grade: &'static str,
}

impl Row {
    pub fn new(chapter: &'static str, section: &'static str, english: &'static str) -> Self {
        Self {
            chapter,
            section,
            english,
            arabic: "",
            grade: "Sahih",
        }
    }

    fn to_csv(&self) -> String {
        let quote = |s: &str| format!("\"{}\"", s.replace('"', "\"\""));
        let fields: [String; 16] = [
            "1".to_string(),
            quote(self.chapter),
            String::new(),
            "1".to_string(),
            quote(self.section),
            String::new(),
            "1".to_string(),
            quote(self.english),
            String::new(),
            String::new(),
            quote(self.arabic),
            String::new(),
            String::new(),
            String::new(),
            quote(self.grade),
            String::new(),
        ];
        fields.join(",")
    }
}

pub fn embedder() -> StaticEmbeddingGenerator {
    StaticEmbeddingGenerator::new(VectorDimension::new(64).expect("valid dimension"))
}

/// A small corpus spread over two books.
pub fn sample_books(corpus: &TestCorpus) {
    corpus.add_book(
        "bukhari/book1.csv",
        &[
            Row::new("Revelation", "Intentions", "Actions are judged by intentions"),
            Row::new("Prayer", "Times", "Pray the five daily prayers on time"),
        ],
    );
    corpus.add_book(
        "muslim/book1.csv",
        &[
            Row::new("Fasting", "Ramadan", "Fasting in Ramadan is an obligation"),
            Row::new("Charity", "Zakat", "Give charity even with half a date"),
        ],
    );
}
