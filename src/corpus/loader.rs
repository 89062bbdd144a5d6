//! Corpus ingestion from a directory tree of CSV files.
//!
//! Files are enumerated recursively and sorted by path, which fixes every
//! record's position. Damaged rows and unreadable files are skipped with a
//! warning; only a missing directory or an unusable column layout stops the
//! load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::corpus::Corpus;

/// Errors that abort corpus loading.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error(
        "Corpus directory not found: {path}\nSuggestion: Set corpus.dir in settings.toml or HS_CORPUS__DIR"
    )]
    DirectoryNotFound { path: PathBuf },

    #[error("No corpus columns configured\nSuggestion: Set corpus.columns in settings.toml")]
    NoColumns,

    #[error(
        "Text column '{column}' is not one of the configured columns\nSuggestion: Check corpus.text_column against corpus.columns"
    )]
    UnknownTextColumn { column: String },
}

/// Reads records from `*.csv` files under a directory.
#[derive(Debug, Clone)]
pub struct CorpusLoader {
    dir: PathBuf,
    columns: Vec<String>,
    text_column: usize,
    has_headers: bool,
}

/// Per-load counters, logged once loading completes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub files: usize,
    pub skipped_files: usize,
    pub rows: usize,
    pub skipped_rows: usize,
}

impl CorpusLoader {
    /// Creates a loader; positional `columns` name each CSV field.
    pub fn new(
        dir: impl Into<PathBuf>,
        columns: Vec<String>,
        text_column: &str,
        has_headers: bool,
    ) -> Result<Self, CorpusError> {
        if columns.is_empty() {
            return Err(CorpusError::NoColumns);
        }
        let text_column = columns
            .iter()
            .position(|c| c == text_column)
            .ok_or_else(|| CorpusError::UnknownTextColumn {
                column: text_column.to_string(),
            })?;

        Ok(Self {
            dir: dir.into(),
            columns,
            text_column,
            has_headers,
        })
    }

    pub fn from_config(config: &CorpusConfig) -> Result<Self, CorpusError> {
        Self::new(
            config.dir.clone(),
            config.columns.clone(),
            &config.text_column,
            config.has_headers,
        )
    }

    /// Loads every record in deterministic order.
    pub fn load(&self) -> Result<Corpus, CorpusError> {
        self.load_with_stats().map(|(corpus, _)| corpus)
    }

    /// Loads every record and reports how much was skipped.
    pub fn load_with_stats(&self) -> Result<(Corpus, LoadStats), CorpusError> {
        if !self.dir.is_dir() {
            return Err(CorpusError::DirectoryNotFound {
                path: self.dir.clone(),
            });
        }

        let files = self.csv_files();
        tracing::info!("found {} CSV files under {}", files.len(), self.dir.display());

        let mut stats = LoadStats::default();
        let mut rows = Vec::new();
        for file in &files {
            match self.read_file(file, &mut stats) {
                Ok(file_rows) => {
                    stats.files += 1;
                    rows.extend(file_rows);
                }
                Err(e) => {
                    stats.skipped_files += 1;
                    tracing::warn!("skipping {}: {e}", file.display());
                }
            }
        }

        let corpus = Corpus::from_rows(rows);
        tracing::info!(
            "loaded {} records from {} files ({} rows and {} files skipped)",
            corpus.len(),
            stats.files,
            stats.skipped_rows,
            stats.skipped_files
        );
        Ok((corpus, stats))
    }

    fn csv_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("skipping unreadable corpus entry: {e}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_csv(entry.path()))
            .map(walkdir::DirEntry::into_path)
            .collect();
        files.sort();
        files
    }

    fn read_file(
        &self,
        path: &Path,
        stats: &mut LoadStats,
    ) -> Result<Vec<(String, BTreeMap<String, String>)>, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(self.has_headers)
            .flexible(true)
            .from_path(path)?;

        let mut rows = Vec::new();
        for (line, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    stats.skipped_rows += 1;
                    tracing::warn!("{}: skipping malformed row {}: {e}", path.display(), line + 1);
                    continue;
                }
            };
            if record.len() > self.columns.len() {
                stats.skipped_rows += 1;
                tracing::warn!(
                    "{}: skipping row {} with {} fields, expected at most {}",
                    path.display(),
                    line + 1,
                    record.len(),
                    self.columns.len()
                );
                continue;
            }

            stats.rows += 1;
            let mut text = String::new();
            let mut metadata = BTreeMap::new();
            for (i, column) in self.columns.iter().enumerate() {
                let value = record.get(i).unwrap_or_default().to_string();
                if i == self.text_column {
                    text = value;
                } else {
                    metadata.insert(column.clone(), value);
                }
            }
            rows.push((text, metadata));
        }
        Ok(rows)
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}
