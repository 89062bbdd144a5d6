//! Corpus records and ingestion.
//!
//! The corpus is the ordered collection of records the index is built from.
//! Ordering is deterministic and defines each record's position.

mod loader;
mod normalize;
mod record;

pub use loader::{CorpusError, CorpusLoader, LoadStats};
pub use normalize::normalize_text;
pub use record::{Corpus, Record};

/// Column names of the LK-Hadith-Corpus CSV files, in file order.
pub mod columns {
    pub const CHAPTER_NUMBER: &str = "Chapter_Number";
    pub const CHAPTER_ENGLISH: &str = "Chapter_English";
    pub const CHAPTER_ARABIC: &str = "Chapter_Arabic";
    pub const SECTION_NUMBER: &str = "Section_Number";
    pub const SECTION_ENGLISH: &str = "Section_English";
    pub const SECTION_ARABIC: &str = "Section_Arabic";
    pub const HADITH_NUMBER: &str = "Hadith_Number";
    pub const ENGLISH_HADITH: &str = "English_Hadith";
    pub const ENGLISH_ISNAD: &str = "English_Isnad";
    pub const ENGLISH_MATN: &str = "English_Matn";
    pub const ARABIC_HADITH: &str = "Arabic_Hadith";
    pub const ARABIC_ISNAD: &str = "Arabic_Isnad";
    pub const ARABIC_MATN: &str = "Arabic_Matn";
    pub const ARABIC_COMMENT: &str = "Arabic_Comment";
    pub const ENGLISH_GRADE: &str = "English_Grade";
    pub const ARABIC_GRADE: &str = "Arabic_Grade";

    pub const ALL: [&str; 16] = [
        CHAPTER_NUMBER,
        CHAPTER_ENGLISH,
        CHAPTER_ARABIC,
        SECTION_NUMBER,
        SECTION_ENGLISH,
        SECTION_ARABIC,
        HADITH_NUMBER,
        ENGLISH_HADITH,
        ENGLISH_ISNAD,
        ENGLISH_MATN,
        ARABIC_HADITH,
        ARABIC_ISNAD,
        ARABIC_MATN,
        ARABIC_COMMENT,
        ENGLISH_GRADE,
        ARABIC_GRADE,
    ];
}
