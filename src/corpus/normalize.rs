//! Text normalization applied to corpus records before embedding.

use std::sync::LazyLock;

use regex::Regex;

static NON_ALPHANUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9\s]").expect("static pattern is valid")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern is valid"));

/// Lowercases `text`, strips everything except ASCII letters, digits and
/// whitespace, then collapses whitespace runs into single spaces.
///
/// Deterministic: the same input always yields the same output.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = NON_ALPHANUMERIC.replace_all(&lowered, "");
    WHITESPACE_RUN.replace_all(&stripped, " ").trim().to_string()
}
