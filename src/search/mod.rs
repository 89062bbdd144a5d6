//! Hadith search: index lifecycle and query answering.
//!
//! - `pipeline`: embeds the corpus and loads or builds the persisted index
//! - [`QueryService`]: embeds queries, ranks and joins against the current
//!   [`IndexSnapshot`]
//! - [`join`]: maps ranked positions back to records
//! - [`IndexMetadata`]: sidecar deciding whether persisted artifacts are current

mod joiner;
mod metadata;
mod pipeline;
mod service;

pub use joiner::{JoinError, SearchHit, join};
pub use metadata::IndexMetadata;
pub use pipeline::{embed_corpus, load_or_build_index, load_or_embed};
pub use service::{IndexSnapshot, QueryService};
