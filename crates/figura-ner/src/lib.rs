//! Local, network-free named entity recognition for biomedical text.
//!
//! Used as the last-resort tier of the entity extractor when no annotation
//! service has anything for a paper. Three layers feed one dedup pass:
//! an optional statistical tagger, a regular-expression layer and a small
//! fixed dictionary.

mod entity_types;
mod dictionary;
mod heuristic;
mod tagger;

pub use entity_types::{EntityType, normalize_entity_label, refine_entity_type};
pub use dictionary::{DictionaryMatch, TrieDictionary};
pub use heuristic::{ExtractedEntity, ExtractionLayer, HeuristicExtractor};
pub use tagger::{EntityTagger, TaggedSpan};

pub type Result<T> = std::result::Result<T, NerError>;

#[derive(Debug, thiserror::Error)]
pub enum NerError {
    #[error("Tagger failed: {0}")]
    Tagger(String),

    #[error("Dictionary build failed: {0}")]
    Dictionary(String),
}

impl From<aho_corasick::BuildError> for NerError {
    fn from(e: aho_corasick::BuildError) -> Self {
        NerError::Dictionary(e.to_string())
    }
}
