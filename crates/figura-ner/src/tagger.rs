//! Seam for a statistical named-entity tagger.

use crate::Result;

/// A span produced by a general-purpose tagger, with its raw label
/// (e.g. "ORG", "PRODUCT", "B-DISEASE").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSpan {
    pub text: String,
    pub label: String,
    /// Byte offsets into the tagged text.
    pub start: usize,
    pub end: usize,
}

/// A statistical tagger. None ships with Figura; deployments that have a
/// model plug it in through `HeuristicExtractor::with_tagger`.
pub trait EntityTagger: Send + Sync {
    fn name(&self) -> &str;

    fn tag(&self, text: &str) -> Result<Vec<TaggedSpan>>;
}
