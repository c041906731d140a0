//! Local, offline entity extraction.
//!
//! Three layers run over the same text and their results are merged:
//!
//! 1. An optional [`EntityTagger`] (a general-purpose NER model), whose
//!    labels are normalised and then refined from the mention's wording.
//! 2. Shape-based regexes: gene-like symbols, disease suffixes and
//!    "<Word> syndrome" style phrases.
//! 3. The embedded [`TrieDictionary`].
//!
//! Offsets on [`ExtractedEntity`] are character offsets.

use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, warn};

use crate::dictionary::TrieDictionary;
use crate::entity_types::{normalize_entity_label, refine_entity_type, EntityType};
use crate::tagger::EntityTagger;
use crate::Result;

/// Which layer produced a mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ExtractionLayer {
    Tagger,
    Regex,
    Dictionary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntity {
    pub text: String,
    pub label: EntityType,
    pub start: usize,
    pub end: usize,
    pub layer: ExtractionLayer,
}

lazy_static::lazy_static! {
    static ref GENE_SYMBOL: Regex =
        Regex::new(r"\b[A-Za-z][A-Za-z0-9]*-?[0-9][A-Za-z0-9]*\b").unwrap();
    static ref POINT_MUTATION: Regex = Regex::new(r"^[A-Z][0-9]+[A-Z]$").unwrap();
    static ref DISEASE_SUFFIX: Regex =
        Regex::new(r"(?i)\b[a-z][a-z-]{2,}(?:osis|oma|itis)\b").unwrap();
    static ref DISEASE_PHRASE: Regex =
        Regex::new(r"\b([A-Za-z][A-Za-z'-]+)\s+(?:syndrome|disease|disorder)\b").unwrap();
}

/// Words that end in a disease suffix but are not diseases.
const SUFFIX_FALSE_POSITIVES: &[&str] = &["diploma", "aroma", "stoma", "soma"];

/// Leading words that turn "<Word> disease" into a non-name.
const PHRASE_STOPWORDS: &[&str] = &[
    "the", "this", "that", "these", "those", "a", "an", "of", "and", "or", "with", "in", "for",
    "their", "its", "our", "his", "her", "no", "any",
];

pub struct HeuristicExtractor {
    tagger: Option<Box<dyn EntityTagger>>,
    dictionary: TrieDictionary,
}

impl HeuristicExtractor {
    /// Regex and dictionary layers only.
    pub fn new() -> Result<Self> {
        Ok(Self {
            tagger: None,
            dictionary: TrieDictionary::embedded()?,
        })
    }

    pub fn with_tagger(mut self, tagger: Box<dyn EntityTagger>) -> Self {
        self.tagger = Some(tagger);
        self
    }

    pub fn with_dictionary(mut self, dictionary: TrieDictionary) -> Self {
        self.dictionary = dictionary;
        self
    }

    /// Run every layer over `text`. Never fails: a tagger error is logged
    /// and the remaining layers still contribute.
    pub fn extract(&self, text: &str) -> Vec<ExtractedEntity> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut found: Vec<(String, EntityType, usize, usize, ExtractionLayer)> = Vec::new();

        // ── Layer 1: tagger ──
        if let Some(tagger) = &self.tagger {
            match tagger.tag(text) {
                Ok(spans) => {
                    for span in spans {
                        let ty = refine_entity_type(&span.text, normalize_entity_label(&span.label));
                        if ty == EntityType::Other {
                            continue;
                        }
                        found.push((span.text, ty, span.start, span.end, ExtractionLayer::Tagger));
                    }
                }
                Err(e) => warn!("Tagger '{}' failed, continuing without it: {}", tagger.name(), e),
            }
        }

        // ── Layer 3 first, so regex hits inside dictionary terms can be dropped ──
        let dict_hits = self.dictionary.find(text);
        let covered = |start: usize, end: usize| {
            dict_hits.iter().any(|h| start < h.end && h.start < end)
        };

        // ── Layer 2: regex ──
        for m in GENE_SYMBOL.find_iter(text) {
            let token = m.as_str();
            let len = token.chars().count();
            if !(2..=12).contains(&len)
                || !token.chars().any(|c| c.is_ascii_uppercase())
                || covered(m.start(), m.end())
            {
                continue;
            }
            let ty = if POINT_MUTATION.is_match(token) {
                EntityType::Mutation
            } else {
                EntityType::Gene
            };
            found.push((token.to_string(), ty, m.start(), m.end(), ExtractionLayer::Regex));
        }

        for m in DISEASE_SUFFIX.find_iter(text) {
            let lower = m.as_str().to_lowercase();
            if SUFFIX_FALSE_POSITIVES.contains(&lower.as_str()) || covered(m.start(), m.end()) {
                continue;
            }
            found.push((m.as_str().to_string(), EntityType::Disease, m.start(), m.end(), ExtractionLayer::Regex));
        }

        for caps in DISEASE_PHRASE.captures_iter(text) {
            let (Some(whole), Some(lead)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if PHRASE_STOPWORDS.contains(&lead.as_str().to_lowercase().as_str()) {
                continue;
            }
            found.push((whole.as_str().to_string(), EntityType::Disease, whole.start(), whole.end(), ExtractionLayer::Regex));
        }

        for hit in dict_hits {
            found.push((hit.text, hit.label, hit.start, hit.end, ExtractionLayer::Dictionary));
        }

        // Dedup by (lowercase text, type); earlier layers win.
        let mut seen = HashSet::new();
        let entities: Vec<ExtractedEntity> = found
            .into_iter()
            .filter(|(t, ty, ..)| seen.insert((t.to_lowercase(), *ty)))
            .map(|(text_, label, start, end, layer)| ExtractedEntity {
                start: char_offset(text, start),
                end: char_offset(text, end),
                text: text_,
                label,
                layer,
            })
            .collect();

        debug!("Heuristic extraction found {} entities", entities.len());
        entities
    }
}

/// Byte offset to char offset. Offsets past the end or inside a code
/// point clamp to the nearest preceding boundary.
fn char_offset(text: &str, byte: usize) -> usize {
    let mut b = byte.min(text.len());
    while !text.is_char_boundary(b) {
        b -= 1;
    }
    text[..b].chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagger::TaggedSpan;
    use crate::NerError;

    struct StubTagger(Vec<TaggedSpan>);

    impl EntityTagger for StubTagger {
        fn name(&self) -> &str {
            "stub"
        }
        fn tag(&self, _text: &str) -> Result<Vec<TaggedSpan>> {
            Ok(self.0.clone())
        }
    }

    struct FailingTagger;

    impl EntityTagger for FailingTagger {
        fn name(&self) -> &str {
            "failing"
        }
        fn tag(&self, _text: &str) -> Result<Vec<TaggedSpan>> {
            Err(NerError::Tagger("model not loaded".into()))
        }
    }

    fn has(entities: &[ExtractedEntity], text: &str, label: EntityType) -> bool {
        entities.iter().any(|e| e.text == text && e.label == label)
    }

    #[test]
    fn test_regex_layer_gene_and_disease() {
        let ex = HeuristicExtractor::new().unwrap();
        let out = ex.extract("TP53 and BRCA1 expression in hepatocellular carcinoma and Cushing syndrome.");
        assert!(has(&out, "TP53", EntityType::Gene));
        assert!(has(&out, "BRCA1", EntityType::Gene));
        assert!(has(&out, "carcinoma", EntityType::Disease));
        assert!(has(&out, "Cushing syndrome", EntityType::Disease));
    }

    #[test]
    fn test_point_mutation_typed() {
        let ex = HeuristicExtractor::new().unwrap();
        let out = ex.extract("KRAS G12D mutant cells");
        assert!(has(&out, "G12D", EntityType::Mutation));
    }

    #[test]
    fn test_phrase_stopwords() {
        let ex = HeuristicExtractor::new().unwrap();
        let out = ex.extract("Progression of the disease was slowed.");
        assert!(!out.iter().any(|e| e.text.to_lowercase() == "the disease"));
    }

    #[test]
    fn test_dictionary_hit_suppresses_overlapping_regex() {
        let ex = HeuristicExtractor::new().unwrap();
        let out = ex.extract("Outcomes of COVID-19 in HEK293 cells");
        assert!(has(&out, "COVID-19", EntityType::Disease));
        assert!(has(&out, "HEK293", EntityType::CellLine));
        assert!(!has(&out, "HEK293", EntityType::Gene));
    }

    #[test]
    fn test_tagger_labels_are_refined() {
        let text = "insulin receptor signalling";
        let ex = HeuristicExtractor::new().unwrap().with_tagger(Box::new(StubTagger(vec![TaggedSpan {
            text: "insulin receptor".into(),
            label: "ORG".into(),
            start: 0,
            end: 16,
        }])));
        let out = ex.extract(text);
        let hit = out.iter().find(|e| e.text == "insulin receptor").unwrap();
        assert_eq!(hit.label, EntityType::Gene);
        assert_eq!(hit.layer, ExtractionLayer::Tagger);
    }

    #[test]
    fn test_failing_tagger_degrades() {
        let ex = HeuristicExtractor::new().unwrap().with_tagger(Box::new(FailingTagger));
        let out = ex.extract("metformin lowers glucose");
        assert!(has(&out, "metformin", EntityType::Chemical));
    }

    #[test]
    fn test_dedup_case_insensitive() {
        let ex = HeuristicExtractor::new().unwrap();
        let out = ex.extract("Metformin and metformin again");
        assert_eq!(out.iter().filter(|e| e.text.eq_ignore_ascii_case("metformin")).count(), 1);
    }

    #[test]
    fn test_char_offsets() {
        let ex = HeuristicExtractor::new().unwrap();
        let text = "Änderung: TP53";
        let out = ex.extract(text);
        let hit = out.iter().find(|e| e.text == "TP53").unwrap();
        assert_eq!(hit.start, 10);
        assert_eq!(hit.end, 14);
        let chars: String = text.chars().skip(hit.start).take(hit.end - hit.start).collect();
        assert_eq!(chars, "TP53");
    }

    #[test]
    fn test_empty_text() {
        let ex = HeuristicExtractor::new().unwrap();
        assert!(ex.extract("   ").is_empty());
    }
}
