//! Dictionary matching using an Aho-Corasick trie.
//!
//! Ships a small embedded vocabulary of frequently cited terms that the
//! regex layer cannot recognise from their shape alone (drug names,
//! agencies, common gene products without digits).

use aho_corasick::{AhoCorasick, MatchKind};
use tracing::debug;

use crate::entity_types::EntityType;
use crate::Result;

/// Case-insensitive, word-bounded dictionary matcher.
pub struct TrieDictionary {
    automaton: AhoCorasick,
    /// Maps pattern index -> entity type
    pattern_types: Vec<EntityType>,
}

/// A dictionary hit, byte offsets into the matched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryMatch {
    pub text: String,
    pub label: EntityType,
    pub start: usize,
    pub end: usize,
}

impl TrieDictionary {
    /// Build from explicit (term, type) pairs.
    pub fn from_terms<'a, I>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, EntityType)>,
    {
        let (patterns, pattern_types): (Vec<&str>, Vec<EntityType>) = terms.into_iter().unzip();

        // MatchKind::LeftmostLongest ensures we get longest matches first
        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .ascii_case_insensitive(true)
            .build(&patterns)?;

        debug!("TrieDictionary built with {} patterns", patterns.len());
        Ok(Self { automaton, pattern_types })
    }

    /// Embedded vocabulary.
    pub fn embedded() -> Result<Self> {
        Self::from_terms(EMBEDDED_TERMS.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.pattern_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pattern_types.is_empty()
    }

    /// Find whole-word matches. Surface text is taken from `text`, so the
    /// original casing is preserved.
    pub fn find(&self, text: &str) -> Vec<DictionaryMatch> {
        self.automaton
            .find_iter(text)
            .filter(|m| is_word_bounded(text, m.start(), m.end()))
            .map(|m| DictionaryMatch {
                text: text[m.start()..m.end()].to_string(),
                label: self.pattern_types[m.pattern().as_usize()],
                start: m.start(),
                end: m.end(),
            })
            .collect()
    }
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    !before.is_some_and(is_word) && !after.is_some_and(is_word)
}

const EMBEDDED_TERMS: &[(&str, EntityType)] = &[
    ("metformin", EntityType::Chemical),
    ("insulin", EntityType::Chemical),
    ("aspirin", EntityType::Chemical),
    ("glucose", EntityType::Chemical),
    ("cisplatin", EntityType::Chemical),
    ("doxorubicin", EntityType::Chemical),
    ("paclitaxel", EntityType::Chemical),
    ("tamoxifen", EntityType::Chemical),
    ("gefitinib", EntityType::Chemical),
    ("dexamethasone", EntityType::Chemical),
    ("FDA", EntityType::Organization),
    ("NIH", EntityType::Organization),
    ("COVID-19", EntityType::Disease),
    ("diabetes", EntityType::Disease),
    ("type 2 diabetes", EntityType::Disease),
    ("obesity", EntityType::Disease),
    ("hypertension", EntityType::Disease),
    ("cancer", EntityType::Disease),
    ("SARS-CoV-2", EntityType::Species),
    ("mice", EntityType::Species),
    ("human", EntityType::Species),
    ("HeLa", EntityType::CellLine),
    ("HEK293", EntityType::CellLine),
];
