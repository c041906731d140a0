//! Paper / Figure / Entity document model shared by the pipeline and the store.
//!
//! These are transient, per-ingestion values: the fetcher builds them, the
//! extractor and post-processor fill them in, and the store persists them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Prefix of canonical PubMed Central identifiers.
pub const PMC_PREFIX: &str = "PMC";

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A named entity mention (gene, disease, chemical, ...).
///
/// Offsets are character offsets into the owning figure's caption. `None`
/// means "unknown", which is distinct from an offset of zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl Entity {
    pub fn new(text: impl Into<String>, entity_type: Option<&str>) -> Self {
        Self {
            text: text.into(),
            entity_type: entity_type.map(String::from),
            start: None,
            end: None,
        }
    }

    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Type as stored in the relational store: absent maps to "".
    pub fn type_or_empty(&self) -> &str {
        self.entity_type.as_deref().unwrap_or("")
    }

    /// Case-sensitive identity used by the store and the service tiers.
    pub fn identity(&self) -> (String, String) {
        (self.text.clone(), self.type_or_empty().to_string())
    }
}

// ---------------------------------------------------------------------------
// Figure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figure {
    /// Dedup key within a paper, e.g. "Figure 2".
    pub label: String,
    pub caption: String,
    pub url: Option<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Figure {
    pub fn new(label: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            caption: caption.into(),
            url: None,
            entities: Vec::new(),
        }
    }
}

/// Positional fallback label, 1-based.
pub fn positional_label(position: usize) -> String {
    format!("Figure {position}")
}

/// Give every `None` the positional label of its slot, bumping the number
/// until it clashes with no explicit label and no label handed out earlier.
pub fn fill_positional_labels(labels: Vec<Option<String>>) -> Vec<String> {
    let mut used: HashSet<String> = labels.iter().flatten().cloned().collect();
    labels
        .into_iter()
        .enumerate()
        .map(|(idx, label)| {
            label.unwrap_or_else(|| {
                let mut n = idx + 1;
                while used.contains(&positional_label(n)) {
                    n += 1;
                }
                let label = positional_label(n);
                used.insert(label.clone());
                label
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Paper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    /// Canonical "PMC" + digits identifier; global identity key.
    pub paper_id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub figures: Vec<Figure>,
}

impl Paper {
    /// Title used when the source document carries none.
    pub fn placeholder_title(paper_id: &str) -> String {
        format!("Paper {paper_id}")
    }

    pub fn entity_count(&self) -> usize {
        self.figures.iter().map(|f| f.entities.len()).sum()
    }
}

/// Add the "PMC" prefix if it is missing (case-insensitive match).
pub fn with_pmc_prefix(id: &str) -> String {
    let id = id.trim();
    if has_pmc_prefix(id) {
        format!("{PMC_PREFIX}{}", &id[PMC_PREFIX.len()..])
    } else {
        format!("{PMC_PREFIX}{id}")
    }
}

/// Case-insensitive "PMC" prefix check that tolerates multi-byte input.
fn has_pmc_prefix(id: &str) -> bool {
    id.get(..PMC_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(PMC_PREFIX))
}

/// Strip the "PMC" prefix if present (case-insensitive match).
pub fn pmc_suffix(id: &str) -> &str {
    let id = id.trim();
    if has_pmc_prefix(id) {
        &id[PMC_PREFIX.len()..]
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pmc_prefix_roundtrip() {
        assert_eq!(with_pmc_prefix("1234567"), "PMC1234567");
        assert_eq!(with_pmc_prefix("pmc1234567"), "PMC1234567");
        assert_eq!(with_pmc_prefix("PMC1234567"), "PMC1234567");
        assert_eq!(pmc_suffix("PMC1234567"), "1234567");
        assert_eq!(pmc_suffix("Pmc42"), "42");
        assert_eq!(pmc_suffix("42"), "42");
    }

    #[test]
    fn test_pmc_prefix_with_multibyte_input() {
        assert_eq!(with_pmc_prefix("éé"), "PMCéé");
        assert_eq!(pmc_suffix("éé"), "éé");
        assert_eq!(with_pmc_prefix("aé"), "PMCaé");
        assert_eq!(pmc_suffix("PMCé1"), "é1");
    }

    #[test]
    fn test_fill_positional_labels_skips_explicit() {
        let labels = fill_positional_labels(vec![Some("Figure 2".into()), None, None]);
        assert_eq!(labels, vec!["Figure 2", "Figure 3", "Figure 4"]);
        let labels = fill_positional_labels(vec![None, None]);
        assert_eq!(labels, vec!["Figure 1", "Figure 2"]);
    }

    #[test]
    fn test_absent_offset_distinct_from_zero() {
        let absent = Entity::new("TP53", Some("GENE"));
        let zero = Entity::new("TP53", Some("GENE")).with_span(0, 4);
        assert_ne!(absent, zero);
        assert_eq!(absent.start, None);
        assert_eq!(zero.start, Some(0));
    }

    #[test]
    fn test_entity_identity_uses_empty_type() {
        let e = Entity::new("metformin", None);
        assert_eq!(e.identity(), ("metformin".to_string(), String::new()));
    }

    #[test]
    fn test_placeholder_title() {
        assert_eq!(Paper::placeholder_title("PMC1234567"), "Paper PMC1234567");
    }

    #[test]
    fn test_serde_field_names() {
        let paper = Paper {
            paper_id: "PMC1".into(),
            title: "T".into(),
            abstract_text: "A".into(),
            figures: vec![],
        };
        let v = serde_json::to_value(&paper).unwrap();
        assert_eq!(v["abstract"], "A");
        let e = serde_json::to_value(Entity::new("KRAS", Some("Gene"))).unwrap();
        assert_eq!(e["type"], "Gene");
    }
}
