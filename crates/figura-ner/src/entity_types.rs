//! Entity type classification and normalization.

use std::collections::HashMap;
use regex::Regex;

/// Domain entity type for biomedical NER.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EntityType {
    Gene,
    Disease,
    Chemical,
    Mutation,
    Species,
    CellLine,
    Organization,
    Person,
    Location,
    Other,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Gene => "GENE",
            EntityType::Disease => "DISEASE",
            EntityType::Chemical => "CHEMICAL",
            EntityType::Mutation => "MUTATION",
            EntityType::Species => "SPECIES",
            EntityType::CellLine => "CELL_LINE",
            EntityType::Organization => "ORGANIZATION",
            EntityType::Person => "PERSON",
            EntityType::Location => "LOCATION",
            EntityType::Other => "OTHER",
        }
    }

    /// Categories a general-purpose tagger commonly gets wrong for
    /// biomedical mentions; these are eligible for keyword refinement.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            EntityType::Other | EntityType::Organization | EntityType::Person | EntityType::Location
        )
    }
}

// Map tagger-specific labels to domain types
fn get_label_map() -> &'static HashMap<&'static str, EntityType> {
    use std::sync::OnceLock;
    static LABEL_MAP: OnceLock<HashMap<&'static str, EntityType>> = OnceLock::new();
    LABEL_MAP.get_or_init(|| {
        let mut m = HashMap::new();

        // General-purpose (OntoNotes / CoNLL) labels
        m.insert("PER", EntityType::Person);
        m.insert("PERSON", EntityType::Person);
        m.insert("ORG", EntityType::Organization);
        m.insert("ORGANIZATION", EntityType::Organization);
        m.insert("NORP", EntityType::Organization);
        m.insert("GPE", EntityType::Location);
        m.insert("LOC", EntityType::Location);
        m.insert("LOCATION", EntityType::Location);
        m.insert("FAC", EntityType::Location);
        m.insert("PRODUCT", EntityType::Chemical);
        m.insert("SUBSTANCE", EntityType::Chemical);
        m.insert("MISC", EntityType::Other);
        m.insert("EVENT", EntityType::Other);
        m.insert("WORK_OF_ART", EntityType::Other);

        // Biomedical corpora labels
        m.insert("Chemical", EntityType::Chemical);
        m.insert("CHEMICAL", EntityType::Chemical);
        m.insert("Disease", EntityType::Disease);
        m.insert("DISEASE", EntityType::Disease);
        m.insert("GGP", EntityType::Gene);
        m.insert("GENE", EntityType::Gene);
        m.insert("Gene", EntityType::Gene);
        m.insert("DNA", EntityType::Gene);
        m.insert("RNA", EntityType::Gene);
        m.insert("PROTEIN", EntityType::Gene);
        m.insert("Protein", EntityType::Gene);
        m.insert("TAXON", EntityType::Species);
        m.insert("ORGANISM", EntityType::Species);
        m.insert("SPECIES", EntityType::Species);
        m.insert("CELL_LINE", EntityType::CellLine);
        m.insert("cell_line", EntityType::CellLine);
        m.insert("CELL_TYPE", EntityType::CellLine);
        m.insert("MUTATION", EntityType::Mutation);

        m
    })
}

/// Normalize a tagger label to a domain `EntityType`.
pub fn normalize_entity_label(label: &str) -> EntityType {
    // Handle BIO tagging (B-, I- prefixes)
    let clean_label = label.trim_start_matches("B-").trim_start_matches("I-");

    get_label_map().get(clean_label)
        .or_else(|| get_label_map().get(label))
        .copied()
        .unwrap_or(EntityType::Other)
}

lazy_static::lazy_static! {
    static ref GENE_KEYWORDS: Regex = Regex::new(r"(?i)protein|gene|receptor|kinase").unwrap();
    static ref DISEASE_KEYWORDS: Regex =
        Regex::new(r"(?i)cancer|tumou?r|disease|syndrome|disorder|itis\b|osis\b|oma\b").unwrap();
    static ref CHEMICAL_KEYWORDS: Regex =
        Regex::new(r"(?i)drug|inhibitor|\w+mab\b|\w+nib\b|\w+formin\b").unwrap();
}

/// Re-type an ambiguous category from the mention's own wording.
/// Unambiguous types are returned unchanged.
pub fn refine_entity_type(mention: &str, entity_type: EntityType) -> EntityType {
    if !entity_type.is_ambiguous() {
        return entity_type;
    }
    if GENE_KEYWORDS.is_match(mention) {
        EntityType::Gene
    } else if DISEASE_KEYWORDS.is_match(mention) {
        EntityType::Disease
    } else if CHEMICAL_KEYWORDS.is_match(mention) {
        EntityType::Chemical
    } else {
        entity_type
    }
}
