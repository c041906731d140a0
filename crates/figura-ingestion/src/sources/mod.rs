//! Remote source clients and the traits the pipeline talks to.
//!
//! Every collaborator sits behind a trait so the pipeline can be driven by
//! in-process stubs in tests.

pub mod abstracts;
pub mod bioc;
pub mod europepmc;
pub mod idconv;
pub mod pubmed;
pub mod pubtator;

use std::fmt;

use async_trait::async_trait;
use figura_common::models::{pmc_suffix, Entity};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::normalise::ids::NormalizedId;

/// Identifier used to look up entities for a paper. A PMID is preferred
/// when one is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityQuery {
    Pmid(String),
    /// PMC ID without the "PMC" prefix.
    PmcSuffix(String),
}

impl EntityQuery {
    pub fn from_normalized(id: &NormalizedId) -> Self {
        if id.pmid.is_empty() {
            EntityQuery::PmcSuffix(pmc_suffix(&id.pmc_id).to_string())
        } else {
            EntityQuery::Pmid(id.pmid.clone())
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EntityQuery::Pmid(id) | EntityQuery::PmcSuffix(id) => id,
        }
    }
}

impl fmt::Display for EntityQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityQuery::Pmid(id) => write!(f, "PMID {id}"),
            EntityQuery::PmcSuffix(id) => write!(f, "PMCID {id}"),
        }
    }
}

/// Title and abstract of a paper, from a bibliographic database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractRecord {
    pub title: String,
    pub abstract_text: String,
}

impl AbstractRecord {
    /// The abstract, or the title when there is no abstract.
    pub fn best_text(&self) -> &str {
        if self.abstract_text.trim().is_empty() {
            &self.title
        } else {
            &self.abstract_text
        }
    }
}

/// Source of BioC XML documents.
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Raw BioC XML body for a canonical "PMC…" identifier.
    async fn fetch_bioc(&self, pmc_id: &str) -> Result<String, FetchError>;
}

/// Entity annotation service with a current and a legacy endpoint.
#[async_trait]
pub trait AnnotationSource: Send + Sync {
    /// Current JSON annotations endpoint.
    async fn annotations_json(&self, query: &EntityQuery) -> anyhow::Result<Vec<Entity>>;

    /// Legacy tab-separated export.
    async fn annotations_pubtator(&self, query: &EntityQuery) -> anyhow::Result<Vec<Entity>>;
}

/// PMID <-> PMCID conversion.
#[async_trait]
pub trait IdConverter: Send + Sync {
    async fn pmid_to_pmcid(&self, pmid: &str) -> anyhow::Result<Option<String>>;

    async fn pmcid_to_pmid(&self, pmcid: &str) -> anyhow::Result<Option<String>>;
}

/// Bibliographic lookup of title and abstract.
#[async_trait]
pub trait AbstractSource: Send + Sync {
    async fn lookup(&self, query: &EntityQuery) -> anyhow::Result<Option<AbstractRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_prefers_pmid() {
        let id = NormalizedId {
            original_id: "PMC42".into(),
            pmc_id: "PMC42".into(),
            pmid: "123".into(),
        };
        assert_eq!(EntityQuery::from_normalized(&id), EntityQuery::Pmid("123".into()));

        let id = NormalizedId { pmid: String::new(), ..id };
        assert_eq!(EntityQuery::from_normalized(&id), EntityQuery::PmcSuffix("42".into()));
    }

    #[test]
    fn test_best_text_falls_back_to_title() {
        let rec = AbstractRecord { title: "T".into(), abstract_text: "  ".into() };
        assert_eq!(rec.best_text(), "T");
    }
}
