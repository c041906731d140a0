//! Tiered entity acquisition.
//!
//! 1. PubTator3 JSON annotations
//! 2. Legacy PubTator tabular export
//! 3. Local heuristics over the paper's abstract (or title)
//!
//! A tier runs only if the previous one failed or came back empty. Tier
//! errors are logged and never surface to the caller.

use std::sync::Arc;

use figura_common::models::Entity;
use figura_ner::{ExtractedEntity, HeuristicExtractor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::sources::{AbstractSource, AnnotationSource, EntityQuery};

/// Which tier produced a paper's entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityTier {
    PubTator,
    PubTatorLegacy,
    Heuristic,
}

impl EntityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityTier::PubTator => "pubtator",
            EntityTier::PubTatorLegacy => "pubtator_legacy",
            EntityTier::Heuristic => "heuristic",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub entities: Vec<Entity>,
    /// `None` when every tier came back empty.
    pub tier: Option<EntityTier>,
}

#[derive(Clone)]
pub struct EntityExtractor {
    annotations: Arc<dyn AnnotationSource>,
    abstracts: Arc<dyn AbstractSource>,
    heuristic: Arc<HeuristicExtractor>,
}

impl EntityExtractor {
    pub fn new(
        annotations: Arc<dyn AnnotationSource>,
        abstracts: Arc<dyn AbstractSource>,
        heuristic: Arc<HeuristicExtractor>,
    ) -> Self {
        Self {
            annotations,
            abstracts,
            heuristic,
        }
    }

    pub async fn fetch_entities(&self, query: &EntityQuery) -> Vec<Entity> {
        self.fetch_entities_with_tier(query).await.entities
    }

    #[instrument(skip(self))]
    pub async fn fetch_entities_with_tier(&self, query: &EntityQuery) -> ExtractionOutcome {
        match self.annotations.annotations_json(query).await {
            Ok(entities) if !entities.is_empty() => {
                return Self::outcome(query, entities, EntityTier::PubTator);
            }
            Ok(_) => debug!("PubTator3 has no annotations for {}", query),
            Err(e) => warn!("PubTator3 lookup failed for {}: {:#}", query, e),
        }

        match self.annotations.annotations_pubtator(query).await {
            Ok(entities) if !entities.is_empty() => {
                return Self::outcome(query, entities, EntityTier::PubTatorLegacy);
            }
            Ok(_) => debug!("Legacy PubTator has no annotations for {}", query),
            Err(e) => warn!("Legacy PubTator lookup failed for {}: {:#}", query, e),
        }

        match self.heuristic_entities(query).await {
            Ok(entities) if !entities.is_empty() => Self::outcome(query, entities, EntityTier::Heuristic),
            Ok(_) => {
                info!("No entities found for {} by any tier", query);
                ExtractionOutcome::default()
            }
            Err(e) => {
                warn!("Heuristic extraction failed for {}: {:#}", query, e);
                ExtractionOutcome::default()
            }
        }
    }

    async fn heuristic_entities(&self, query: &EntityQuery) -> anyhow::Result<Vec<Entity>> {
        let Some(record) = self.abstracts.lookup(query).await? else {
            debug!("No abstract available for {}", query);
            return Ok(vec![]);
        };
        let entities = self
            .heuristic
            .extract(record.best_text())
            .into_iter()
            .map(to_entity)
            .collect();
        Ok(entities)
    }

    fn outcome(query: &EntityQuery, entities: Vec<Entity>, tier: EntityTier) -> ExtractionOutcome {
        info!("{} entities for {} from {}", entities.len(), query, tier.as_str());
        ExtractionOutcome {
            entities,
            tier: Some(tier),
        }
    }
}

fn to_entity(e: ExtractedEntity) -> Entity {
    Entity::new(e.text, Some(e.label.as_str())).with_span(e.start, e.end)
}
