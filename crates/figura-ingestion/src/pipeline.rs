//! Per-identifier orchestration.
//!
//! For one input identifier, strictly in order:
//!   1. Normalise to a canonical PMC ID (plus PMID when known)
//!   2. Fetch the BioC document and extract figures (retried on transport errors)
//!   3. Acquire paper-level entities through the tiered extractor
//!   4. Clean captions and map entities onto each caption
//!   5. Upsert into the store (retried on persistence errors)
//!
//! Batches run these steps one identifier at a time and never abort on a
//! single failure.

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use chrono::{DateTime, Utc};
use figura_db::PaperStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::clients::FiguraClients;
use crate::entities::{EntityExtractor, EntityTier, ExtractionOutcome};
use crate::error::{FetchError, ProcessError};
use crate::normalise::ids::IdNormalizer;
use crate::postprocess::{clean, map_entities_to_caption, process_entities};
use crate::retry::RetryPolicy;
use crate::sources::bioc::BiocFetcher;
use crate::sources::EntityQuery;

// ── Outcomes ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Success,
    Error,
}

/// What happened to one identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub input_id: String,
    pub pmc_id: Option<String>,
    pub pmid: Option<String>,
    pub status: ProcessStatus,
    pub error: Option<String>,
    pub figures: usize,
    pub entities: usize,
    pub entity_tier: Option<EntityTier>,
    pub fetch_attempts: u32,
    pub save_attempts: u32,
    pub duration_ms: u64,
}

impl ProcessOutcome {
    fn new(input_id: &str) -> Self {
        Self {
            input_id: input_id.to_string(),
            pmc_id: None,
            pmid: None,
            status: ProcessStatus::Error,
            error: None,
            figures: 0,
            entities: 0,
            entity_tier: None,
            fetch_attempts: 0,
            save_attempts: 0,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ProcessStatus::Success
    }
}

/// Summary of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<ProcessOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl BatchReport {
    /// True when there was at least one identifier and none succeeded.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.succeeded == 0
    }
}

// ── Processor ────────────────────────────────────────────────────────────────

pub struct PaperProcessor {
    normalizer: IdNormalizer,
    fetcher: BiocFetcher,
    extractor: EntityExtractor,
    store: PaperStore,
    retry: RetryPolicy,
}

impl PaperProcessor {
    pub fn new(clients: &FiguraClients, store: PaperStore, retry: RetryPolicy) -> Self {
        Self {
            normalizer: clients.normalizer(),
            fetcher: clients.fetcher(),
            extractor: clients.extractor(),
            store,
            retry,
        }
    }

    pub fn store(&self) -> &PaperStore {
        &self.store
    }

    /// Process one identifier; `true` on success.
    pub async fn process(&self, paper_id: &str) -> bool {
        self.process_with_details(paper_id).await.is_success()
    }

    #[instrument(skip(self))]
    pub async fn process_with_details(&self, paper_id: &str) -> ProcessOutcome {
        let started = Instant::now();
        let mut outcome = ProcessOutcome::new(paper_id);

        match self.run(paper_id, &mut outcome).await {
            Ok(()) => {
                outcome.status = ProcessStatus::Success;
                info!(
                    "Processed {} -> {} ({} figures, {} entity links)",
                    paper_id,
                    outcome.pmc_id.as_deref().unwrap_or(""),
                    outcome.figures,
                    outcome.entities
                );
            }
            Err(e) => {
                error!("Error processing paper {}: {}", paper_id, e);
                outcome.status = ProcessStatus::Error;
                outcome.error = Some(e.to_string());
            }
        }

        outcome.duration_ms = started.elapsed().as_millis() as u64;
        outcome
    }

    async fn run(&self, paper_id: &str, outcome: &mut ProcessOutcome) -> Result<(), ProcessError> {
        let ids = self.normalizer.normalize(paper_id).await;
        outcome.pmc_id = Some(ids.pmc_id.clone()).filter(|s| !s.is_empty());
        outcome.pmid = Some(ids.pmid.clone()).filter(|s| !s.is_empty());
        if !ids.is_resolved() {
            return Err(ProcessError::Resolution(ids.original_id));
        }

        let (fetched, attempts) = self
            .retry
            .retry("fetch", FetchError::is_retryable, || self.fetcher.fetch(&ids.pmc_id))
            .await;
        outcome.fetch_attempts = attempts;
        let mut paper = fetched?;

        let extraction = if paper.figures.is_empty() {
            debug!("{} has no figures, skipping entity lookup", ids.pmc_id);
            ExtractionOutcome::default()
        } else {
            self.extractor
                .fetch_entities_with_tier(&EntityQuery::from_normalized(&ids))
                .await
        };
        let entities = process_entities(extraction.entities);

        paper.figures = paper
            .figures
            .into_iter()
            .map(|figure| {
                let mut figure = clean(figure);
                figure.entities = map_entities_to_caption(&figure.caption, entities.clone());
                figure
            })
            .collect();

        outcome.entity_tier = extraction.tier;
        outcome.figures = paper.figures.len();
        outcome.entities = paper.entity_count();

        let (saved, attempts) = self
            .retry
            .retry("save", ProcessError::is_retryable, || async {
                self.store.save(&paper).await.map_err(ProcessError::from)
            })
            .await;
        outcome.save_attempts = attempts;
        saved?;

        Ok(())
    }

    /// Process identifiers one after another. Failures are recorded and
    /// the batch carries on.
    #[instrument(skip(self, paper_ids), fields(count = paper_ids.len()))]
    pub async fn process_batch(&self, paper_ids: &[String]) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        info!("Batch {} started with {} identifiers", batch_id, paper_ids.len());

        let mut outcomes = Vec::with_capacity(paper_ids.len());
        for (i, id) in paper_ids.iter().enumerate() {
            info!("[{}/{}] Processing {}", i + 1, paper_ids.len(), id);
            outcomes.push(self.process_with_details(id).await);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let report = BatchReport {
            batch_id,
            started_at,
            failed: outcomes.len() - succeeded,
            succeeded,
            outcomes,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Batch {} finished: {} succeeded, {} failed in {} ms",
            batch_id, report.succeeded, report.failed, report.duration_ms
        );
        report
    }

    /// Process every identifier listed in a file.
    pub async fn process_file(&self, path: impl AsRef<Path>) -> anyhow::Result<BatchReport> {
        let ids = read_ids_from_file(path).await?;
        Ok(self.process_batch(&ids).await)
    }
}

/// Newline-delimited identifiers; blank lines and `#` comments are skipped.
pub fn parse_id_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}

pub async fn read_ids_from_file(path: impl AsRef<Path>) -> anyhow::Result<Vec<String>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read identifier file {}", path.display()))?;
    Ok(parse_id_list(&content))
}
