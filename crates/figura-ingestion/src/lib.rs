//! figura-ingestion: Paper ingestion pipeline.
//!
//! - Identifier normalisation across the PMID and PMC ID spaces
//! - BioC XML retrieval and figure caption extraction
//! - Tiered entity acquisition (PubTator3, legacy PubTator, local heuristics)
//! - Caption cleaning and entity offset mapping
//! - Per-identifier orchestration with retries and batch reports

pub mod clients;
pub mod entities;
pub mod error;
pub mod normalise;
pub mod pipeline;
pub mod postprocess;
pub mod retry;
pub mod sources;

pub use clients::FiguraClients;
pub use entities::{EntityExtractor, EntityTier, ExtractionOutcome};
pub use error::{FetchError, ProcessError};
pub use normalise::ids::{IdNormalizer, NormalizedId};
pub use pipeline::{BatchReport, PaperProcessor, ProcessOutcome, ProcessStatus};
pub use retry::RetryPolicy;
pub use sources::bioc::BiocFetcher;
pub use sources::EntityQuery;
