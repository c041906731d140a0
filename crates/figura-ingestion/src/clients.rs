//! Wiring of the production source clients from configuration.

use std::sync::Arc;

use anyhow::Context;
use figura_common::sandbox::SandboxClient;
use figura_common::Config;
use figura_ner::HeuristicExtractor;

use crate::entities::EntityExtractor;
use crate::normalise::ids::IdNormalizer;
use crate::sources::abstracts::LiteratureAbstractSource;
use crate::sources::bioc::{BiocClient, BiocFetcher};
use crate::sources::europepmc::EuropePmcClient;
use crate::sources::idconv::NcbiIdConverter;
use crate::sources::pubmed::PubMedClient;
use crate::sources::pubtator::PubTatorClient;
use crate::sources::{AbstractSource, AnnotationSource, IdConverter, PaperSource};

/// Every remote collaborator the pipeline needs.
#[derive(Clone)]
pub struct FiguraClients {
    pub papers: Arc<dyn PaperSource>,
    pub annotations: Arc<dyn AnnotationSource>,
    pub id_converter: Arc<dyn IdConverter>,
    pub abstracts: Arc<dyn AbstractSource>,
    pub heuristic: Arc<HeuristicExtractor>,
}

impl FiguraClients {
    /// Real HTTP clients sharing one sandboxed `reqwest::Client`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let api = &config.api;
        let http = SandboxClient::from_config(api).context("Failed to build HTTP client")?;

        let pubmed = PubMedClient::new(http.clone(), &api.eutils_base_url, api.ncbi_api_key.clone());
        let europepmc = EuropePmcClient::new(http.clone(), &api.europepmc_base_url);

        Ok(Self {
            papers: Arc::new(BiocClient::new(http.clone(), &api.bioc_base_url)),
            annotations: Arc::new(PubTatorClient::new(
                http.clone(),
                &api.pubtator_base_url,
                &api.pubtator_legacy_base_url,
            )),
            id_converter: Arc::new(NcbiIdConverter::new(http, api)),
            abstracts: Arc::new(LiteratureAbstractSource::new(pubmed, europepmc)),
            heuristic: Arc::new(HeuristicExtractor::new().context("Failed to build entity dictionary")?),
        })
    }

    pub fn fetcher(&self) -> BiocFetcher {
        BiocFetcher::new(self.papers.clone())
    }

    pub fn normalizer(&self) -> IdNormalizer {
        IdNormalizer::new(self.fetcher(), self.id_converter.clone())
    }

    pub fn extractor(&self) -> EntityExtractor {
        EntityExtractor::new(self.annotations.clone(), self.abstracts.clone(), self.heuristic.clone())
    }
}
