//! Title/abstract lookup: PubMed for PMIDs, Europe PMC for PMC IDs.

use async_trait::async_trait;

use super::europepmc::EuropePmcClient;
use super::pubmed::PubMedClient;
use super::{AbstractRecord, AbstractSource, EntityQuery};

pub struct LiteratureAbstractSource {
    pubmed: PubMedClient,
    europepmc: EuropePmcClient,
}

impl LiteratureAbstractSource {
    pub fn new(pubmed: PubMedClient, europepmc: EuropePmcClient) -> Self {
        Self { pubmed, europepmc }
    }
}

#[async_trait]
impl AbstractSource for LiteratureAbstractSource {
    async fn lookup(&self, query: &EntityQuery) -> anyhow::Result<Option<AbstractRecord>> {
        match query {
            EntityQuery::Pmid(pmid) => self.pubmed.fetch_abstract(pmid).await,
            EntityQuery::PmcSuffix(suffix) => self.europepmc.search_by_pmcid(suffix).await,
        }
    }
}
