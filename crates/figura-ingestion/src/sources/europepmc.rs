//! Europe PMC REST API client, used for title/abstract lookup by PMC ID.
//!
//! Endpoint: `<base>/search?query=PMCID:PMC<n>&resultType=core&format=json`

use anyhow::Context;
use figura_common::models::with_pmc_prefix;
use figura_common::sandbox::SandboxClient;
use serde_json::Value;
use tracing::{debug, instrument};

use super::AbstractRecord;

pub struct EuropePmcClient {
    client: SandboxClient,
    search_url: String,
}

impl EuropePmcClient {
    pub fn new(client: SandboxClient, base_url: &str) -> Self {
        Self {
            client,
            search_url: format!("{}/search", base_url.trim_end_matches('/')),
        }
    }

    /// Look up a paper by PMC ID (prefix optional).
    #[instrument(skip(self))]
    pub async fn search_by_pmcid(&self, pmcid: &str) -> anyhow::Result<Option<AbstractRecord>> {
        let query = format!("PMCID:{}", with_pmc_prefix(pmcid));
        let params = [
            ("query", query.as_str()),
            ("resultType", "core"),
            ("pageSize", "1"),
            ("format", "json"),
        ];

        let resp = self
            .client
            .get(&self.search_url)?
            .query(&params)
            .send()
            .await
            .context("Europe PMC search failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("Europe PMC returned HTTP {}", resp.status());
        }
        let body = resp.json::<Value>().await.context("Europe PMC response is not JSON")?;

        let record = parse_search_response(&body);
        debug!(found = record.is_some(), "Europe PMC search for {}", query);
        Ok(record)
    }
}

/// First hit of a `resultType=core` search.
pub fn parse_search_response(body: &Value) -> Option<AbstractRecord> {
    let r = body["resultList"]["result"].as_array()?.first()?;
    let title = r["title"].as_str().unwrap_or("").trim().to_string();
    let abstract_text = r["abstractText"].as_str().unwrap_or("").trim().to_string();
    if title.is_empty() && abstract_text.is_empty() {
        return None;
    }
    Some(AbstractRecord { title, abstract_text })
}
