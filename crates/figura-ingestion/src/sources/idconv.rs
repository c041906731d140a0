//! NCBI PMC ID Converter client.
//!
//! Endpoint: https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0/?ids=<id>&format=json

use anyhow::Context;
use async_trait::async_trait;
use figura_common::config::ApiConfig;
use figura_common::models::with_pmc_prefix;
use figura_common::sandbox::SandboxClient;
use serde_json::Value;
use tracing::{debug, instrument};

use super::IdConverter;

/// One converted record. Either side may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdRecord {
    pub pmcid: Option<String>,
    pub pmid: Option<String>,
}

pub struct NcbiIdConverter {
    client: SandboxClient,
    url: String,
    tool: String,
    email: Option<String>,
    api_key: Option<String>,
}

impl NcbiIdConverter {
    pub fn new(client: SandboxClient, api: &ApiConfig) -> Self {
        Self {
            client,
            url: api.idconv_url.clone(),
            tool: api.tool.clone(),
            email: api.email.clone(),
            api_key: api.ncbi_api_key.clone(),
        }
    }

    fn params(&self, id: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("ids", id.to_string()),
            ("format", "json".to_string()),
            ("tool", self.tool.clone()),
        ];
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    #[instrument(skip(self))]
    async fn convert(&self, id: &str) -> anyhow::Result<Option<IdRecord>> {
        let resp = self
            .client
            .get(&self.url)?
            .query(&self.params(id))
            .send()
            .await
            .context("ID converter request failed")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("ID converter returned HTTP {status}");
        }
        let body: Value = resp.json().await.context("ID converter response is not JSON")?;
        let record = parse_idconv_response(&body);
        debug!(?record, "ID converter result for {}", id);
        Ok(record)
    }
}

#[async_trait]
impl IdConverter for NcbiIdConverter {
    async fn pmid_to_pmcid(&self, pmid: &str) -> anyhow::Result<Option<String>> {
        Ok(self.convert(pmid).await?.and_then(|r| r.pmcid).map(|p| with_pmc_prefix(&p)))
    }

    async fn pmcid_to_pmid(&self, pmcid: &str) -> anyhow::Result<Option<String>> {
        Ok(self.convert(&with_pmc_prefix(pmcid)).await?.and_then(|r| r.pmid))
    }
}

/// First record of an idconv JSON response. A record with
/// `"status": "error"` carries no mapping.
pub fn parse_idconv_response(body: &Value) -> Option<IdRecord> {
    let record = body["records"].as_array()?.first()?;
    if record["status"].as_str() == Some("error") {
        return None;
    }

    let field = |key: &str| match &record[key] {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };

    Some(IdRecord {
        pmcid: field("pmcid"),
        pmid: field("pmid"),
    })
}
