use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::config::ApiConfig;
use crate::error::FiguraError;

/// Hosts every Figura deployment talks to.
const DEFAULT_ALLOWED_HOSTS: &[&str] = &[
    "www.ncbi.nlm.nih.gov",    // BioC PMC, PubTator, ID converter
    "eutils.ncbi.nlm.nih.gov", // PubMed E-utilities
    "www.ebi.ac.uk",           // Europe PMC
    "localhost",
    "127.0.0.1",
];

/// An HTTP client that only allows requests to approved hosts.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Client with the default allowlist and a 30 s timeout.
    pub fn new() -> Result<Self, FiguraError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FiguraError> {
        let allowlist = DEFAULT_ALLOWED_HOSTS.iter().map(|d| d.to_string()).collect();

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("figura/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FiguraError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Client configured from `[api]`: timeout plus the hosts of every
    /// configured base URL, so self-hosted mirrors work without code changes.
    pub fn from_config(api: &ApiConfig) -> Result<Self, FiguraError> {
        let mut sandbox = Self::with_timeout(Duration::from_secs(api.request_timeout_secs))?;
        for base in [
            &api.bioc_base_url,
            &api.pubtator_base_url,
            &api.pubtator_legacy_base_url,
            &api.idconv_url,
            &api.eutils_base_url,
            &api.europepmc_base_url,
        ] {
            match Url::parse(base).ok().and_then(|u| u.host_str().map(String::from)) {
                Some(host) => sandbox.allow_domain(&host),
                None => tracing::warn!("Ignoring unparseable API base URL: {}", base),
            }
        }
        Ok(sandbox)
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Validates if a URL is permitted under the current policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// GET request builder for an allowed URL.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, FiguraError> {
        if !self.is_allowed(url) {
            return Err(FiguraError::Security(format!(
                "domain not in allowlist for URL {}",
                url
            )));
        }

        Ok(self.client.get(url))
    }
}
