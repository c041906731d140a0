//! Configuration loading for Figura.
//! Reads figura.toml from the current directory or the path in the FIGURA_CONFIG env var.
//!
//! The loaded `Config` is built once at process start and handed to each
//! component's constructor; nothing reads it through a global.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

/// How a re-ingested paper's figures are reconciled with the stored ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FigurePolicy {
    /// Update figures whose label matches; leave the others untouched.
    #[default]
    MergeByLabel,
    /// Delete every stored figure of the paper before inserting the new set.
    ReplaceAll,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub figure_policy: FigurePolicy,
}

fn default_db_url()          -> String { "sqlite://data/figura.db?mode=rwc".to_string() }
fn default_max_connections() -> u32    { 5 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            max_connections: default_max_connections(),
            figure_policy: FigurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub ncbi_api_key: Option<String>,
    #[serde(default = "default_tool")]
    pub tool: String,
    pub email: Option<String>,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_bioc_base_url")]
    pub bioc_base_url: String,
    #[serde(default = "default_pubtator_base_url")]
    pub pubtator_base_url: String,
    #[serde(default = "default_pubtator_legacy_base_url")]
    pub pubtator_legacy_base_url: String,
    #[serde(default = "default_idconv_url")]
    pub idconv_url: String,
    #[serde(default = "default_eutils_base_url")]
    pub eutils_base_url: String,
    #[serde(default = "default_europepmc_base_url")]
    pub europepmc_base_url: String,
}

fn default_tool()    -> String { "figura".to_string() }
fn default_timeout() -> u64    { 30 }
fn default_bioc_base_url() -> String {
    "https://www.ncbi.nlm.nih.gov/research/bionlp/RESTful/pmcoa.cgi".to_string()
}
fn default_pubtator_base_url() -> String {
    "https://www.ncbi.nlm.nih.gov/research/pubtator3-api".to_string()
}
fn default_pubtator_legacy_base_url() -> String {
    "https://www.ncbi.nlm.nih.gov/research/pubtator-api".to_string()
}
fn default_idconv_url() -> String {
    "https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0/".to_string()
}
fn default_eutils_base_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()
}
fn default_europepmc_base_url() -> String {
    "https://www.ebi.ac.uk/europepmc/webservices/rest".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            ncbi_api_key: None,
            tool: default_tool(),
            email: None,
            request_timeout_secs: default_timeout(),
            bioc_base_url: default_bioc_base_url(),
            pubtator_base_url: default_pubtator_base_url(),
            pubtator_legacy_base_url: default_pubtator_legacy_base_url(),
            idconv_url: default_idconv_url(),
            eutils_base_url: default_eutils_base_url(),
            europepmc_base_url: default_europepmc_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_watch_folder")]
    pub watch_folder: String,
    #[serde(default = "default_watch_interval")]
    pub watch_interval_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_watch_folder()   -> String { "data/watch".to_string() }
fn default_watch_interval() -> u64    { 60 }
fn default_max_retries()    -> u32    { 3 }
fn default_retry_delay()    -> u64    { 1000 }

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            watch_folder: default_watch_folder(),
            watch_interval_secs: default_watch_interval(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

#[cfg(test)]
mod tests;

impl Config {
    /// Load configuration from figura.toml.
    /// Checks FIGURA_CONFIG env var first, then current directory.
    /// A missing file is not an error: defaults are used.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("FIGURA_CONFIG")
            .unwrap_or_else(|_| "figura.toml".to_string());
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit path without applying environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Environment overrides. Currently only NCBI_API_KEY.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("NCBI_API_KEY").filter(|k| !k.is_empty()) {
            self.api.ncbi_api_key = Some(key);
        }
    }
}
