//! PMID / PMC ID normalisation.
//!
//! - All digits: a PMID. The BioC service is probed with `PMC<pmid>` first
//!   (some deployments accept PMIDs there); if that yields no document the
//!   ID converter is asked for the PMC ID.
//! - `PMC<digits>` or bare digits with a `PMC` prefix in any case: a PMC
//!   ID. The PMID is looked up best-effort.
//! - Anything else resolves to nothing, without network calls.

use std::sync::Arc;

use figura_common::models::PMC_PREFIX;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::sources::bioc::BiocFetcher;
use crate::sources::IdConverter;

lazy_static::lazy_static! {
    static ref PMC_ID: Regex = Regex::new(r"(?i)^pmc(\d+)$").unwrap();
}

/// Result of normalising one input identifier. Empty strings mean
/// "unknown"; an empty `pmc_id` means the paper cannot be fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedId {
    pub original_id: String,
    pub pmc_id: String,
    pub pmid: String,
}

impl NormalizedId {
    pub fn is_resolved(&self) -> bool {
        !self.pmc_id.is_empty()
    }
}

/// Syntactic class of an input identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdKind {
    Pmid(String),
    /// Canonical upper-case "PMC" + digits.
    Pmc(String),
    Invalid,
}

pub fn classify(input: &str) -> IdKind {
    let id = input.trim();
    if id.is_empty() {
        return IdKind::Invalid;
    }
    if id.chars().all(|c| c.is_ascii_digit()) {
        return IdKind::Pmid(id.to_string());
    }
    match PMC_ID.captures(id).and_then(|c| c.get(1)) {
        Some(digits) => IdKind::Pmc(format!("{PMC_PREFIX}{}", digits.as_str())),
        None => IdKind::Invalid,
    }
}

#[derive(Clone)]
pub struct IdNormalizer {
    fetcher: BiocFetcher,
    converter: Arc<dyn IdConverter>,
}

impl IdNormalizer {
    pub fn new(fetcher: BiocFetcher, converter: Arc<dyn IdConverter>) -> Self {
        Self { fetcher, converter }
    }

    /// Never fails: lookup errors are logged and treated as "no result".
    #[instrument(skip(self))]
    pub async fn normalize(&self, input_id: &str) -> NormalizedId {
        let original_id = input_id.trim().to_string();
        let mut result = NormalizedId {
            original_id: original_id.clone(),
            ..NormalizedId::default()
        };

        match classify(&original_id) {
            IdKind::Pmid(pmid) => {
                let direct = format!("{PMC_PREFIX}{pmid}");
                if self.fetcher.probe(&direct).await {
                    debug!("{} resolves directly as {}", pmid, direct);
                    result.pmc_id = direct;
                } else {
                    match self.converter.pmid_to_pmcid(&pmid).await {
                        Ok(Some(pmc)) => result.pmc_id = pmc,
                        Ok(None) => info!("No PMC ID mapped for PMID {}", pmid),
                        Err(e) => warn!("PMID -> PMCID conversion failed for {}: {}", pmid, e),
                    }
                }
                result.pmid = pmid;
            }
            IdKind::Pmc(pmc) => {
                match self.converter.pmcid_to_pmid(&pmc).await {
                    Ok(Some(pmid)) => result.pmid = pmid,
                    Ok(None) => debug!("No PMID mapped for {}", pmc),
                    Err(e) => warn!("PMCID -> PMID conversion failed for {}: {}", pmc, e),
                }
                result.pmc_id = pmc;
            }
            IdKind::Invalid => warn!("Unrecognised paper identifier {:?}", original_id),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::sources::PaperSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_classify() {
        assert_eq!(classify(" 123 "), IdKind::Pmid("123".into()));
        assert_eq!(classify("PMC42"), IdKind::Pmc("PMC42".into()));
        assert_eq!(classify("pmc42"), IdKind::Pmc("PMC42".into()));
        assert_eq!(classify("PMCabc"), IdKind::Invalid);
        assert_eq!(classify("doi:10.1/x"), IdKind::Invalid);
        assert_eq!(classify(""), IdKind::Invalid);
    }

    struct Source {
        body: Result<String, ()>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PaperSource for Source {
        async fn fetch_bioc(&self, _pmc_id: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.body
                .clone()
                .map_err(|_| FetchError::Transport("down".into()))
        }
    }

    struct Converter {
        pmcid: Option<String>,
        pmid: anyhow::Result<Option<String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdConverter for Converter {
        async fn pmid_to_pmcid(&self, _pmid: &str) -> anyhow::Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pmcid.clone())
        }
        async fn pmcid_to_pmid(&self, _pmcid: &str) -> anyhow::Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.pmid {
                Ok(v) => Ok(v.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn normalizer(body: Result<&str, ()>, pmcid: Option<&str>, pmid: anyhow::Result<Option<&str>>) -> (IdNormalizer, Arc<Source>, Arc<Converter>) {
        let source = Arc::new(Source {
            body: body.map(String::from),
            calls: AtomicUsize::new(0),
        });
        let converter = Arc::new(Converter {
            pmcid: pmcid.map(String::from),
            pmid: pmid.map(|p| p.map(String::from)),
            calls: AtomicUsize::new(0),
        });
        let n = IdNormalizer::new(BiocFetcher::new(source.clone()), converter.clone());
        (n, source, converter)
    }

    const EMPTY_DOC: &str = "<collection><document><id>1</id></document></collection>";

    #[tokio::test]
    async fn test_pmid_resolves_directly() {
        let (n, _, conv) = normalizer(Ok(EMPTY_DOC), None, Ok(None));
        let id = n.normalize("123").await;
        assert_eq!(id, NormalizedId { original_id: "123".into(), pmc_id: "PMC123".into(), pmid: "123".into() });
        assert_eq!(conv.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pmid_falls_back_to_converter() {
        let (n, _, _) = normalizer(Ok("[Error] : No result can be found."), Some("PMC999"), Ok(None));
        let id = n.normalize("123").await;
        assert_eq!(id.pmc_id, "PMC999");
        assert_eq!(id.pmid, "123");
    }

    #[tokio::test]
    async fn test_pmid_unresolvable() {
        let (n, _, _) = normalizer(Err(()), None, Ok(None));
        let id = n.normalize("123").await;
        assert!(!id.is_resolved());
        assert_eq!(id.pmid, "123");
    }

    #[tokio::test]
    async fn test_pmc_without_pmid_is_not_fatal() {
        let (n, source, _) = normalizer(Ok(EMPTY_DOC), None, Err(anyhow::anyhow!("timeout")));
        let id = n.normalize("PMC1234567").await;
        assert_eq!(id, NormalizedId { original_id: "PMC1234567".into(), pmc_id: "PMC1234567".into(), pmid: String::new() });
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lowercase_prefix_normalized() {
        let (n, _, _) = normalizer(Ok(EMPTY_DOC), None, Ok(Some("555")));
        let id = n.normalize("pmc77").await;
        assert_eq!((id.pmc_id.as_str(), id.pmid.as_str()), ("PMC77", "555"));
    }

    #[tokio::test]
    async fn test_invalid_makes_no_calls() {
        let (n, source, conv) = normalizer(Ok(EMPTY_DOC), Some("PMC1"), Ok(Some("1")));
        let id = n.normalize("PMCabc").await;
        assert!(!id.is_resolved());
        assert_eq!(source.calls.load(Ordering::SeqCst) + conv.calls.load(Ordering::SeqCst), 0);
    }
}
