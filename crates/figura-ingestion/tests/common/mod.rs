//! In-process stand-ins for the remote services, with call counters.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use figura_common::config::FigurePolicy;
use figura_common::models::Entity;
use figura_db::{Database, PaperStore};
use figura_ingestion::sources::{
    AbstractRecord, AbstractSource, AnnotationSource, EntityQuery, IdConverter, PaperSource,
};
use figura_ingestion::{FetchError, FiguraClients, PaperProcessor, RetryPolicy};
use figura_ner::HeuristicExtractor;

pub const NO_RESULT: &str = "[Error] : No result can be found. <BR><HR><B> - ID: 0</B>";

// ── BioC ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct StubPapers {
    docs: HashMap<String, String>,
    failures: Mutex<VecDeque<FetchError>>,
    pub calls: AtomicUsize,
}

impl StubPapers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc(mut self, pmc_id: &str, xml: String) -> Self {
        self.docs.insert(pmc_id.to_string(), xml);
        self
    }

    /// Errors returned, in order, before any document is served.
    pub fn failing_first(self, errors: Vec<FetchError>) -> Self {
        *self.failures.lock().unwrap() = errors.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaperSource for StubPapers {
    async fn fetch_bioc(&self, pmc_id: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.docs.get(pmc_id).cloned().unwrap_or_else(|| NO_RESULT.to_string()))
    }
}

pub fn passage(infons: &[(&str, &str)], text: &str) -> String {
    let infons: String = infons
        .iter()
        .map(|(k, v)| format!(r#"<infon key="{k}">{v}</infon>"#))
        .collect();
    format!("<passage>{infons}<offset>0</offset><text>{text}</text></passage>")
}

pub fn bioc(passages: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><collection><source>PMC</source><document><id>1</id>{}</document></collection>"#,
        passages.concat()
    )
}

pub fn figure_passage(id: &str, title: &str, caption: &str) -> String {
    passage(&[("section_type", "FIG"), ("type", "fig_caption"), ("id", id), ("figure_title", title)], caption)
}

pub fn title_passage(title: &str) -> String {
    passage(&[("section_type", "TITLE"), ("type", "front")], title)
}

// ── Annotations ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum Reply {
    Entities(Vec<Entity>),
    Empty,
    Fail,
}

impl Reply {
    fn into_result(self, endpoint: &str) -> anyhow::Result<Vec<Entity>> {
        match self {
            Reply::Entities(e) => Ok(e),
            Reply::Empty => Ok(vec![]),
            Reply::Fail => anyhow::bail!("{endpoint} unavailable"),
        }
    }
}

pub struct StubAnnotations {
    json: Reply,
    legacy: Reply,
    pub json_calls: AtomicUsize,
    pub legacy_calls: AtomicUsize,
}

impl StubAnnotations {
    pub fn new(json: Reply, legacy: Reply) -> Self {
        Self {
            json,
            legacy,
            json_calls: AtomicUsize::new(0),
            legacy_calls: AtomicUsize::new(0),
        }
    }

    pub fn counts(&self) -> (usize, usize) {
        (
            self.json_calls.load(Ordering::SeqCst),
            self.legacy_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl AnnotationSource for StubAnnotations {
    async fn annotations_json(&self, _query: &EntityQuery) -> anyhow::Result<Vec<Entity>> {
        self.json_calls.fetch_add(1, Ordering::SeqCst);
        self.json.clone().into_result("pubtator3")
    }

    async fn annotations_pubtator(&self, _query: &EntityQuery) -> anyhow::Result<Vec<Entity>> {
        self.legacy_calls.fetch_add(1, Ordering::SeqCst);
        self.legacy.clone().into_result("legacy pubtator")
    }
}

// ── Abstracts ────────────────────────────────────────────────────────────────

pub struct StubAbstracts {
    record: Option<AbstractRecord>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl StubAbstracts {
    pub fn none() -> Self {
        Self { record: None, fail: false, calls: AtomicUsize::new(0) }
    }

    pub fn with_abstract(text: &str) -> Self {
        Self {
            record: Some(AbstractRecord { title: String::new(), abstract_text: text.to_string() }),
            ..Self::none()
        }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::none() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AbstractSource for StubAbstracts {
    async fn lookup(&self, _query: &EntityQuery) -> anyhow::Result<Option<AbstractRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("abstract service unavailable");
        }
        Ok(self.record.clone())
    }
}

// ── ID conversion ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct StubConverter {
    pmid_to_pmc: HashMap<String, String>,
}

impl StubConverter {
    pub fn mapping(pmid: &str, pmcid: &str) -> Self {
        let mut pmid_to_pmc = HashMap::new();
        pmid_to_pmc.insert(pmid.to_string(), pmcid.to_string());
        Self { pmid_to_pmc }
    }
}

#[async_trait]
impl IdConverter for StubConverter {
    async fn pmid_to_pmcid(&self, pmid: &str) -> anyhow::Result<Option<String>> {
        Ok(self.pmid_to_pmc.get(pmid).cloned())
    }

    async fn pmcid_to_pmid(&self, pmcid: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .pmid_to_pmc
            .iter()
            .find(|(_, pmc)| pmc.as_str() == pmcid)
            .map(|(pmid, _)| pmid.clone()))
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub struct Harness {
    pub papers: Arc<StubPapers>,
    pub annotations: Arc<StubAnnotations>,
    pub abstracts: Arc<StubAbstracts>,
    pub converter: Arc<StubConverter>,
}

impl Harness {
    pub fn new(papers: StubPapers) -> Self {
        Self {
            papers: Arc::new(papers),
            annotations: Arc::new(StubAnnotations::new(Reply::Empty, Reply::Empty)),
            abstracts: Arc::new(StubAbstracts::none()),
            converter: Arc::new(StubConverter::default()),
        }
    }

    pub fn annotations(mut self, annotations: StubAnnotations) -> Self {
        self.annotations = Arc::new(annotations);
        self
    }

    pub fn abstracts(mut self, abstracts: StubAbstracts) -> Self {
        self.abstracts = Arc::new(abstracts);
        self
    }

    pub fn converter(mut self, converter: StubConverter) -> Self {
        self.converter = Arc::new(converter);
        self
    }

    pub fn clients(&self) -> FiguraClients {
        FiguraClients {
            papers: self.papers.clone(),
            annotations: self.annotations.clone(),
            id_converter: self.converter.clone(),
            abstracts: self.abstracts.clone(),
            heuristic: Arc::new(HeuristicExtractor::new().unwrap()),
        }
    }

    pub async fn processor(&self, retry: RetryPolicy) -> PaperProcessor {
        PaperProcessor::new(&self.clients(), memory_store().await, retry)
    }
}

pub async fn memory_store() -> PaperStore {
    let db = Database::in_memory().await.unwrap();
    db.initialize().await.unwrap();
    PaperStore::new(Arc::new(db), FigurePolicy::default())
}
