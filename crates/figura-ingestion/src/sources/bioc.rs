//! BioC PMC client and figure caption extraction.
//!
//! Endpoint: `<base>/BioC_xml/<PMCID>/unicode`
//!
//! A BioC document is a list of passages. Each passage carries `<infon>`
//! key/value pairs (section type, figure id, figure title, ...) and a
//! `<text>`. Figure captions are often split over several passages that
//! share a figure id; those are joined back together here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use figura_common::models::{fill_positional_labels, with_pmc_prefix, Figure, Paper};
use figura_common::sandbox::SandboxClient;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use tracing::{debug, instrument, warn};

use super::PaperSource;
use crate::error::FetchError;

/// In-body marker the BioC service uses instead of an HTTP error status.
const UPSTREAM_ERROR_MARKER: &str = "[Error]";

lazy_static::lazy_static! {
    static ref FIGURE_NUMBER: Regex = Regex::new(r"(?i)fig(?:ure)?\.?\s*(\d+)").unwrap();
    static ref FIRST_DIGITS: Regex = Regex::new(r"\d+").unwrap();
}

// ── HTTP client ──────────────────────────────────────────────────────────────

pub struct BiocClient {
    client: SandboxClient,
    base_url: String,
}

impl BiocClient {
    pub fn new(client: SandboxClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn document_url(&self, pmc_id: &str) -> String {
        format!("{}/BioC_xml/{}/unicode", self.base_url, pmc_id)
    }
}

#[async_trait]
impl PaperSource for BiocClient {
    #[instrument(skip(self))]
    async fn fetch_bioc(&self, pmc_id: &str) -> Result<String, FetchError> {
        let url = self.document_url(pmc_id);
        debug!("Fetching BioC document from {}", url);

        let resp = self.client.get(&url)?.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Transport(format!("HTTP {status} from {url}")));
        }
        Ok(resp.text().await?)
    }
}

// ── Fetcher ──────────────────────────────────────────────────────────────────

/// Turns a PMC ID into a `Paper` with title, abstract and figure captions.
#[derive(Clone)]
pub struct BiocFetcher {
    source: Arc<dyn PaperSource>,
}

impl BiocFetcher {
    pub fn new(source: Arc<dyn PaperSource>) -> Self {
        Self { source }
    }

    /// Fetch and parse. Accepts the id with or without the "PMC" prefix.
    #[instrument(skip(self))]
    pub async fn fetch(&self, pmc_id: &str) -> Result<Paper, FetchError> {
        let pmc_id = with_pmc_prefix(pmc_id);
        let body = self.source.fetch_bioc(&pmc_id).await?;

        if body.contains(UPSTREAM_ERROR_MARKER) {
            let message: String = body.trim().chars().take(200).collect();
            return Err(FetchError::Upstream { pmc_id, message });
        }

        let paper = parse_bioc_xml(&pmc_id, &body)?;
        debug!("{}: {} figures, title {:?}", pmc_id, paper.figures.len(), paper.title);
        Ok(paper)
    }

    /// Whether `pmc_id` resolves to a well-formed BioC document.
    pub async fn probe(&self, pmc_id: &str) -> bool {
        match self.fetch(pmc_id).await {
            Ok(_) => true,
            Err(e) => {
                debug!("Probe of {} failed: {}", pmc_id, e);
                false
            }
        }
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Passage {
    infons: HashMap<String, String>,
    text: Option<String>,
}

impl Passage {
    fn infon(&self, key: &str) -> Option<&str> {
        self.infons.get(key).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    fn section_type(&self) -> String {
        self.infon("section_type")
            .or_else(|| self.infon("type"))
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }

    fn is_figure(&self) -> bool {
        let passage_type = self.infon("type").unwrap_or_default().to_lowercase();
        self.section_type() == "fig" || passage_type == "fig_caption" || passage_type == "fig_title_caption"
    }
}

#[derive(Default)]
struct FigureGroup {
    title: Option<String>,
    texts: Vec<String>,
}

/// Collects passages into title, abstract and figure groups.
#[derive(Default)]
struct DocumentBuilder {
    title: Option<String>,
    abstracts: Vec<String>,
    groups: Vec<FigureGroup>,
    group_index: HashMap<String, usize>,
}

impl DocumentBuilder {
    fn add(&mut self, passage: Passage) {
        let Some(text) = passage.text.as_deref() else {
            return;
        };

        if passage.is_figure() {
            let key = self.figure_key(&passage);
            let idx = match self.group_index.get(&key) {
                Some(&idx) => idx,
                None => {
                    self.groups.push(FigureGroup::default());
                    self.group_index.insert(key, self.groups.len() - 1);
                    self.groups.len() - 1
                }
            };
            let group = &mut self.groups[idx];
            if group.title.is_none() {
                group.title = passage.infon("figure_title").map(|t| t.trim().to_string());
            }
            if !text.trim().is_empty() {
                group.texts.push(text.trim().to_string());
            }
            return;
        }

        match passage.section_type().as_str() {
            "title" if self.title.is_none() && !text.trim().is_empty() => {
                self.title = Some(text.trim().to_string());
            }
            "abstract" if !text.trim().is_empty() => self.abstracts.push(text.trim().to_string()),
            _ => {}
        }
    }

    fn figure_key(&self, passage: &Passage) -> String {
        if let Some(id) = passage.infon("id").or_else(|| passage.infon("figure_id")) {
            return id.trim().to_string();
        }
        if let Some(title) = passage.infon("figure_title") {
            let digits = FIGURE_NUMBER
                .captures(title)
                .and_then(|c| c.get(1))
                .or_else(|| FIRST_DIGITS.find(title));
            if let Some(d) = digits {
                return format!("fig{}", d.as_str());
            }
        }
        format!("unknown_fig_{}", self.groups.len() + 1)
    }

    fn finish(self, pmc_id: &str) -> Paper {
        let labels = assign_labels(&self.groups);
        let figures = self
            .groups
            .into_iter()
            .zip(labels)
            .map(|(group, label)| Figure::new(label, group.texts.join(" ")))
            .collect();

        Paper {
            paper_id: pmc_id.to_string(),
            title: self.title.unwrap_or_else(|| Paper::placeholder_title(pmc_id)),
            abstract_text: self.abstracts.join("\n\n"),
            figures,
        }
    }
}

/// Unique label per figure. Explicit titles are reserved first (duplicates
/// get " (2)", " (3)", ...); untitled figures then take "Figure <n>" from
/// their position, bumping n until it is free.
fn assign_labels(groups: &[FigureGroup]) -> Vec<String> {
    let mut used = std::collections::HashSet::new();
    let mut labels: Vec<Option<String>> = Vec::with_capacity(groups.len());

    for group in groups {
        let label = group.title.as_deref().map(collapse_whitespace).filter(|t| !t.is_empty()).map(|title| {
            let mut candidate = title.clone();
            let mut k = 2;
            while used.contains(&candidate) {
                candidate = format!("{title} ({k})");
                k += 1;
            }
            candidate
        });
        if let Some(l) = &label {
            used.insert(l.clone());
        }
        labels.push(label);
    }

    fill_positional_labels(labels)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Parse a BioC XML collection into a `Paper`.
///
/// Only `<infon>` and `<text>` elements that are direct children of a
/// `<passage>` are read; annotation and sentence children are ignored.
pub fn parse_bioc_xml(pmc_id: &str, xml: &str) -> Result<Paper, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut builder = DocumentBuilder::default();
    let mut passage: Option<Passage> = None;
    let mut infon_key: Option<String> = None;
    let mut infon_value = String::new();
    let mut in_text = false;
    let mut saw_document = false;
    let mut stack: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let in_passage = parent_is_passage(&stack);
                match e.name().as_ref() {
                    b"document" => saw_document = true,
                    b"passage" => passage = Some(Passage::default()),
                    b"infon" if in_passage => {
                        infon_key = attribute(e, "key");
                        infon_value.clear();
                    }
                    b"text" if in_passage => {
                        if let Some(p) = passage.as_mut() {
                            in_text = true;
                            p.text.get_or_insert_with(String::new);
                        }
                    }
                    _ => {}
                }
                stack.push(e.name().as_ref().to_vec());
            }
            Ok(Event::Empty(ref e)) => {
                let in_passage = parent_is_passage(&stack);
                match e.name().as_ref() {
                    b"document" => saw_document = true,
                    b"text" if in_passage => {
                        if let Some(p) = passage.as_mut() {
                            p.text.get_or_insert_with(String::new);
                        }
                    }
                    b"infon" if in_passage => {
                        if let (Some(p), Some(key)) = (passage.as_mut(), attribute(e, "key")) {
                            p.infons.insert(key, String::new());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                // Unknown entity references are kept verbatim.
                let text = e
                    .unescape()
                    .map(|t| t.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned());
                append_text(&mut passage, &infon_key, &mut infon_value, in_text, &text);
            }
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e);
                append_text(&mut passage, &infon_key, &mut infon_value, in_text, &text);
            }
            Ok(Event::End(ref e)) => {
                stack.pop();
                let in_passage = parent_is_passage(&stack);
                match e.name().as_ref() {
                    b"infon" if in_passage => {
                        if let (Some(p), Some(key)) = (passage.as_mut(), infon_key.take()) {
                            p.infons.insert(key, std::mem::take(&mut infon_value));
                        }
                    }
                    b"text" if in_passage => in_text = false,
                    b"passage" => {
                        if let Some(p) = passage.take() {
                            builder.add(p);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("BioC XML error for {} at {}: {}", pmc_id, reader.error_position(), e);
                return Err(FetchError::Parse(e.to_string()));
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(FetchError::Parse("document ended inside an open element".to_string()));
    }
    if !saw_document {
        return Err(FetchError::Parse("no <document> element".to_string()));
    }

    Ok(builder.finish(pmc_id))
}

fn parent_is_passage(stack: &[Vec<u8>]) -> bool {
    stack.last().is_some_and(|name| name.as_slice() == b"passage")
}

fn append_text(
    passage: &mut Option<Passage>,
    infon_key: &Option<String>,
    infon_value: &mut String,
    in_text: bool,
    text: &str,
) {
    if infon_key.is_some() {
        infon_value.push_str(text);
    } else if in_text {
        if let Some(t) = passage.as_mut().and_then(|p| p.text.as_mut()) {
            t.push_str(text);
        }
    }
}
