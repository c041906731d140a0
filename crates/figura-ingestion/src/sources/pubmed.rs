//! PubMed E-utilities client, used for title/abstract lookup by PMID.
//!
//! Endpoint: `<eutils_base>/efetch.fcgi?db=pubmed&id=<pmid>&rettype=abstract&retmode=xml`

use anyhow::Context;
use figura_common::sandbox::SandboxClient;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use super::AbstractRecord;

/// One `<PubmedArticle>` of an efetch response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PubMedArticle {
    pub pmid: Option<String>,
    pub title: String,
    pub abstract_text: String,
}

pub struct PubMedClient {
    client: SandboxClient,
    efetch_url: String,
    api_key: Option<String>,
}

impl PubMedClient {
    pub fn new(client: SandboxClient, eutils_base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            efetch_url: format!("{}/efetch.fcgi", eutils_base_url.trim_end_matches('/')),
            api_key,
        }
    }

    #[instrument(skip(self))]
    pub async fn fetch_abstract(&self, pmid: &str) -> anyhow::Result<Option<AbstractRecord>> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("id", pmid.to_string()),
            ("rettype", "abstract".to_string()),
            ("retmode", "xml".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let resp = self
            .client
            .get(&self.efetch_url)?
            .query(&params)
            .send()
            .await
            .context("PubMed efetch failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("PubMed efetch returned HTTP {}", resp.status());
        }
        let xml = resp.text().await?;

        let article = parse_pubmed_xml(&xml).into_iter().next();
        debug!(found = article.is_some(), "PubMed efetch for {}", pmid);
        Ok(article.map(|a| AbstractRecord {
            title: a.title,
            abstract_text: a.abstract_text,
        }))
    }
}

/// Parse PubMed XML (efetch abstract mode).
/// Handles the <PubmedArticleSet><PubmedArticle> structure. Structured
/// abstracts (several `<AbstractText>` sections) are joined with a space.
pub fn parse_pubmed_xml(xml: &str) -> Vec<PubMedArticle> {
    let mut articles = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<PubMedArticle> = None;
    let mut sections: Vec<String> = Vec::new();
    let mut in_pmid = false;
    let mut in_title = false;
    let mut in_abstract = false;
    // Only the article's own PMID, not those of cited papers
    let mut pmid_seen = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"PubmedArticle" => {
                    current = Some(PubMedArticle::default());
                    sections.clear();
                    pmid_seen = false;
                }
                b"PMID" => in_pmid = !pmid_seen,
                b"ArticleTitle" => in_title = true,
                b"AbstractText" => {
                    in_abstract = true;
                    sections.push(String::new());
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if let Some(ref mut a) = current {
                    if in_pmid {
                        a.pmid = Some(text.clone());
                    }
                    if in_title {
                        push_spaced(&mut a.title, &text);
                    }
                    if in_abstract {
                        if let Some(s) = sections.last_mut() {
                            push_spaced(s, &text);
                        }
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"PMID" => {
                    if in_pmid {
                        pmid_seen = true;
                    }
                    in_pmid = false;
                }
                b"ArticleTitle" => in_title = false,
                b"AbstractText" => in_abstract = false,
                b"PubmedArticle" => {
                    if let Some(mut a) = current.take() {
                        a.abstract_text = sections
                            .drain(..)
                            .filter(|s| !s.is_empty())
                            .collect::<Vec<_>>()
                            .join(" ");
                        articles.push(a);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("XML parse error: {}", e);
                break;
            }
            _ => {}
        }
    }

    articles
}

/// Append a text node, re-inserting the space that `trim_text` removed
/// around inline markup such as `<i>`.
fn push_spaced(buf: &mut String, text: &str) {
    if !buf.is_empty() && !text.starts_with(['.', ',', ';', ':', ')']) {
        buf.push(' ');
    }
    buf.push_str(text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_pubmed_xml() {
        let xml = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>12345678</PMID>
      <Article>
        <ArticleTitle>KRAS G12D in <i>pancreatic</i> cancer</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">Background text.</AbstractText>
          <AbstractText Label="RESULTS">Metformin reduced growth.</AbstractText>
        </Abstract>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ReferenceList><Reference><ArticleIdList><ArticleId IdType="pubmed">999</ArticleId></ArticleIdList></Reference></ReferenceList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

        let articles = parse_pubmed_xml(xml);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].pmid.as_deref(), Some("12345678"));
        assert_eq!(articles[0].title, "KRAS G12D in pancreatic cancer");
        assert_eq!(articles[0].abstract_text, "Background text. Metformin reduced growth.");
    }

    #[test]
    fn test_parse_without_abstract() {
        let xml = "<PubmedArticleSet><PubmedArticle><MedlineCitation><PMID>1</PMID>\
                   <Article><ArticleTitle>Only a title</ArticleTitle></Article>\
                   </MedlineCitation></PubmedArticle></PubmedArticleSet>";
        let articles = parse_pubmed_xml(xml);
        assert_eq!(articles[0].abstract_text, "");
        assert_eq!(articles[0].title, "Only a title");
    }

    #[test]
    fn test_parse_empty_body() {
        assert!(parse_pubmed_xml("").is_empty());
    }
}
