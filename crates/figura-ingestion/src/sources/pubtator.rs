//! PubTator annotation clients.
//!
//! Endpoints used:
//!   PubTator3: `<base>/publications/<pmid|pmcid>/<id>/annotations` (JSON)
//!   Legacy:    `<legacy_base>/publications/export/pubtator?<pmids|pmcids>=<id>` (tab separated)

use std::collections::HashSet;

use anyhow::Context;
use async_trait::async_trait;
use figura_common::models::{with_pmc_prefix, Entity};
use figura_common::sandbox::SandboxClient;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{AnnotationSource, EntityQuery};

pub struct PubTatorClient {
    client: SandboxClient,
    base_url: String,
    legacy_base_url: String,
}

impl PubTatorClient {
    pub fn new(client: SandboxClient, base_url: impl Into<String>, legacy_base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            legacy_base_url: legacy_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn annotations_url(&self, query: &EntityQuery) -> String {
        let kind = match query {
            EntityQuery::Pmid(_) => "pmid",
            EntityQuery::PmcSuffix(_) => "pmcid",
        };
        format!("{}/publications/{}/{}/annotations", self.base_url, kind, query.id())
    }

    pub fn legacy_export_url(&self, query: &EntityQuery) -> String {
        let param = match query {
            EntityQuery::Pmid(id) => format!("pmids={id}"),
            EntityQuery::PmcSuffix(id) => format!("pmcids={}", with_pmc_prefix(id)),
        };
        format!("{}/publications/export/pubtator?{}", self.legacy_base_url, param)
    }

    async fn get_text(&self, url: &str) -> anyhow::Result<String> {
        let resp = self.client.get(url)?.send().await.context("PubTator request failed")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("PubTator returned HTTP {status} for {url}");
        }
        resp.text().await.context("PubTator body could not be read")
    }
}

#[async_trait]
impl AnnotationSource for PubTatorClient {
    #[instrument(skip(self))]
    async fn annotations_json(&self, query: &EntityQuery) -> anyhow::Result<Vec<Entity>> {
        let body = self.get_text(&self.annotations_url(query)).await?;
        if body.trim().is_empty() {
            return Ok(vec![]);
        }
        let value: Value = serde_json::from_str(&body).context("PubTator3 response is not JSON")?;
        let entities = parse_annotations_json(&value);
        debug!(count = entities.len(), "PubTator3 annotations for {}", query);
        Ok(entities)
    }

    #[instrument(skip(self))]
    async fn annotations_pubtator(&self, query: &EntityQuery) -> anyhow::Result<Vec<Entity>> {
        let body = self.get_text(&self.legacy_export_url(query)).await?;
        let entities = parse_pubtator_tabular(&body);
        debug!(count = entities.len(), "Legacy PubTator annotations for {}", query);
        Ok(entities)
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────────

/// Parse a PubTator3 annotations body. Accepts `{"annotations": [...]}`,
/// a bare array, or a BioC-JSON document whose passages carry the
/// annotations. Items without text, type or a location are skipped.
pub fn parse_annotations_json(value: &Value) -> Vec<Entity> {
    let mut items: Vec<&Value> = Vec::new();
    match value {
        Value::Array(arr) => {
            for v in arr {
                if v.get("text").is_some() {
                    items.push(v);
                } else {
                    collect_annotations(v, &mut items);
                }
            }
        }
        v => collect_annotations(v, &mut items),
    }

    let mut seen = HashSet::new();
    let mut entities = Vec::new();
    for item in items {
        let text = item["text"].as_str().unwrap_or("").trim();
        let ty = item["type"]
            .as_str()
            .or_else(|| item["infons"]["type"].as_str())
            .unwrap_or("")
            .trim();
        let Some(location) = item["locations"].as_array().and_then(|l| l.first()) else {
            continue;
        };
        if text.is_empty() || ty.is_empty() {
            continue;
        }
        if !seen.insert((text.to_string(), ty.to_string())) {
            continue;
        }
        let mut entity = Entity::new(text, Some(ty));
        if let Some((start, end)) = span(location) {
            entity = entity.with_span(start, end);
        }
        entities.push(entity);
    }
    entities
}

/// `(offset, offset + length)`, or `None` when either is missing or the
/// end does not fit in a `usize`.
fn span(location: &Value) -> Option<(usize, usize)> {
    let start = usize::try_from(location["offset"].as_u64()?).ok()?;
    let length = usize::try_from(location["length"].as_u64()?).ok()?;
    Some((start, start.checked_add(length)?))
}

/// Parse the legacy PubTator tab-separated export. Bad rows are skipped
/// one at a time.
pub fn parse_pubtator_tabular(body: &str) -> Vec<Entity> {
    let mut seen = HashSet::new();
    let mut entities = Vec::new();

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') || is_text_marker(line) {
            continue;
        }
        let cols: Vec<&str> = line.split('\t').collect();
        let Some((start, end, mention, ty)) = parse_row(&cols) else {
            debug!("Skipping PubTator row: {:?}", line);
            continue;
        };
        let mention = mention.trim();
        if mention.is_empty() || !seen.insert((mention.to_string(), ty.trim().to_string())) {
            continue;
        }
        let ty = ty.trim();
        let ty = if ty.is_empty() { None } else { Some(ty) };
        entities.push(Entity::new(mention, ty).with_span(start, end));
    }
    entities
}

fn collect_annotations<'a>(v: &'a Value, items: &mut Vec<&'a Value>) {
    if let Some(arr) = v["annotations"].as_array() {
        items.extend(arr.iter());
    }
    if let Some(passages) = v["passages"].as_array() {
        for p in passages {
            if let Some(arr) = p["annotations"].as_array() {
                items.extend(arr.iter());
            }
        }
    }
}

/// `<pmid>|t|<title>` and `<pmid>|a|<abstract>` lines.
fn is_text_marker(line: &str) -> bool {
    let mut parts = line.splitn(3, '|');
    let pmid = parts.next().unwrap_or("");
    let is_pmid = !pmid.is_empty() && pmid.bytes().all(|b| b.is_ascii_digit());
    is_pmid && matches!(parts.next(), Some("t" | "a"))
}

fn parse_row<'a>(cols: &[&'a str]) -> Option<(usize, usize, &'a str, &'a str)> {
    let int = |s: &str| s.trim().parse::<usize>().ok();

    if cols.len() >= 5 && int(cols[0]).is_some() && int(cols[1]).is_some() && int(cols[2]).is_some() {
        // pmid, start, end, mention, type[, concept]
        return Some((int(cols[1])?, int(cols[2])?, cols[3], cols[4]));
    }
    if cols.len() >= 4 {
        // start, end, mention, type[, ...]
        return Some((int(cols[0])?, int(cols[1])?, cols[2], cols[3]));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_annotations_object() {
        let v = json!({
            "annotations": [
                {"text": "TP53", "type": "Gene", "locations": [{"offset": 10, "length": 4}, {"offset": 50, "length": 4}]},
                {"text": "TP53", "type": "Gene", "locations": [{"offset": 99, "length": 4}]},
                {"text": "metformin", "type": "Chemical", "locations": [{"offset": 0, "length": 9}]},
                {"text": "", "type": "Gene", "locations": [{"offset": 0, "length": 1}]},
                {"text": "KRAS", "locations": [{"offset": 0, "length": 4}]},
                {"text": "EGFR", "type": "Gene", "locations": []}
            ]
        });
        let entities = parse_annotations_json(&v);
        assert_eq!(
            entities,
            vec![
                Entity::new("TP53", Some("Gene")).with_span(10, 14),
                Entity::new("metformin", Some("Chemical")).with_span(0, 9),
            ]
        );
    }

    #[test]
    fn test_parse_annotations_bare_array_and_passages() {
        let bare = json!([{"text": "BRCA1", "type": "Gene", "locations": [{"offset": 3, "length": 5}]}]);
        assert_eq!(parse_annotations_json(&bare)[0].start, Some(3));

        let bioc = json!([{
            "passages": [{
                "annotations": [
                    {"text": "cancer", "infons": {"type": "Disease"}, "locations": [{"offset": 7, "length": 6}]}
                ]
            }]
        }]);
        let entities = parse_annotations_json(&bioc);
        assert_eq!(entities, vec![Entity::new("cancer", Some("Disease")).with_span(7, 13)]);
    }

    #[test]
    fn test_parse_tabular_both_layouts() {
        let body = "12345|t|A title\n\
                    12345|a|An abstract\n\
                    # comment\n\
                    \n\
                    12345\t0\t4\tTP53\tGene\t7157\n\
                    20\t29\tmetformin\tChemical\n\
                    12345\tx\t4\tBAD\tGene\n\
                    1\t2\tshort\n\
                    12345\t0\t4\tTP53\tGene\t7157\n";
        let entities = parse_pubtator_tabular(body);
        assert_eq!(
            entities,
            vec![
                Entity::new("TP53", Some("Gene")).with_span(0, 4),
                Entity::new("metformin", Some("Chemical")).with_span(20, 29),
            ]
        );
    }

    #[test]
    fn test_out_of_range_or_missing_offsets_leave_span_empty() {
        let v = json!([
            {"text": "TP53", "type": "Gene", "locations": [{"offset": u64::MAX, "length": 4}]},
            {"text": "KRAS", "type": "Gene", "locations": [{"length": 4}]},
            {"text": "EGFR", "type": "Gene", "locations": [{"offset": 5}]},
            {"text": "BRAF", "type": "Gene", "locations": [{"offset": 0, "length": 4}]}
        ]);
        let entities = parse_annotations_json(&v);
        assert_eq!(entities.len(), 4);
        for entity in &entities[..3] {
            assert_eq!((entity.start, entity.end), (None, None), "{}", entity.text);
        }
        assert_eq!((entities[3].start, entities[3].end), (Some(0), Some(4)));
    }

    #[test]
    fn test_tab_row_with_pipe_mention_is_kept() {
        let body = "12345|t|A title\n\
                    12345\t0\t7\tx|a|y z\tChemical\n\
                    |a|stray\n";
        let entities = parse_pubtator_tabular(body);
        assert_eq!(entities, vec![Entity::new("x|a|y z", Some("Chemical")).with_span(0, 7)]);
    }

    #[test]
    fn test_urls() {
        let client = PubTatorClient::new(SandboxClient::new().unwrap(), "https://p3/api/", "https://legacy/api");
        assert_eq!(
            client.annotations_url(&EntityQuery::Pmid("123".into())),
            "https://p3/api/publications/pmid/123/annotations"
        );
        assert_eq!(
            client.annotations_url(&EntityQuery::PmcSuffix("42".into())),
            "https://p3/api/publications/pmcid/42/annotations"
        );
        assert_eq!(
            client.legacy_export_url(&EntityQuery::PmcSuffix("42".into())),
            "https://legacy/api/publications/export/pubtator?pmcids=PMC42"
        );
    }
}
