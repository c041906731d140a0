//! Caption cleaning and entity post-processing.
//!
//! Offsets produced here are character offsets into the cleaned caption.

use std::collections::HashSet;

use figura_common::models::{Entity, Figure};
use regex::Regex;

lazy_static::lazy_static! {
    static ref MARKUP_TAG: Regex =
        Regex::new(r"</?[A-Za-z][A-Za-z0-9:-]*(?:\s[^<>]*)?/?>").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref SPACE_BEFORE_CLOSING: Regex = Regex::new(r"\s+([,.;:)\]])").unwrap();
    static ref SPACE_AFTER_OPENING: Regex = Regex::new(r"([(\[])\s+").unwrap();
}

/// Normalise caption text. Idempotent.
pub fn clean_caption(text: &str) -> String {
    let mut s = text.to_string();
    while MARKUP_TAG.is_match(&s) {
        s = MARKUP_TAG.replace_all(&s, "").into_owned();
    }
    let s = WHITESPACE.replace_all(&s, " ");
    let s = s.trim();
    let s = SPACE_BEFORE_CLOSING.replace_all(s, "$1");
    SPACE_AFTER_OPENING.replace_all(&s, "$1").into_owned()
}

/// Clean a figure's caption and label. Entities are left untouched; run
/// [`map_entities_to_caption`] afterwards to refresh their offsets.
pub fn clean(figure: Figure) -> Figure {
    Figure {
        label: WHITESPACE.replace_all(figure.label.trim(), " ").into_owned(),
        caption: clean_caption(&figure.caption),
        ..figure
    }
}

/// Trim entity text, drop blanks, turn an empty type into `None` and
/// dedup by `(text, type)` keeping the first occurrence.
pub fn process_entities(entities: Vec<Entity>) -> Vec<Entity> {
    let mut seen = HashSet::new();
    entities
        .into_iter()
        .filter_map(|mut e| {
            e.text = e.text.trim().to_string();
            if e.text.is_empty() {
                return None;
            }
            e.entity_type = e
                .entity_type
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
            seen.insert(e.identity()).then_some(e)
        })
        .collect()
}

/// Re-anchor entity offsets on `caption`.
///
/// A span that already covers the entity text is kept. Otherwise the first
/// exact occurrence wins, then the first case-insensitive one; if the text
/// does not occur at all the offsets are cleared. No entity is dropped.
pub fn map_entities_to_caption(caption: &str, entities: Vec<Entity>) -> Vec<Entity> {
    let hay: Vec<char> = caption.chars().collect();
    let hay_folded: Vec<char> = hay.iter().map(|&c| fold(c)).collect();

    entities
        .into_iter()
        .map(|mut e| {
            let needle: Vec<char> = e.text.chars().collect();
            if needle.is_empty() {
                e.start = None;
                e.end = None;
                return e;
            }

            if let (Some(start), Some(end)) = (e.start, e.end) {
                if end <= hay.len() && start <= end && hay[start..end] == needle[..] {
                    return e;
                }
            }

            let needle_folded: Vec<char> = needle.iter().map(|&c| fold(c)).collect();
            let found = find(&hay, &needle).or_else(|| find(&hay_folded, &needle_folded));
            match found {
                Some(start) => {
                    e.start = Some(start);
                    e.end = Some(start + needle.len());
                }
                None => {
                    e.start = None;
                    e.end = None;
                }
            }
            e
        })
        .collect()
}

/// Single-char case fold, so folded text keeps its char positions.
fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn find(hay: &[char], needle: &[char]) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    hay.windows(needle.len()).position(|w| w == needle)
}
