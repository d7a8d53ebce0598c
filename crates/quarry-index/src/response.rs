//! Engine response normalization into the canonical result shape.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use quarry_core::error::{QuarryError, Result};
use quarry_core::types::{SearchRequest, SearchResult};

static SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.?!;\n]").unwrap());
static EM_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<em>[^<>]+</em>").unwrap());

/// hits.total arrives as a bare count or as `{value, relation}`.
fn parse_total(raw: &Value) -> u64 {
    let total = &raw["hits"]["total"];
    if let Some(n) = total.as_u64() {
        return n;
    }
    total["value"].as_u64().unwrap_or(0)
}

/// First highlighted field's fragments joined with an ellipsis.
fn raw_highlight(hit: &Value) -> Option<String> {
    let fields = hit.get("highlight")?.as_object()?;
    let (_, fragments) = fields.iter().next()?;
    let parts: Vec<&str> = fragments
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("..."))
    }
}

/// Normalize a raw engine response.
///
/// Scalar field values are stringified so downstream consumers see one
/// shape; lists and objects are kept structured. Hits carrying none of
/// the requested fields are dropped from the field map but keep their
/// position in `chunk_ids`.
pub fn parse_response(raw: &Value, req: &SearchRequest) -> Result<SearchResult> {
    let hits = raw["hits"]["hits"]
        .as_array()
        .ok_or_else(|| QuarryError::index_engine("malformed search response: missing hits"))?;

    let mut result = SearchResult {
        total: parse_total(raw),
        ..Default::default()
    };

    for hit in hits {
        let id = hit["_id"].as_str().unwrap_or_default().to_string();
        if id.is_empty() {
            continue;
        }

        let source = &hit["_source"];
        let mut fields = std::collections::HashMap::new();
        for name in &req.select_fields {
            let value = &source[name.as_str()];
            match value {
                Value::Null => {}
                Value::Array(_) | Value::Object(_) | Value::String(_) => {
                    fields.insert(name.clone(), value.clone());
                }
                other => {
                    fields.insert(name.clone(), Value::String(other.to_string()));
                }
            }
        }
        if !fields.is_empty() {
            result.fields.insert(id.clone(), fields);
        }

        if let Some(text) = raw_highlight(hit) {
            result.highlights.insert(id.clone(), text);
        }

        result.chunk_ids.push(id);
    }

    for field in &req.aggregation_fields {
        let buckets = &raw["aggregations"][format!("aggs_{}", field)]["buckets"];
        if let Some(buckets) = buckets.as_array() {
            for bucket in buckets {
                let key = match &bucket["key"] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let count = bucket["doc_count"].as_u64().unwrap_or(0);
                result.aggregations.push((key, count));
            }
        }
    }
    result.aggregations.sort_by(|a, b| b.1.cmp(&a.1));

    Ok(result)
}

/// Share of whitespace tokens that look like Latin prose.
fn is_english_text(text: &str) -> bool {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return false;
    }
    let latin = tokens
        .iter()
        .filter(|t| {
            t.chars()
                .next()
                .map(|c| c.is_ascii_alphabetic() || " `.,':;/\"?<>!()-".contains(c))
                .unwrap_or(false)
        })
        .count();
    latin as f32 / tokens.len() as f32 > 0.8
}

/// Rebuild an engine highlight against the display text.
///
/// Engine fragments come from tokenized fields, so for Latin text the
/// highlight is rebuilt from the raw source: sentences containing a keyword
/// are kept with the keyword wrapped in `<em>` tags. Non-Latin highlights
/// pass through, and if no sentence matches the raw fragments win.
pub fn rewrite_highlight(raw: &str, source: &str, keywords: &[String]) -> String {
    if !is_english_text(raw) {
        return raw.to_string();
    }

    let matchers: Vec<Regex> = keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .filter_map(|k| {
            Regex::new(&format!(
                "(?i)(^|[ .?/'\"()!,:;-])({})([ .?/'\"()!,:;-])",
                regex::escape(k)
            ))
            .ok()
        })
        .collect();

    let source = source.replace(['\r', '\n'], " ");
    let mut kept: Vec<String> = Vec::new();
    for sentence in SENTENCE_SPLIT.split(&source) {
        let mut text = sentence.to_string();
        for matcher in &matchers {
            text = matcher
                .replace_all(&text, "${1}<em>${2}</em>${3}")
                .into_owned();
        }
        if EM_TAG.is_match(&text) {
            kept.push(text);
        }
    }

    if kept.is_empty() {
        raw.to_string()
    } else {
        kept.join("...")
    }
}
