//! Per-candidate feature extraction from a recalled pool.

use std::collections::{HashMap, HashSet};

use ndarray::Array1;
use serde_json::Value;
use tracing::warn;

use quarry_core::fields;
use quarry_core::types::SearchResult;

/// Whitespace tokens of a string field, empty when absent.
fn split_field<'a>(chunk: Option<&'a HashMap<String, Value>>, name: &str) -> Vec<&'a str> {
    chunk
        .and_then(|f| f.get(name))
        .and_then(Value::as_str)
        .map(|s| s.split_whitespace().collect())
        .unwrap_or_default()
}

/// Curated keywords arrive as a list, or as a single bare string.
fn important_keywords(chunk: Option<&HashMap<String, Value>>) -> Vec<String> {
    match chunk.and_then(|f| f.get(fields::IMPORTANT_KEYWORDS)) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Token bag per candidate, aligned with `chunk_ids`.
///
/// With `weighted`, repetition encodes field boosts: content tokens once
/// (deduplicated), title twice, curated keywords five times, question
/// tokens six times. Without, a flat content + title + keywords bag — the
/// shape the rerank model scores as text.
pub fn token_bags(sres: &SearchResult, weighted: bool) -> Vec<Vec<String>> {
    sres.chunk_ids
        .iter()
        .map(|id| {
            let chunk = sres.fields.get(id);
            let title = split_field(chunk, fields::TITLE_TOKENS);
            let important = important_keywords(chunk);
            let mut bag: Vec<String> = Vec::new();

            if weighted {
                let mut seen = HashSet::new();
                for t in split_field(chunk, fields::CONTENT_TOKENS) {
                    if seen.insert(t) {
                        bag.push(t.to_string());
                    }
                }
                for _ in 0..2 {
                    bag.extend(title.iter().map(|t| t.to_string()));
                }
                for _ in 0..5 {
                    bag.extend(important.iter().cloned());
                }
                let question = split_field(chunk, fields::QUESTION_TOKENS);
                for _ in 0..6 {
                    bag.extend(question.iter().map(|t| t.to_string()));
                }
            } else {
                bag.extend(
                    split_field(chunk, fields::CONTENT_TOKENS)
                        .iter()
                        .map(|t| t.to_string()),
                );
                bag.extend(title.iter().map(|t| t.to_string()));
                bag.extend(important);
            }
            bag
        })
        .collect()
}

/// Stored chunk embeddings aligned with `chunk_ids`.
///
/// The vector field is dimension-named (`q_{dim}_vec`); values arrive as a
/// JSON array or a tab-separated string. Missing vectors become zero
/// vectors so scoring can proceed.
pub fn chunk_vectors(sres: &SearchResult) -> Vec<Vec<f32>> {
    let dim = sres.query_vector.len();
    let column = fields::vector_field(dim);
    sres.chunk_ids
        .iter()
        .map(
            |id| match sres.fields.get(id).and_then(|f| f.get(&column)) {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                    .collect(),
                Some(Value::String(s)) => s
                    .split('\t')
                    .map(|v| v.trim().parse::<f32>().unwrap_or(0.0))
                    .collect(),
                _ => vec![0.0; dim],
            },
        )
        .collect()
}

fn numeric(value: Option<&Value>) -> f32 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0) as f32,
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// tag_feas is stored as an object, or as a JSON-encoded string.
fn tag_map(value: &Value) -> Option<HashMap<String, f32>> {
    match value {
        Value::Object(map) => Some(
            map.iter()
                .map(|(k, v)| (k.clone(), numeric(Some(v))))
                .collect(),
        ),
        Value::String(s) => serde_json::from_str(s).ok(),
        _ => None,
    }
}

/// Additive rank-feature boost per candidate:
/// `10 × tag-vector cosine + pagerank`.
///
/// The pagerank key is excluded from the query-side norm; with no usable
/// query-side tags the boost degrades to pagerank alone. A chunk with an
/// empty or unparseable tag map contributes no tag component.
pub fn rank_feature_scores(
    query_features: Option<&HashMap<String, f32>>,
    sres: &SearchResult,
) -> Array1<f32> {
    let pageranks: Array1<f32> = sres
        .chunk_ids
        .iter()
        .map(|id| numeric(sres.fields.get(id).and_then(|f| f.get(fields::PAGERANK))))
        .collect();

    let query = match query_features {
        Some(q) if !q.is_empty() => q,
        _ => return pageranks,
    };
    let q_denor: f32 = query
        .iter()
        .filter(|(tag, _)| tag.as_str() != fields::PAGERANK)
        .map(|(_, s)| s * s)
        .sum::<f32>()
        .sqrt();
    if q_denor == 0.0 {
        return pageranks;
    }

    let scores: Array1<f32> = sres
        .chunk_ids
        .iter()
        .map(|id| {
            let value = match sres.fields.get(id).and_then(|f| f.get(fields::TAG_FEATURES)) {
                Some(value) => value,
                None => return 0.0,
            };
            let tags = match tag_map(value) {
                Some(tags) => tags,
                None => {
                    warn!(chunk_id = %id, "unparseable tag features, boost dropped");
                    return 0.0;
                }
            };

            let mut nor = 0.0f32;
            let mut denor = 0.0f32;
            for (tag, sc) in &tags {
                if let Some(w) = query.get(tag) {
                    nor += w * sc;
                }
                denor += sc * sc;
            }
            if denor == 0.0 {
                0.0
            } else {
                nor / denor.sqrt() / q_denor
            }
        })
        .collect();

    scores * 10.0 + pageranks
}
