//! Scripted index searcher for orchestration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use quarry_core::error::Result;
use quarry_core::fields;
use quarry_core::traits::IndexSearcher;
use quarry_core::types::{SearchRequest, SearchResult};

/// Searcher that replays canned responses and records every request.
///
/// Responses are consumed in order; the last one is replayed once the
/// script runs out, which keeps fan-out tests short.
pub struct ScriptedSearcher {
    responses: Mutex<VecDeque<SearchResult>>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl ScriptedSearcher {
    pub fn new(responses: Vec<SearchResult>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndexSearcher for ScriptedSearcher {
    async fn search(&self, _indexes: &[String], req: &SearchRequest) -> Result<SearchResult> {
        self.requests.lock().unwrap().push(req.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            Ok(responses.pop_front().unwrap())
        } else {
            Ok(responses.front().cloned().unwrap_or_default())
        }
    }
}

/// Build a recalled pool from `(chunk_id, doc_id, content, vector)` rows.
pub fn pool(rows: &[(&str, &str, &str, Vec<f32>)]) -> SearchResult {
    let mut sres = SearchResult {
        total: rows.len() as u64,
        ..Default::default()
    };
    for (id, doc, content, vector) in rows {
        sres.chunk_ids.push(id.to_string());
        let mut f = HashMap::new();
        f.insert(fields::DOC_ID.to_string(), json!(doc));
        f.insert(fields::DOC_NAME.to_string(), json!(format!("{}.pdf", doc)));
        f.insert(fields::KB_ID.to_string(), json!("kb1"));
        f.insert(fields::CONTENT.to_string(), json!(content));
        f.insert(fields::CONTENT_TOKENS.to_string(), json!(content));
        if !vector.is_empty() {
            f.insert(fields::vector_field(vector.len()), json!(vector));
        }
        sres.fields.insert(id.to_string(), f);
    }
    sres
}
