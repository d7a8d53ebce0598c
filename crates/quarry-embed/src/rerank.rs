//! Rerank model service client and mock.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quarry_core::config::RerankConfig;
use quarry_core::error::{QuarryError, Result};
use quarry_core::RerankModel;

#[derive(Serialize)]
struct RerankRequest {
    model: String,
    query: String,
    documents: Vec<String>,
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

/// Client for a cross-encoder `/rerank` endpoint.
///
/// The service may return results in relevance order; scores are realigned
/// to the input order before returning.
pub struct HttpRerankModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_retries: usize,
}

impl HttpRerankModel {
    /// Create a client from configuration.
    pub fn new(config: &RerankConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                QuarryError::rerank_unavailable(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn send(&self, body: &RerankRequest) -> Result<Vec<f32>> {
        let url = format!("{}/rerank", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| QuarryError::rerank_unavailable(format!("rerank request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(QuarryError::rerank_unavailable(format!(
                "rerank service returned {}: {}",
                status, text
            )));
        }

        let parsed: RerankResponse = response.json().await.map_err(|e| {
            QuarryError::rerank_unavailable(format!("malformed rerank response: {}", e))
        })?;

        let mut scores = vec![0.0f32; body.documents.len()];
        for result in parsed.results {
            if result.index < scores.len() {
                scores[result.index] = result.relevance_score;
            }
        }
        Ok(scores)
    }
}

#[async_trait]
impl RerankModel for HttpRerankModel {
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = RerankRequest {
            model: self.model.clone(),
            query: query.to_string(),
            documents: texts.iter().map(|t| t.to_string()).collect(),
            top_n: texts.len(),
        };

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * 2u64.pow(attempt as u32 - 1));
                tokio::time::sleep(delay).await;
                debug!(attempt, "retrying rerank request");
            }

            match self.send(&body).await {
                Ok(scores) => return Ok(scores),
                Err(e) => {
                    warn!(attempt, error = %e, "rerank request failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| QuarryError::rerank_unavailable("all retries exhausted")))
    }
}

/// Mock rerank model returning canned scores, input-order aligned.
pub struct MockRerankModel {
    scores: Vec<f32>,
    available: bool,
}

impl MockRerankModel {
    /// Create a mock that scores candidates with the given values.
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            available: true,
        }
    }

    /// Create a mock that fails every call.
    pub fn unavailable() -> Self {
        Self {
            scores: Vec::new(),
            available: false,
        }
    }
}

#[async_trait]
impl RerankModel for MockRerankModel {
    async fn score(&self, _query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        if !self.available {
            return Err(QuarryError::rerank_unavailable("mock set unavailable"));
        }
        Ok((0..texts.len())
            .map(|i| self.scores.get(i).copied().unwrap_or(0.0))
            .collect())
    }
}
