//! HTTP search client for an Elasticsearch-compatible index engine.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use quarry_core::config::IndexConfig;
use quarry_core::error::{QuarryError, Result};
use quarry_core::traits::IndexSearcher;
use quarry_core::types::{SearchRequest, SearchResult};

use crate::response::parse_response;
use crate::translate::to_engine_query;

/// Index engine search client.
///
/// Retries timeout-class failures (transport timeouts and responses with
/// `timed_out: true`); any other engine failure surfaces immediately.
pub struct ElasticSearcher {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
    attempts: usize,
    pause: Duration,
}

impl ElasticSearcher {
    /// Create a client from configuration.
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                QuarryError::index_engine(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
            attempts: config.retry_attempts.max(1),
            pause: Duration::from_millis(config.retry_pause_ms),
        })
    }
}

#[async_trait]
impl IndexSearcher for ElasticSearcher {
    async fn search(&self, indexes: &[String], req: &SearchRequest) -> Result<SearchResult> {
        if indexes.is_empty() {
            return Err(QuarryError::invalid_argument("no index names given"));
        }

        let query = to_engine_query(req)?;
        let url = format!(
            "{}/{}/_search?timeout={}s&track_total_hits=true",
            self.base_url,
            indexes.join(","),
            self.timeout_secs
        );

        let mut last_timeout = String::from("no attempt completed");
        for attempt in 0..self.attempts {
            if attempt > 0 {
                tokio::time::sleep(self.pause).await;
                debug!(attempt, "retrying index search");
            }

            let response = match self.client.post(&url).json(&query).send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    warn!(attempt, error = %e, "index search transport timeout");
                    last_timeout = e.to_string();
                    continue;
                }
                Err(e) => {
                    return Err(QuarryError::index_engine(format!(
                        "search request failed: {}",
                        e
                    )))
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(QuarryError::index_engine(format!(
                    "search returned {}: {}",
                    status, body
                )));
            }

            let body: Value = response.json().await.map_err(|e| {
                QuarryError::index_engine(format!("malformed search response: {}", e))
            })?;

            if body["timed_out"].as_bool().unwrap_or(false) {
                warn!(attempt, "index engine reported a timed-out search");
                last_timeout = String::from("engine reported timed_out");
                continue;
            }

            return parse_response(&body, req);
        }

        Err(QuarryError::retrieval_timeout(self.attempts, last_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = IndexConfig {
            base_url: "http://localhost:9200/".to_string(),
            ..Default::default()
        };
        let searcher = ElasticSearcher::new(&config).unwrap();
        assert_eq!(searcher.base_url, "http://localhost:9200");
    }

    #[test]
    fn test_new_floors_attempts_at_one() {
        let config = IndexConfig {
            retry_attempts: 0,
            ..Default::default()
        };
        let searcher = ElasticSearcher::new(&config).unwrap();
        assert_eq!(searcher.attempts, 1);
    }
}
