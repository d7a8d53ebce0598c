//! Question paraphrasing for multi-query retrieval.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quarry_core::error::{QuarryError, Result};
use quarry_core::SubQueryGenerator;

const SYSTEM_PROMPT: &str = "You rewrite a user question into diverse standalone \
search queries covering its distinct aspects. Return one query per line with no \
numbering, bullets or commentary.";

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    content: String,
}

/// Paraphrase generator backed by an OpenAI-compatible chat endpoint.
pub struct LlmSubQueryGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_retries: usize,
}

impl LlmSubQueryGenerator {
    /// Create a generator against a chat-completions service.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
        max_retries: usize,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| QuarryError::sub_query(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_retries,
        })
    }

    async fn send(&self, body: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| QuarryError::sub_query(format!("chat request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(QuarryError::sub_query(format!(
                "chat service returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| QuarryError::sub_query(format!("malformed chat response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| QuarryError::sub_query("chat response had no choices"))
    }
}

/// One rewrite per line; bullets, numbering and blank lines are stripped.
fn parse_rewrites(content: &str, n: usize) -> Vec<String> {
    content
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '*', '•', '．'])
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(n)
        .collect()
}

#[async_trait]
impl SubQueryGenerator for LlmSubQueryGenerator {
    async fn expand(&self, question: &str, n: usize) -> Result<Vec<String>> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Rewrite into {} search queries:\n{}", n, question),
                },
            ],
            temperature: 0.2,
        };

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * 2u64.pow(attempt as u32 - 1));
                tokio::time::sleep(delay).await;
                debug!(attempt, "retrying sub-query request");
            }

            match self.send(&body).await {
                Ok(content) => return Ok(parse_rewrites(&content, n)),
                Err(e) => {
                    warn!(attempt, error = %e, "sub-query request failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| QuarryError::sub_query("all retries exhausted")))
    }
}

/// Mock generator returning canned rewrites.
pub struct MockSubQueryGenerator {
    rewrites: Vec<String>,
}

impl MockSubQueryGenerator {
    /// Create a mock that expands every question into the given rewrites.
    pub fn new(rewrites: Vec<String>) -> Self {
        Self { rewrites }
    }
}

#[async_trait]
impl SubQueryGenerator for MockSubQueryGenerator {
    async fn expand(&self, _question: &str, n: usize) -> Result<Vec<String>> {
        Ok(self.rewrites.iter().take(n).cloned().collect())
    }
}
