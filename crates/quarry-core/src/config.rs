//! Configuration types for the retrieval engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the retrieval engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarryConfig {
    /// Retrieval pipeline configuration.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Index engine configuration.
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding service configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Rerank model service configuration.
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Citation attribution configuration.
    #[serde(default)]
    pub citation: CitationConfig,
}

impl Default for QuarryConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            rerank: RerankConfig::default(),
            citation: CitationConfig::default(),
        }
    }
}

/// Retrieval strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Single-query two-tier retrieval.
    Basic,

    /// Paraphrase fan-out fused with reciprocal rank fusion.
    MultiQuery,
}

/// Retrieval pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Highest page served by the in-memory rerank tier.
    #[serde(default = "default_rerank_page_limit")]
    pub rerank_page_limit: usize,

    /// Vector-search candidate count at recall time.
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,

    /// Minimum widened-pool size for the rerank tier.
    #[serde(default = "default_recall_floor")]
    pub recall_floor: usize,

    /// Composite score below which chunks are dropped.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Vector share of the composite score at rerank time.
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    /// minimum_should_match for the first recall attempt.
    #[serde(default = "default_min_should_match")]
    pub min_should_match: f32,

    /// minimum_should_match for the relaxed retry.
    #[serde(default = "default_relaxed_min_should_match")]
    pub relaxed_min_should_match: f32,

    /// Vector similarity floor for the first recall attempt.
    #[serde(default = "default_dense_similarity")]
    pub dense_similarity: f32,

    /// Vector similarity floor for the relaxed retry.
    #[serde(default = "default_relaxed_dense_similarity")]
    pub relaxed_dense_similarity: f32,

    /// Retrieval strategy for the serving-layer entry point.
    #[serde(default = "default_strategy")]
    pub strategy: RetrievalStrategy,

    /// Sub-query count for multi-query retrieval (floor 2).
    #[serde(default = "default_multi_query_n")]
    pub multi_query_n: usize,

    /// Reciprocal rank fusion constant.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rerank_page_limit: 3,
            candidate_pool: 1024,
            recall_floor: 128,
            similarity_threshold: 0.1,
            vector_weight: 0.3,
            min_should_match: 0.3,
            relaxed_min_should_match: 0.1,
            dense_similarity: 0.1,
            relaxed_dense_similarity: 0.17,
            strategy: RetrievalStrategy::Basic,
            multi_query_n: 4,
            rrf_k: 60,
        }
    }
}

/// Index engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Engine base URL.
    #[serde(default = "default_index_url")]
    pub base_url: String,

    /// Per-query timeout in seconds.
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,

    /// Attempts for timeout-class failures.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    /// Pause between attempts in milliseconds.
    #[serde(default = "default_retry_pause_ms")]
    pub retry_pause_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_url: default_index_url(),
            timeout_secs: 600,
            retry_attempts: 2,
            retry_pause_ms: 200,
        }
    }
}

/// Embedding service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Service base URL (OpenAI-compatible).
    #[serde(default = "default_embedding_url")]
    pub base_url: String,

    /// Model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Maximum texts per request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,

    /// Retry attempts on transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: 1024,
            batch_size: 10,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

/// Rerank model service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Service base URL.
    #[serde(default = "default_rerank_url")]
    pub base_url: String,

    /// Model name.
    #[serde(default = "default_rerank_model")]
    pub model: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,

    /// Retry attempts on transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            base_url: default_rerank_url(),
            model: default_rerank_model(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

/// Citation attribution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationConfig {
    /// Term-overlap share of span/chunk similarity.
    #[serde(default = "default_citation_tk_weight")]
    pub tk_weight: f32,

    /// Vector share of span/chunk similarity.
    #[serde(default = "default_citation_vt_weight")]
    pub vt_weight: f32,

    /// Initial similarity threshold.
    #[serde(default = "default_citation_threshold")]
    pub threshold: f32,

    /// Multiplier applied while relaxing the threshold.
    #[serde(default = "default_citation_decay")]
    pub decay: f32,

    /// Relaxation stops once the threshold drops to this floor.
    #[serde(default = "default_citation_floor")]
    pub floor: f32,

    /// Maximum citations per answer span.
    #[serde(default = "default_max_per_span")]
    pub max_per_span: usize,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            tk_weight: 0.1,
            vt_weight: 0.9,
            threshold: 0.63,
            decay: 0.8,
            floor: 0.3,
            max_per_span: 4,
        }
    }
}

// Default value functions

fn default_rerank_page_limit() -> usize {
    3
}

fn default_candidate_pool() -> usize {
    1024
}

fn default_recall_floor() -> usize {
    128
}

fn default_similarity_threshold() -> f32 {
    0.1
}

fn default_vector_weight() -> f32 {
    0.3
}

fn default_min_should_match() -> f32 {
    0.3
}

fn default_relaxed_min_should_match() -> f32 {
    0.1
}

fn default_dense_similarity() -> f32 {
    0.1
}

fn default_relaxed_dense_similarity() -> f32 {
    0.17
}

fn default_strategy() -> RetrievalStrategy {
    RetrievalStrategy::Basic
}

fn default_multi_query_n() -> usize {
    4
}

fn default_rrf_k() -> u32 {
    60
}

fn default_index_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index_timeout() -> u64 {
    600
}

fn default_retry_attempts() -> usize {
    2
}

fn default_retry_pause_ms() -> u64 {
    200
}

fn default_embedding_url() -> String {
    "http://localhost:8081/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-v3".to_string()
}

fn default_dimension() -> usize {
    1024
}

fn default_batch_size() -> usize {
    10
}

fn default_model_timeout() -> u64 {
    30
}

fn default_max_retries() -> usize {
    2
}

fn default_rerank_url() -> String {
    "http://localhost:8082/v1".to_string()
}

fn default_rerank_model() -> String {
    "gte-rerank".to_string()
}

fn default_citation_tk_weight() -> f32 {
    0.1
}

fn default_citation_vt_weight() -> f32 {
    0.9
}

fn default_citation_threshold() -> f32 {
    0.63
}

fn default_citation_decay() -> f32 {
    0.8
}

fn default_citation_floor() -> f32 {
    0.3
}

fn default_max_per_span() -> usize {
    4
}

impl QuarryConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::QuarryError::Config {
                message: format!("Failed to parse config: {}", e),
            }
        })?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> crate::error::Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("quarry").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("quarry.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        // Return defaults
        Ok(Self::default())
    }
}
