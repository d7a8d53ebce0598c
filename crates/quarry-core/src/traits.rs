//! Collaborator traits at the engine's boundaries.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{SearchRequest, SearchResult};

/// Index query service.
///
/// Implemented against an Elasticsearch-compatible engine; the request is
/// abstract and the implementation owns translation, execution and response
/// normalization.
#[async_trait]
pub trait IndexSearcher: Send + Sync {
    /// Execute one search over the given indexes.
    async fn search(&self, indexes: &[String], req: &SearchRequest) -> Result<SearchResult>;
}

/// Sentence embedding service.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of passage texts.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// External rerank model service.
#[async_trait]
pub trait RerankModel: Send + Sync {
    /// Score each candidate text against the query.
    ///
    /// Returned scores are aligned with the input order.
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>>;
}

/// Paraphrase generator backing multi-query retrieval.
#[async_trait]
pub trait SubQueryGenerator: Send + Sync {
    /// Rewrite the question into up to `n` diverse search queries.
    async fn expand(&self, question: &str, n: usize) -> Result<Vec<String>>;
}
