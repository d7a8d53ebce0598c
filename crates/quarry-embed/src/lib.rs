//! quarry-embed - Model service clients
//!
//! HTTP clients for the embedding, rerank and query-rewrite services the
//! retrieval engine depends on, plus deterministic mock implementations
//! for tests.

pub mod embedding;
pub mod rerank;
pub mod subquery;

pub use embedding::{HttpEmbedder, MockEmbedder};
pub use rerank::{HttpRerankModel, MockRerankModel};
pub use subquery::{LlmSubQueryGenerator, MockSubQueryGenerator};

// Re-export the traits for convenience
pub use quarry_core::{Embedder, RerankModel, SubQueryGenerator};
