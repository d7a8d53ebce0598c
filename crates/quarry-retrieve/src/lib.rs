//! quarry-retrieve - Retrieval orchestration
//!
//! Drives the retrieval pipeline end to end: question analysis, hybrid
//! recall against the index engine with a relaxed retry, in-memory rerank
//! and pagination, plus the multi-query fan-out fused with reciprocal rank
//! fusion. Also hosts the tag pipelines that feed rank-feature boosts.

pub mod engine;
pub mod fusion;
pub mod tags;

#[cfg(test)]
pub(crate) mod testutil;

pub use engine::{RetrievalParams, Retriever};
pub use fusion::reciprocal_rank_fusion;
