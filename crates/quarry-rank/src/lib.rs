//! quarry-rank - Candidate pool scoring
//!
//! Re-scores a recalled candidate pool with a composite of weighted term
//! overlap and vector (or external model) similarity, plus additive
//! rank-feature boosts from tag vectors and pagerank.

pub mod engine;
pub mod features;

pub use engine::{rerank_heuristic, rerank_with_model, RankedScores};
pub use features::{chunk_vectors, rank_feature_scores, token_bags};
