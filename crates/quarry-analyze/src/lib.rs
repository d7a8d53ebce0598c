//! quarry-analyze - Question analysis for the retrieval engine
//!
//! Turns free-form questions into weighted boolean match expressions plus a
//! keyword list, and hosts the similarity primitives shared by ranking and
//! citation attribution. Everything here is pure and deterministic: no IO,
//! no clocks, no randomness.

pub mod query;
pub mod similarity;
pub mod stopwords;
pub mod synonyms;
pub mod tokenize;
pub mod weights;

pub use query::QueryAnalyzer;
pub use similarity::{cosine, hybrid_similarity, token_similarity, weight_map, weighted_overlap};
pub use stopwords::strip_stopwords;
pub use tokenize::{fine_grained_tokenize, is_cjk_char, join_tokens, normalize_width, tokenize};
pub use weights::term_weights;
