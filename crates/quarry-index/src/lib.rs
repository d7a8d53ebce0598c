//! quarry-index - Index engine integration
//!
//! Compiles abstract search requests into the engine's query DSL, executes
//! them over HTTP with timeout-aware retry, and normalizes responses into
//! the canonical result shape.

pub mod client;
pub mod response;
pub mod translate;

pub use client::ElasticSearcher;
pub use response::{parse_response, rewrite_highlight};
pub use translate::to_engine_query;
