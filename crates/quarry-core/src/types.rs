//! Core domain types for the retrieval engine.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A filter value: scalar, set of scalars, or range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Exact keyword match.
    Text(String),

    /// Match any of the given keywords.
    Texts(Vec<String>),

    /// Exact numeric match (range-interpreted for the availability field).
    Number(i64),

    /// Half-open numeric range.
    Range {
        gte: Option<f64>,
        lt: Option<f64>,
    },
}

/// Exact-match conditions applied before text/vector matching.
///
/// Always carries the knowledge-base scoping field; iteration order is
/// stable so compiled queries are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    conditions: BTreeMap<String, FilterValue>,
}

impl FilterSet {
    /// Create an empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a condition.
    pub fn insert(&mut self, field: impl Into<String>, value: FilterValue) {
        self.conditions.insert(field.into(), value);
    }

    /// Remove a condition, returning it if present.
    pub fn remove(&mut self, field: &str) -> Option<FilterValue> {
        self.conditions.remove(field)
    }

    /// Look up a condition.
    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.conditions.get(field)
    }

    /// Iterate conditions in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.conditions.iter()
    }

    /// Number of conditions.
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Full-text half of a hybrid query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMatch {
    /// Fields to search, each optionally boosted (`title_tks^10`).
    pub fields: Vec<String>,

    /// Weighted boolean query string in the engine's query syntax.
    pub query_string: String,

    /// Result window requested from the text match.
    pub top_n: usize,

    /// Fraction of should-clauses that must match, if constrained.
    pub min_should_match: Option<f32>,
}

/// Vector half of a hybrid query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatch {
    /// Vector field name (`q_{dim}_vec`).
    pub vector_field: String,

    /// Query embedding.
    pub vector: Vec<f32>,

    /// Number of nearest neighbors requested.
    pub top_n: usize,

    /// Candidate pool examined per shard.
    pub candidate_pool: usize,

    /// Similarity floor below which hits are dropped.
    pub min_similarity: f32,
}

/// How text and vector scores are combined at recall time.
///
/// Stores only the vector share; the text share is its complement, so the
/// two always sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    vector: f32,
}

impl FusionWeights {
    /// Build from the vector-side weight, clamped to [0, 1].
    pub fn from_vector_weight(vector: f32) -> Self {
        Self {
            vector: vector.clamp(0.0, 1.0),
        }
    }

    /// Weight applied to the vector score.
    pub fn vector(&self) -> f32 {
        self.vector
    }

    /// Weight applied to the text score.
    pub fn text(&self) -> f32 {
        1.0 - self.vector
    }
}

/// Fusion method for hybrid recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    WeightedSum,
}

/// Fusion specification for a hybrid query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionSpec {
    /// Combination method.
    pub method: FusionMethod,

    /// Result window of the fused list.
    pub top_n: usize,

    /// Complementary text/vector weights.
    pub weights: FusionWeights,
}

/// A match expression: text-only, vector-only, or hybrid.
///
/// The hybrid variant carries exactly one text and one dense half plus the
/// fusion weights, so an incomplete or re-ordered combination cannot be
/// constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchExpression {
    Text(TextMatch),
    Dense(DenseMatch),
    Hybrid {
        text: TextMatch,
        dense: DenseMatch,
        fusion: FusionSpec,
    },
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Ordered sort specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    fields: Vec<(String, SortDirection)>,
}

impl OrderSpec {
    /// Create an empty order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an ascending sort field.
    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), SortDirection::Asc));
        self
    }

    /// Append a descending sort field.
    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), SortDirection::Desc));
        self
    }

    /// Iterate (field, direction) pairs in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, SortDirection)> {
        self.fields.iter()
    }

    /// Whether no sort was requested.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One search call against the index engine. Built fresh per request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Exact-match pre-filters.
    pub filters: FilterSet,

    /// Relevance match, absent for filter-only browsing.
    pub match_expr: Option<MatchExpression>,

    /// Sort order for unscored results.
    pub order: OrderSpec,

    /// Result offset.
    pub offset: usize,

    /// Result limit.
    pub limit: usize,

    /// Source fields to hydrate per hit.
    pub select_fields: Vec<String>,

    /// Fields to highlight.
    pub highlight_fields: Vec<String>,

    /// Fields to aggregate term counts over.
    pub aggregation_fields: Vec<String>,

    /// Tag -> weight boosts applied as rank features.
    pub rank_features: Option<HashMap<String, f32>>,
}

/// Canonical engine response, normalized regardless of wire shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// Total matching chunks (may exceed the returned window).
    pub total: u64,

    /// Returned chunk ids, engine rank order.
    pub chunk_ids: Vec<String>,

    /// Requested fields per chunk id.
    pub fields: HashMap<String, HashMap<String, serde_json::Value>>,

    /// Highlight text per chunk id, where produced.
    pub highlights: HashMap<String, String>,

    /// Term-aggregation buckets (key, count), count descending.
    pub aggregations: Vec<(String, u64)>,

    /// Keywords used for the text match, for downstream highlighting.
    pub keywords: Vec<String>,

    /// Query embedding used for the dense match, empty for filter-only.
    pub query_vector: Vec<f32>,
}

/// A ranked chunk hydrated for the serving layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Chunk id in the index.
    pub chunk_id: String,

    /// Parent document id.
    pub doc_id: String,

    /// Document display name.
    pub doc_name: String,

    /// Knowledge-base scope.
    pub kb_id: String,

    /// Raw chunk text.
    pub content: String,

    /// Coarse-tokenized chunk text.
    pub content_tokens: String,

    /// Curated keywords.
    pub important_keywords: Vec<String>,

    /// Associated image id, empty if none.
    pub image_id: String,

    /// Composite relevance score.
    pub similarity: f32,

    /// Vector (or model) similarity component.
    pub vector_similarity: f32,

    /// Weighted term-overlap component.
    pub term_similarity: f32,

    /// Stored chunk embedding.
    pub vector: Vec<f32>,

    /// Layout boxes: (page, left, right, top, bottom).
    pub positions: Vec<Vec<i64>>,

    /// Highlighted snippet when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
}

/// Per-document grouping of a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocAggregation {
    /// Document display name.
    pub doc_name: String,

    /// Document id.
    pub doc_id: String,

    /// Chunks contributed by this document.
    pub count: u64,
}

/// Output of one retrieval call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Pre-rerank recall count from the underlying query.
    pub total: u64,

    /// Ranked, threshold-filtered chunks, at most one page.
    pub chunks: Vec<RetrievedChunk>,

    /// Per-document counts over the above-threshold set, count descending.
    pub doc_aggs: Vec<DocAggregation>,
}

impl Default for RetrievedChunk {
    fn default() -> Self {
        Self {
            chunk_id: String::new(),
            doc_id: String::new(),
            doc_name: String::new(),
            kb_id: String::new(),
            content: String::new(),
            content_tokens: String::new(),
            important_keywords: Vec::new(),
            image_id: String::new(),
            similarity: 0.0,
            vector_similarity: 0.0,
            term_similarity: 0.0,
            vector: Vec::new(),
            positions: Vec::new(),
            highlight: None,
        }
    }
}

/// Character offsets of a snippet within its source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationOffsets {
    pub start: i64,
    pub end: i64,
}

/// A citation record for "sources used" display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Source document id.
    pub document_id: String,

    /// First page the chunk appears on.
    pub page: i64,

    /// Cited chunk id.
    pub chunk_id: String,

    /// Relevance score the chunk was retrieved with.
    pub score: f32,

    /// Leading excerpt of the chunk text.
    pub snippet: String,

    /// Position of the excerpt in the source layout.
    pub offsets: CitationOffsets,
}
