//! Index schema field names shared with the ingestion pipeline.
//!
//! These are the physical field names of the chunk index. The suffix encodes
//! the mapping type: `_kwd` keyword, `_tks` coarse tokens, `_sm_` fine-grained
//! tokens, `_int`/`_flt` numeric, `_fea`/`_feas` rank features.

/// Parent document id.
pub const DOC_ID: &str = "doc_id";

/// Knowledge-base scope id.
pub const KB_ID: &str = "kb_id";

/// Document display name.
pub const DOC_NAME: &str = "docnm_kwd";

/// Title, coarse tokens.
pub const TITLE_TOKENS: &str = "title_tks";

/// Title, fine-grained tokens.
pub const TITLE_FINE_TOKENS: &str = "title_sm_tks";

/// Curated keywords attached to the chunk.
pub const IMPORTANT_KEYWORDS: &str = "important_kwd";

/// Curated keywords, tokenized.
pub const IMPORTANT_TOKENS: &str = "important_tks";

/// Question-style phrasings, tokenized.
pub const QUESTION_TOKENS: &str = "question_tks";

/// Question-style phrasings, keyword form.
pub const QUESTION_KEYWORDS: &str = "question_kwd";

/// Raw chunk text for display.
pub const CONTENT: &str = "content_with_weight";

/// Chunk text, coarse tokens.
pub const CONTENT_TOKENS: &str = "content_ltks";

/// Chunk text, fine-grained tokens.
pub const CONTENT_FINE_TOKENS: &str = "content_sm_ltks";

/// Page number(s) within the source document.
pub const PAGE_NUM: &str = "page_num_int";

/// Vertical position on the page.
pub const TOP: &str = "top_int";

/// Layout boxes: (page, left, right, top, bottom) tuples.
pub const POSITIONS: &str = "position_int";

/// Ingestion timestamp.
pub const CREATE_TIMESTAMP: &str = "create_timestamp_flt";

/// Associated image id, if any.
pub const IMAGE_ID: &str = "img_id";

/// Availability flag, range-filtered rather than equality-matched.
pub const AVAILABLE: &str = "available_int";

/// Precomputed authority score, added into composite relevance.
pub const PAGERANK: &str = "pagerank_fea";

/// Tag rank features: map tag -> weight.
pub const TAG_FEATURES: &str = "tag_feas";

/// Tag keyword field used for tag aggregations.
pub const TAG_KEYWORD: &str = "tag_kwd";

/// Dense vector field name for a given embedding dimension.
pub fn vector_field(dimension: usize) -> String {
    format!("q_{}_vec", dimension)
}

/// Index name for a tenant scope.
pub fn index_name(tenant_id: &str) -> String {
    tenant_id.to_string()
}

/// Source fields hydrated for retrieval results.
pub fn default_source_fields() -> Vec<String> {
    [
        DOC_NAME,
        CONTENT_TOKENS,
        KB_ID,
        IMAGE_ID,
        TITLE_TOKENS,
        IMPORTANT_KEYWORDS,
        POSITIONS,
        DOC_ID,
        PAGE_NUM,
        TOP,
        CREATE_TIMESTAMP,
        QUESTION_KEYWORDS,
        QUESTION_TOKENS,
        AVAILABLE,
        CONTENT,
        PAGERANK,
        TAG_FEATURES,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
