//! Curated synonym expansion table.
//!
//! A small in-memory seed covering the abbreviations that show up in
//! research-paper questions. Lookups are lowercase exact matches; expansions
//! feed lower-boosted alternatives into the match expression, never the
//! primary clause.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static TABLE: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let entries: &[(&str, &[&str])] = &[
        ("llm", &["large language model"]),
        ("large language model", &["llm"]),
        ("rag", &["retrieval augmented generation"]),
        ("ml", &["machine learning"]),
        ("ai", &["artificial intelligence"]),
        ("artificial intelligence", &["ai"]),
        ("nn", &["neural network"]),
        ("nlp", &["natural language processing"]),
        ("ir", &["information retrieval"]),
        ("kb", &["knowledge base"]),
        ("db", &["database"]),
        ("gpu", &["graphics processing unit"]),
        ("rl", &["reinforcement learning"]),
        ("cnn", &["convolutional neural network"]),
        ("rnn", &["recurrent neural network"]),
        ("vit", &["vision transformer"]),
        ("ocr", &["optical character recognition"]),
        ("sota", &["state of the art"]),
        ("人工智能", &["ai"]),
        ("大模型", &["大语言模型"]),
        ("知识库", &["knowledge base"]),
    ];
    entries.iter().copied().collect()
});

/// Expansion terms for a term, empty when none are known.
pub fn lookup(term: &str) -> Vec<String> {
    let key = term.trim().to_lowercase();
    TABLE
        .get(key.as_str())
        .map(|v| v.iter().map(|s| s.to_string()).collect())
        .unwrap_or_default()
}
