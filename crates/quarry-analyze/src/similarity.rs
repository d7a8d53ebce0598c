//! Similarity primitives shared by ranking and citation attribution.
//!
//! All weights come from [`crate::weights::term_weights`] so every component
//! scores terms identically.

use std::collections::HashMap;

use crate::weights::term_weights;

const EPS: f32 = 1e-9;

/// Accumulated normalized weight per distinct term.
///
/// Repeated occurrences add up, which is how field boosts (title twice,
/// curated keywords five times, ...) are expressed in token bags.
pub fn weight_map(tokens: &[String]) -> HashMap<String, f32> {
    let mut map = HashMap::new();
    for (term, w) in term_weights(tokens) {
        *map.entry(term).or_insert(0.0) += w;
    }
    map
}

/// Share of query-term weight covered by a document bag.
///
/// Both sums carry a tiny epsilon, so an empty query degrades to 1.0 rather
/// than dividing by zero.
pub fn weighted_overlap(query: &HashMap<String, f32>, bag: &HashMap<String, f32>) -> f32 {
    let covered: f32 = query
        .iter()
        .filter(|(term, _)| bag.contains_key(*term))
        .map(|(_, w)| w)
        .sum();
    let total: f32 = query.values().sum();
    (covered + EPS) / (total + EPS)
}

/// Weighted term overlap of each bag against the query tokens.
pub fn token_similarity(query_tokens: &[String], bags: &[Vec<String>]) -> Vec<f32> {
    let query = weight_map(query_tokens);
    bags.iter()
        .map(|bag| weighted_overlap(&query, &weight_map(bag)))
        .collect()
}

/// Cosine similarity, 0.0 for mismatched lengths or zero magnitude.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Blend vector and term similarity for each candidate.
///
/// Returns `(composite, term, vector)` score arrays aligned with the
/// candidate order.
pub fn hybrid_similarity(
    query_vector: &[f32],
    vectors: &[Vec<f32>],
    query_tokens: &[String],
    bags: &[Vec<String>],
    tk_weight: f32,
    vt_weight: f32,
) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let term = token_similarity(query_tokens, bags);
    let vector: Vec<f32> = vectors.iter().map(|v| cosine(query_vector, v)).collect();
    let composite: Vec<f32> = term
        .iter()
        .zip(&vector)
        .map(|(t, v)| t * tk_weight + v * vt_weight)
        .collect();
    (composite, term, vector)
}
