//! Heuristic and model-assisted rerank over a recalled pool.

use std::collections::HashMap;

use ndarray::Array1;

use quarry_analyze::similarity::{hybrid_similarity, token_similarity};
use quarry_analyze::tokenize::join_tokens;
use quarry_core::error::{QuarryError, Result};
use quarry_core::traits::RerankModel;
use quarry_core::types::SearchResult;

use crate::features::{chunk_vectors, rank_feature_scores, token_bags};

/// Aligned score arrays for one candidate pool.
///
/// All three are always populated, even when only the composite drives the
/// final order, so callers can surface the components.
#[derive(Debug, Clone, Default)]
pub struct RankedScores {
    /// Composite relevance, the sort key.
    pub composite: Vec<f32>,

    /// Weighted term-overlap component.
    pub term: Vec<f32>,

    /// Vector (or external model) component.
    pub vector: Vec<f32>,
}

/// Heuristic composite: `tk × overlap + vt × cosine`, plus the additive
/// rank-feature boost.
pub fn rerank_heuristic(
    sres: &SearchResult,
    query_keywords: &[String],
    tk_weight: f32,
    vt_weight: f32,
    rank_features: Option<&HashMap<String, f32>>,
) -> RankedScores {
    if sres.chunk_ids.is_empty() {
        return RankedScores::default();
    }

    let vectors = chunk_vectors(sres);
    let bags = token_bags(sres, true);
    let (sim, term, vector) = hybrid_similarity(
        &sres.query_vector,
        &vectors,
        query_keywords,
        &bags,
        tk_weight,
        vt_weight,
    );

    let boost = rank_feature_scores(rank_features, sres);
    let composite = (Array1::from_vec(sim) + boost).to_vec();

    RankedScores {
        composite,
        term,
        vector,
    }
}

/// Model-assisted composite: the external model replaces the cosine term,
/// scoring the query against each candidate's flat token bag joined back
/// into text. The rank-feature boost joins the token term before weighting.
///
/// Model failures return the error untouched so the caller can fall back to
/// the heuristic path.
pub async fn rerank_with_model(
    model: &dyn RerankModel,
    query: &str,
    sres: &SearchResult,
    query_keywords: &[String],
    tk_weight: f32,
    vt_weight: f32,
    rank_features: Option<&HashMap<String, f32>>,
) -> Result<RankedScores> {
    if sres.chunk_ids.is_empty() {
        return Ok(RankedScores::default());
    }

    let bags = token_bags(sres, false);
    let term = token_similarity(query_keywords, &bags);

    let texts: Vec<String> = bags.iter().map(|bag| join_tokens(bag)).collect();
    let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let vector = model.score(query, &text_refs).await?;
    if vector.len() != bags.len() {
        return Err(QuarryError::rerank_unavailable(format!(
            "model returned {} scores for {} candidates",
            vector.len(),
            bags.len()
        )));
    }

    let boost = rank_feature_scores(rank_features, sres);
    let composite = ((Array1::from_vec(term.clone()) + boost) * tk_weight
        + Array1::from_vec(vector.clone()) * vt_weight)
        .to_vec();

    Ok(RankedScores {
        composite,
        term,
        vector,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::fields;
    use quarry_embed::MockRerankModel;
    use serde_json::json;

    fn capital_pool() -> SearchResult {
        let mut sres = SearchResult {
            total: 2,
            chunk_ids: vec!["paris".to_string(), "lyon".to_string()],
            query_vector: vec![1.0, 0.0, 0.0, 0.0],
            ..Default::default()
        };

        let mut paris = HashMap::new();
        paris.insert(
            fields::CONTENT_TOKENS.to_string(),
            json!("paris is the capital of france"),
        );
        paris.insert("q_4_vec".to_string(), json!([1.0, 0.0, 0.0, 0.0]));
        sres.fields.insert("paris".to_string(), paris);

        let mut lyon = HashMap::new();
        lyon.insert(
            fields::CONTENT_TOKENS.to_string(),
            json!("lyon is a city in france"),
        );
        lyon.insert("q_4_vec".to_string(), json!([0.0, 1.0, 0.0, 0.0]));
        sres.fields.insert("lyon".to_string(), lyon);

        sres
    }

    fn keywords() -> Vec<String> {
        vec!["capital".to_string(), "france".to_string()]
    }

    #[test]
    fn test_heuristic_ranks_exact_match_first() {
        let scores = rerank_heuristic(&capital_pool(), &keywords(), 0.3, 0.7, None);

        assert_eq!(scores.composite.len(), 2);
        assert!(scores.composite[0] > scores.composite[1]);
        // full term overlap and identical vector for the paris chunk
        assert!((scores.term[0] - 1.0).abs() < 1e-5);
        assert!((scores.vector[0] - 1.0).abs() < 1e-5);
        assert!((scores.composite[0] - 1.0).abs() < 1e-5);
        // lyon keeps only the "france" share of the term weight
        assert!(scores.term[1] < 0.5);
        assert!(scores.vector[1].abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_model_ranks_exact_match_first() {
        let model = MockRerankModel::new(vec![0.9, 0.2]);
        let scores = rerank_with_model(&model, "capital of France", &capital_pool(), &keywords(), 0.3, 0.7, None)
            .await
            .unwrap();

        assert!(scores.composite[0] > scores.composite[1]);
        // the model score is the vector component verbatim
        assert_eq!(scores.vector, vec![0.9, 0.2]);
        let expected = 0.3 * (scores.term[0] + 0.0) + 0.7 * 0.9;
        assert!((scores.composite[0] - expected).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_model_failure_surfaces() {
        let model = MockRerankModel::unavailable();
        let err = rerank_with_model(&model, "q", &capital_pool(), &keywords(), 0.3, 0.7, None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "RERANK_MODEL_UNAVAILABLE");
    }

    #[test]
    fn test_pagerank_added_to_composite() {
        let mut sres = capital_pool();
        sres.fields
            .get_mut("lyon")
            .unwrap()
            .insert(fields::PAGERANK.to_string(), json!("5"));

        let scores = rerank_heuristic(&sres, &keywords(), 0.3, 0.7, None);
        // the boost flips the order even though similarity still favors paris
        assert!(scores.composite[1] > scores.composite[0]);
        assert!(scores.composite[1] > 5.0);
    }

    #[test]
    fn test_empty_pool() {
        let sres = SearchResult::default();
        let scores = rerank_heuristic(&sres, &keywords(), 0.3, 0.7, None);
        assert!(scores.composite.is_empty());
    }
}
