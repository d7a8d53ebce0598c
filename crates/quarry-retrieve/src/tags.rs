//! Tag pipelines: corpus tag statistics, content tagging at ingestion time
//! and query tagging for rank-feature boosts at recall time.

use std::cmp::Ordering;
use std::collections::HashMap;

use quarry_core::error::Result;
use quarry_core::fields;
use quarry_core::types::{FilterSet, FilterValue, MatchExpression, SearchRequest};

use crate::engine::Retriever;

/// Additive smoothing mass applied to tag frequencies.
const TAG_SMOOTHING: u64 = 1000;

fn kb_filters(kb_ids: &[String]) -> FilterSet {
    let mut filters = FilterSet::new();
    filters.insert(fields::KB_ID, FilterValue::Texts(kb_ids.to_vec()));
    filters
}

/// Score aggregation buckets against corpus-wide tag portions.
///
/// A tag's smoothed share of the neighborhood is divided by its share of
/// the whole corpus, so tags that are rare globally but dense around the
/// subject score high. Unknown tags get a tiny default portion. Returns
/// the `topn` heaviest, score descending with ties on the tag name.
fn tag_scores(
    aggs: &[(String, u64)],
    portions: &HashMap<String, f32>,
    topn: usize,
) -> Vec<(String, f32)> {
    let cnt: u64 = aggs.iter().map(|(_, c)| c).sum();
    let mut scored: Vec<(String, f32)> = aggs
        .iter()
        .map(|(tag, c)| {
            let portion = portions.get(tag).copied().unwrap_or(0.0001).max(1e-6);
            let score =
                (0.1 * (*c as f32 + 1.0) / (cnt + TAG_SMOOTHING) as f32 / portion).round();
            (tag.clone(), score)
        })
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(topn);
    scored
}

impl Retriever {
    /// Tag vocabulary of the given knowledge bases with usage counts.
    pub async fn all_tags(
        &self,
        indexes: &[String],
        kb_ids: &[String],
    ) -> Result<Vec<(String, u64)>> {
        let request = SearchRequest {
            filters: kb_filters(kb_ids),
            aggregation_fields: vec![fields::TAG_KEYWORD.to_string()],
            ..Default::default()
        };
        let sres = self.searcher.search(indexes, &request).await?;
        Ok(sres.aggregations)
    }

    /// Each tag's smoothed share of all tag occurrences in the given
    /// knowledge bases: `(count + 1) / (total + S)`.
    pub async fn all_tags_in_portion(
        &self,
        indexes: &[String],
        kb_ids: &[String],
    ) -> Result<HashMap<String, f32>> {
        let tags = self.all_tags(indexes, kb_ids).await?;
        let total: u64 = tags.iter().map(|(_, c)| c).sum();
        Ok(tags
            .into_iter()
            .map(|(tag, c)| (tag, (c + 1) as f32 / (total + TAG_SMOOTHING) as f32))
            .collect())
    }

    /// Derive tag features for a chunk from already-tagged neighbors.
    ///
    /// Matches the chunk's tokens as a paragraph against the tag index and
    /// scores the aggregated tags; zero-scored tags are dropped. An empty
    /// map means no tagged neighbors were found.
    pub async fn tag_content(
        &self,
        indexes: &[String],
        kb_ids: &[String],
        content_tokens: &str,
        important_keywords: &[String],
        portions: &HashMap<String, f32>,
        topn: usize,
        keywords_topn: usize,
    ) -> Result<HashMap<String, f32>> {
        let text = self
            .analyzer
            .paragraph(content_tokens, important_keywords, keywords_topn);
        let request = SearchRequest {
            filters: kb_filters(kb_ids),
            match_expr: Some(MatchExpression::Text(text)),
            aggregation_fields: vec![fields::TAG_KEYWORD.to_string()],
            ..Default::default()
        };
        let sres = self.searcher.search(indexes, &request).await?;
        Ok(tag_scores(&sres.aggregations, portions, topn)
            .into_iter()
            .filter(|(_, s)| *s > 0.0)
            .collect())
    }

    /// Tag boosts for a question, applied as rank features at recall time.
    ///
    /// Every returned tag carries at least weight one so a matching chunk
    /// always gets some boost.
    pub async fn tag_query(
        &self,
        question: &str,
        indexes: &[String],
        kb_ids: &[String],
        portions: &HashMap<String, f32>,
        topn: usize,
    ) -> Result<HashMap<String, f32>> {
        let (text, _) = self.analyzer.question(question, 0.0);
        let Some(text) = text else {
            return Ok(HashMap::new());
        };
        let request = SearchRequest {
            filters: kb_filters(kb_ids),
            match_expr: Some(MatchExpression::Text(text)),
            aggregation_fields: vec![fields::TAG_KEYWORD.to_string()],
            ..Default::default()
        };
        let sres = self.searcher.search(indexes, &request).await?;
        Ok(tag_scores(&sres.aggregations, portions, topn)
            .into_iter()
            .map(|(tag, s)| (tag, s.max(1.0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedSearcher;
    use quarry_core::config::RetrievalConfig;
    use quarry_core::types::SearchResult;
    use quarry_embed::MockEmbedder;
    use std::sync::Arc;

    fn tag_result(aggs: Vec<(&str, u64)>) -> SearchResult {
        SearchResult {
            aggregations: aggs
                .into_iter()
                .map(|(t, c)| (t.to_string(), c))
                .collect(),
            ..Default::default()
        }
    }

    fn retriever(searcher: Arc<ScriptedSearcher>) -> Retriever {
        Retriever::new(
            searcher,
            Arc::new(MockEmbedder::with_dimension(8)),
            RetrievalConfig::default(),
        )
    }

    #[test]
    fn test_tag_scores_rewards_rare_tags() {
        let aggs = vec![
            ("transformers".to_string(), 9),
            ("mev".to_string(), 6),
        ];
        // transformers dominates the corpus, mev is unseen
        let portions: HashMap<String, f32> = [("transformers".to_string(), 0.5)].into();
        let scored = tag_scores(&aggs, &portions, 3);

        assert_eq!(scored[0].0, "mev");
        assert!(scored[0].1 > 0.0);
        let transformers = scored.iter().find(|(t, _)| t == "transformers").unwrap();
        assert_eq!(transformers.1, 0.0);
    }

    #[test]
    fn test_tag_scores_truncates() {
        let aggs: Vec<(String, u64)> = (0..10).map(|i| (format!("t{}", i), 5)).collect();
        let portions = HashMap::new();
        assert_eq!(tag_scores(&aggs, &portions, 3).len(), 3);
    }

    #[tokio::test]
    async fn test_all_tags_in_portion_smooths_counts() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![tag_result(vec![
            ("rust", 6),
            ("go", 2),
        ])]));
        let retriever = retriever(searcher.clone());
        let portions = retriever
            .all_tags_in_portion(&["idx1".to_string()], &["kb1".to_string()])
            .await
            .unwrap();

        assert!((portions["rust"] - 7.0 / 1008.0).abs() < 1e-6);
        assert!((portions["go"] - 3.0 / 1008.0).abs() < 1e-6);

        // aggregation-only request: no window, just the tag buckets
        let requests = searcher.requests();
        assert_eq!(requests[0].limit, 0);
        assert_eq!(requests[0].aggregation_fields, [fields::TAG_KEYWORD]);
    }

    #[tokio::test]
    async fn test_all_tags_in_portion_empty_corpus() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![tag_result(vec![])]));
        let retriever = retriever(searcher);
        let portions = retriever
            .all_tags_in_portion(&["idx1".to_string()], &["kb1".to_string()])
            .await
            .unwrap();
        assert!(portions.is_empty());
    }

    #[tokio::test]
    async fn test_tag_query_floors_at_one() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![tag_result(vec![
            ("retrieval", 40),
            ("cooking", 1),
        ])]));
        let retriever = retriever(searcher.clone());
        let portions: HashMap<String, f32> = [
            ("retrieval".to_string(), 0.001),
            ("cooking".to_string(), 0.4),
        ]
        .into();
        let boosts = retriever
            .tag_query(
                "hybrid retrieval ranking",
                &["idx1".to_string()],
                &["kb1".to_string()],
                &portions,
                3,
            )
            .await
            .unwrap();

        assert!(boosts["retrieval"] > 1.0);
        assert_eq!(boosts["cooking"], 1.0);

        let requests = searcher.requests();
        assert!(matches!(
            requests[0].match_expr,
            Some(MatchExpression::Text(_))
        ));
    }

    #[tokio::test]
    async fn test_tag_content_drops_zero_scores() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![tag_result(vec![
            ("common", 3),
            ("niche", 5),
        ])]));
        let retriever = retriever(searcher);
        let portions: HashMap<String, f32> = [("common".to_string(), 0.9)].into();
        let features = retriever
            .tag_content(
                &["idx1".to_string()],
                &["kb1".to_string()],
                "sparse dense fusion ranking",
                &[],
                &portions,
                5,
                30,
            )
            .await
            .unwrap();

        assert!(features.contains_key("niche"));
        assert!(!features.contains_key("common"));
    }
}
