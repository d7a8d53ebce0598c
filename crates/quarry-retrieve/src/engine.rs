//! Retrieval pipeline: analysis, hybrid recall, rerank, pagination.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use quarry_analyze::query::QueryAnalyzer;
use quarry_analyze::tokenize::fine_grained_tokenize;
use quarry_core::config::{RetrievalConfig, RetrievalStrategy};
use quarry_core::error::{QuarryError, Result};
use quarry_core::fields;
use quarry_core::traits::{Embedder, IndexSearcher, RerankModel, SubQueryGenerator};
use quarry_core::types::{
    DenseMatch, DocAggregation, FilterSet, FilterValue, FusionMethod, FusionSpec, FusionWeights,
    MatchExpression, OrderSpec, RetrievalResult, RetrievedChunk, SearchRequest, SearchResult,
};
use quarry_index::rewrite_highlight;
use quarry_rank::{chunk_vectors, rerank_heuristic, rerank_with_model, RankedScores};

use crate::fusion::reciprocal_rank_fusion;

/// Vector share of the recall-time fusion; the rerank re-weights afterwards
/// with the caller's vector weight.
const RECALL_VECTOR_WEIGHT: f32 = 0.95;

/// Widened-pool multiplier for the rerank tier.
const RECALL_WIDENING: usize = 3;

/// Batch size for index scans in [`Retriever::chunk_list`].
const LIST_BATCH: usize = 128;

/// Parameters for one retrieval call.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Free-form question; empty means filter-only browsing.
    pub question: String,

    /// Physical index names to search.
    pub indexes: Vec<String>,

    /// Knowledge-base scope.
    pub kb_ids: Vec<String>,

    /// Restrict to these documents, if set.
    pub doc_ids: Option<Vec<String>>,

    /// 1-based result page.
    pub page: usize,

    /// Chunks per page.
    pub page_size: usize,

    /// Composite score floor for the rerank tier.
    pub similarity_threshold: f32,

    /// Vector share of the rerank composite.
    pub vector_weight: f32,

    /// Vector-search candidate count at recall time.
    pub candidate_pool: usize,

    /// Whether to compute per-document aggregations.
    pub aggs: bool,

    /// Whether to build highlighted snippets.
    pub highlight: bool,

    /// Whether browsing results follow document layout order.
    pub sort_by_position: bool,

    /// Tag -> weight boosts applied as rank features.
    pub rank_features: Option<HashMap<String, f32>>,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            question: String::new(),
            indexes: Vec::new(),
            kb_ids: Vec::new(),
            doc_ids: None,
            page: 1,
            page_size: 10,
            similarity_threshold: 0.1,
            vector_weight: 0.3,
            candidate_pool: 1024,
            aggs: true,
            highlight: false,
            sort_by_position: false,
            rank_features: None,
        }
    }
}

/// Drives the retrieval pipeline against pluggable collaborators.
///
/// The searcher and embedder are required; a rerank model upgrades the
/// precision tier and a sub-query generator enables multi-query retrieval.
pub struct Retriever {
    pub(crate) analyzer: QueryAnalyzer,
    pub(crate) searcher: Arc<dyn IndexSearcher>,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) rerank_model: Option<Arc<dyn RerankModel>>,
    pub(crate) subquery: Option<Arc<dyn SubQueryGenerator>>,
    pub(crate) config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        searcher: Arc<dyn IndexSearcher>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            analyzer: QueryAnalyzer::new(),
            searcher,
            embedder,
            rerank_model: None,
            subquery: None,
            config,
        }
    }

    /// Attach a cross-encoder used by the precision tier.
    pub fn with_rerank_model(mut self, model: Arc<dyn RerankModel>) -> Self {
        self.rerank_model = Some(model);
        self
    }

    /// Attach a paraphrase generator for multi-query retrieval.
    pub fn with_subquery_generator(mut self, generator: Arc<dyn SubQueryGenerator>) -> Self {
        self.subquery = Some(generator);
        self
    }

    /// One retrieval call: analyze, recall, rerank, paginate.
    ///
    /// Pages up to `rerank_page_limit` widen the recall window and rerank in
    /// memory; deeper pages push pagination down to the engine and carry
    /// unit scores. A first attempt with zero recall is retried once with
    /// relaxed match constraints and without the document filter. Questions
    /// that strip to nothing degrade to filter-only browsing.
    pub async fn retrieval(&self, params: &RetrievalParams) -> Result<RetrievalResult> {
        if params.indexes.is_empty() {
            return Err(QuarryError::invalid_argument("no indexes to search"));
        }
        let started = Instant::now();

        let (text_match, keywords) = if params.question.trim().is_empty() {
            (None, Vec::new())
        } else {
            self.analyzer
                .question(&params.question, self.config.min_should_match)
        };
        let Some(text) = text_match else {
            return self.browse(params, started).await;
        };

        let query_vector = self.embedder.embed_query(&params.question).await?;
        let dense = DenseMatch {
            vector_field: fields::vector_field(query_vector.len()),
            vector: query_vector.clone(),
            top_n: params.candidate_pool,
            candidate_pool: params.candidate_pool * 2,
            min_similarity: self.config.dense_similarity,
        };
        let fusion = FusionSpec {
            method: FusionMethod::WeightedSum,
            top_n: params.candidate_pool,
            weights: FusionWeights::from_vector_weight(RECALL_VECTOR_WEIGHT),
        };

        let precision = params.page <= self.config.rerank_page_limit;
        let (offset, limit) = if precision {
            (
                0,
                (params.page_size * RECALL_WIDENING).max(self.config.recall_floor),
            )
        } else {
            ((params.page - 1) * params.page_size, params.page_size)
        };

        let mut select_fields = fields::default_source_fields();
        select_fields.push(dense.vector_field.clone());

        let mut request = SearchRequest {
            filters: self.scope_filters(params, true),
            match_expr: Some(MatchExpression::Hybrid {
                text,
                dense: dense.clone(),
                fusion: fusion.clone(),
            }),
            order: OrderSpec::new(),
            offset,
            limit,
            select_fields,
            highlight_fields: if params.highlight {
                vec![
                    fields::CONTENT_TOKENS.to_string(),
                    fields::TITLE_TOKENS.to_string(),
                ]
            } else {
                Vec::new()
            },
            aggregation_fields: if params.aggs {
                vec![fields::DOC_NAME.to_string()]
            } else {
                Vec::new()
            },
            rank_features: params.rank_features.clone(),
        };

        let mut sres = self.searcher.search(&params.indexes, &request).await?;
        if sres.total == 0 {
            debug!("zero recall, retrying with relaxed constraints");
            let (relaxed, _) = self
                .analyzer
                .question(&params.question, self.config.relaxed_min_should_match);
            if let Some(relaxed) = relaxed {
                let mut relaxed_dense = dense;
                relaxed_dense.min_similarity = self.config.relaxed_dense_similarity;
                request.filters = self.scope_filters(params, false);
                request.match_expr = Some(MatchExpression::Hybrid {
                    text: relaxed,
                    dense: relaxed_dense,
                    fusion,
                });
                sres = self.searcher.search(&params.indexes, &request).await?;
            }
        }

        sres.query_vector = query_vector;
        sres.keywords = augment_keywords(&keywords);

        let n = sres.chunk_ids.len();
        let tk_weight = 1.0 - params.vector_weight;
        let scores = if precision {
            self.precision_scores(params, &sres, &keywords, tk_weight)
                .await
        } else {
            RankedScores {
                composite: vec![1.0; n],
                term: vec![1.0; n],
                vector: vec![1.0; n],
            }
        };

        let idx: Vec<usize> = if precision {
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| {
                scores.composite[b]
                    .partial_cmp(&scores.composite[a])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            order
                .into_iter()
                .skip((params.page - 1) * params.page_size)
                .collect()
        } else {
            (0..n).collect()
        };

        let threshold = precision.then_some(params.similarity_threshold);
        let result = self.assemble(&sres, &idx, &scores, threshold, params);
        info!(
            total = result.total,
            returned = result.chunks.len(),
            page = params.page,
            precision,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "retrieval complete"
        );
        Ok(result)
    }

    /// Serving-layer entry point: resolves tenant scopes to index names and
    /// dispatches on the configured strategy.
    pub async fn retrieve(
        &self,
        question: &str,
        tenant_ids: &[String],
        kb_ids: &[String],
        top_k: usize,
        doc_ids: Option<Vec<String>>,
    ) -> Result<RetrievalResult> {
        let indexes: Vec<String> = tenant_ids.iter().map(|t| fields::index_name(t)).collect();
        match self.config.strategy {
            RetrievalStrategy::Basic => {
                self.single_query(question, &indexes, kb_ids, top_k, doc_ids)
                    .await
            }
            RetrievalStrategy::MultiQuery => {
                self.multi_query(question, &indexes, kb_ids, top_k, doc_ids)
                    .await
            }
        }
    }

    /// Scan every chunk of one document in index order.
    pub async fn chunk_list(
        &self,
        doc_id: &str,
        indexes: &[String],
        kb_ids: &[String],
        max_count: usize,
        offset: usize,
        select_fields: &[String],
    ) -> Result<Vec<HashMap<String, Value>>> {
        let mut rows = Vec::new();
        let mut from = offset;
        while from < max_count {
            let mut filters = FilterSet::new();
            filters.insert(fields::KB_ID, FilterValue::Texts(kb_ids.to_vec()));
            filters.insert(fields::DOC_ID, FilterValue::Text(doc_id.to_string()));
            let request = SearchRequest {
                filters,
                offset: from,
                limit: LIST_BATCH,
                select_fields: select_fields.to_vec(),
                ..Default::default()
            };
            let sres = self.searcher.search(indexes, &request).await?;
            let batch = sres.chunk_ids.len();
            for id in &sres.chunk_ids {
                let mut row = sres.fields.get(id).cloned().unwrap_or_default();
                row.insert("id".to_string(), Value::String(id.clone()));
                rows.push(row);
            }
            if batch < LIST_BATCH {
                break;
            }
            from += LIST_BATCH;
        }
        Ok(rows)
    }

    async fn single_query(
        &self,
        question: &str,
        indexes: &[String],
        kb_ids: &[String],
        top_k: usize,
        doc_ids: Option<Vec<String>>,
    ) -> Result<RetrievalResult> {
        let params = RetrievalParams {
            question: question.to_string(),
            indexes: indexes.to_vec(),
            kb_ids: kb_ids.to_vec(),
            doc_ids,
            page_size: top_k,
            similarity_threshold: self.config.similarity_threshold,
            vector_weight: self.config.vector_weight,
            candidate_pool: self.config.candidate_pool,
            ..Default::default()
        };
        self.retrieval(&params).await
    }

    /// Paraphrase fan-out fused with reciprocal rank fusion.
    ///
    /// Degrades to the single-query path when no usable paraphrases come
    /// back, and falls back to it when fusion produces nothing.
    async fn multi_query(
        &self,
        question: &str,
        indexes: &[String],
        kb_ids: &[String],
        top_k: usize,
        doc_ids: Option<Vec<String>>,
    ) -> Result<RetrievalResult> {
        let n = self.config.multi_query_n.max(2);
        let paraphrases = match &self.subquery {
            Some(generator) => match generator.expand(question, n).await {
                Ok(rewrites) => rewrites,
                Err(e) => {
                    warn!(error = %e, "sub-query expansion failed, using the question alone");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let queries = dedup_queries(question, &paraphrases, n);
        if queries.len() <= 1 {
            return self
                .single_query(question, indexes, kb_ids, top_k, doc_ids)
                .await;
        }
        debug!(queries = queries.len(), "multi-query fan-out");

        let pool_size = (top_k * 2).max(10);
        let param_list: Vec<RetrievalParams> = queries
            .iter()
            .map(|q| RetrievalParams {
                question: q.clone(),
                indexes: indexes.to_vec(),
                kb_ids: kb_ids.to_vec(),
                doc_ids: doc_ids.clone(),
                page_size: pool_size,
                similarity_threshold: self.config.similarity_threshold,
                vector_weight: self.config.vector_weight,
                candidate_pool: self.config.candidate_pool,
                aggs: false,
                ..Default::default()
            })
            .collect();

        let results = join_all(param_list.iter().map(|p| self.retrieval(p))).await;
        let mut lists = Vec::with_capacity(results.len());
        let mut total = 0u64;
        for result in results {
            let result = result?;
            total = total.max(result.total);
            lists.push(result.chunks);
        }

        let rank_cap = (top_k * 3).max(30);
        let fused = reciprocal_rank_fusion(lists, rank_cap, self.config.rrf_k, top_k);
        if fused.is_empty() {
            warn!("fusion produced nothing, falling back to single-query retrieval");
            return self
                .single_query(question, indexes, kb_ids, top_k, doc_ids)
                .await;
        }

        let doc_aggs = doc_aggregations(&fused);
        info!(
            queries = queries.len(),
            returned = fused.len(),
            "multi-query retrieval complete"
        );
        Ok(RetrievalResult {
            total,
            chunks: fused,
            doc_aggs,
        })
    }

    /// Filter-only browsing for empty or fully-stripped questions.
    async fn browse(&self, params: &RetrievalParams, started: Instant) -> Result<RetrievalResult> {
        let order = if params.sort_by_position {
            OrderSpec::new()
                .asc(fields::PAGE_NUM)
                .asc(fields::TOP)
                .desc(fields::CREATE_TIMESTAMP)
        } else {
            OrderSpec::new()
        };
        let request = SearchRequest {
            filters: self.scope_filters(params, true),
            order,
            offset: (params.page - 1) * params.page_size,
            limit: params.page_size,
            select_fields: fields::default_source_fields(),
            aggregation_fields: if params.aggs {
                vec![fields::DOC_NAME.to_string()]
            } else {
                Vec::new()
            },
            ..Default::default()
        };
        let sres = self.searcher.search(&params.indexes, &request).await?;

        let n = sres.chunk_ids.len();
        let idx: Vec<usize> = (0..n).collect();
        let scores = RankedScores {
            composite: vec![0.0; n],
            term: vec![0.0; n],
            vector: vec![0.0; n],
        };
        let result = self.assemble(&sres, &idx, &scores, None, params);
        info!(
            total = result.total,
            returned = result.chunks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "filter-only retrieval complete"
        );
        Ok(result)
    }

    /// Precision-tier scores: the attached model when one is available and
    /// something was recalled, the heuristic otherwise or on model failure.
    async fn precision_scores(
        &self,
        params: &RetrievalParams,
        sres: &SearchResult,
        keywords: &[String],
        tk_weight: f32,
    ) -> RankedScores {
        if let Some(model) = &self.rerank_model {
            if sres.total > 0 {
                match rerank_with_model(
                    model.as_ref(),
                    &params.question,
                    sres,
                    keywords,
                    tk_weight,
                    params.vector_weight,
                    params.rank_features.as_ref(),
                )
                .await
                {
                    Ok(scores) => return scores,
                    Err(e) => {
                        warn!(error = %e, "rerank model failed, falling back to heuristic scores")
                    }
                }
            }
        }
        rerank_heuristic(
            sres,
            keywords,
            tk_weight,
            params.vector_weight,
            params.rank_features.as_ref(),
        )
    }

    fn scope_filters(&self, params: &RetrievalParams, with_doc_ids: bool) -> FilterSet {
        let mut filters = FilterSet::new();
        filters.insert(fields::KB_ID, FilterValue::Texts(params.kb_ids.clone()));
        filters.insert(fields::AVAILABLE, FilterValue::Number(1));
        if with_doc_ids {
            if let Some(doc_ids) = &params.doc_ids {
                if !doc_ids.is_empty() {
                    filters.insert(fields::DOC_ID, FilterValue::Texts(doc_ids.clone()));
                }
            }
        }
        filters
    }

    /// Hydrate ranked hits into one result page.
    ///
    /// Walks `idx` in score order, stops at the first below-threshold hit,
    /// and once the page is full keeps counting above-threshold chunks into
    /// the document aggregation when aggregations were requested.
    fn assemble(
        &self,
        sres: &SearchResult,
        idx: &[usize],
        scores: &RankedScores,
        threshold: Option<f32>,
        params: &RetrievalParams,
    ) -> RetrievalResult {
        let vectors = if sres.query_vector.is_empty() {
            Vec::new()
        } else {
            chunk_vectors(sres)
        };
        let mut chunks: Vec<RetrievedChunk> = Vec::new();
        let mut counts: HashMap<String, (String, u64)> = HashMap::new();

        for &i in idx {
            if let Some(threshold) = threshold {
                if scores.composite[i] < threshold {
                    break;
                }
            }
            let id = &sres.chunk_ids[i];
            let chunk_fields = sres.fields.get(id);
            let doc_name = scalar_text(chunk_fields, fields::DOC_NAME);
            let doc_id = scalar_text(chunk_fields, fields::DOC_ID);

            if chunks.len() >= params.page_size {
                if params.aggs {
                    let entry = counts.entry(doc_name).or_insert((doc_id, 0));
                    entry.1 += 1;
                    continue;
                }
                break;
            }

            let content = scalar_text(chunk_fields, fields::CONTENT);
            let highlight = if params.highlight {
                Some(match sres.highlights.get(id) {
                    Some(raw) => rewrite_highlight(raw, &content, &sres.keywords),
                    None => content.clone(),
                })
            } else {
                None
            };

            chunks.push(RetrievedChunk {
                chunk_id: id.clone(),
                doc_id: doc_id.clone(),
                doc_name: doc_name.clone(),
                kb_id: scalar_text(chunk_fields, fields::KB_ID),
                content,
                content_tokens: scalar_text(chunk_fields, fields::CONTENT_TOKENS),
                important_keywords: string_list(chunk_fields, fields::IMPORTANT_KEYWORDS),
                image_id: scalar_text(chunk_fields, fields::IMAGE_ID),
                similarity: scores.composite[i],
                vector_similarity: scores.vector[i],
                term_similarity: scores.term[i],
                vector: vectors.get(i).cloned().unwrap_or_default(),
                positions: layout_positions(chunk_fields),
                highlight,
            });
            let entry = counts.entry(doc_name).or_insert((doc_id, 0));
            entry.1 += 1;
        }

        let mut doc_aggs: Vec<DocAggregation> = counts
            .into_iter()
            .map(|(doc_name, (doc_id, count))| DocAggregation {
                doc_name,
                doc_id,
                count,
            })
            .collect();
        doc_aggs.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.doc_name.cmp(&b.doc_name))
        });

        RetrievalResult {
            total: sres.total,
            chunks,
            doc_aggs,
        }
    }
}

/// Per-document counts over a fused chunk list, count descending.
fn doc_aggregations(chunks: &[RetrievedChunk]) -> Vec<DocAggregation> {
    let mut counts: HashMap<String, (String, u64)> = HashMap::new();
    for chunk in chunks {
        let entry = counts
            .entry(chunk.doc_name.clone())
            .or_insert((chunk.doc_id.clone(), 0));
        entry.1 += 1;
    }
    let mut aggs: Vec<DocAggregation> = counts
        .into_iter()
        .map(|(doc_name, (doc_id, count))| DocAggregation {
            doc_name,
            doc_id,
            count,
        })
        .collect();
    aggs.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.doc_name.cmp(&b.doc_name))
    });
    aggs
}

/// The question plus paraphrases, deduplicated case-insensitively, with
/// fragments under three characters dropped, capped at `n`.
fn dedup_queries(question: &str, paraphrases: &[String], n: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for q in std::iter::once(question).chain(paraphrases.iter().map(String::as_str)) {
        let q = q.trim();
        if q.chars().count() < 3 || !seen.insert(q.to_lowercase()) {
            continue;
        }
        out.push(q.to_string());
        if out.len() >= n {
            break;
        }
    }
    if out.is_empty() {
        out.push(question.trim().to_string());
    }
    out
}

/// Keywords plus their fine-grained splits, for highlighting.
fn augment_keywords(keywords: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out: Vec<String> = Vec::new();
    for k in keywords {
        if seen.insert(k.clone()) {
            out.push(k.clone());
        }
        for sub in fine_grained_tokenize(k) {
            if sub.chars().count() >= 2 && seen.insert(sub.clone()) {
                out.push(sub);
            }
        }
    }
    out
}

fn scalar_text(chunk: Option<&HashMap<String, Value>>, name: &str) -> String {
    match chunk.and_then(|f| f.get(name)) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .next()
            .map(str::to_string)
            .unwrap_or_default(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn string_list(chunk: Option<&HashMap<String, Value>>, name: &str) -> Vec<String> {
    match chunk.and_then(|f| f.get(name)) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn layout_positions(chunk: Option<&HashMap<String, Value>>) -> Vec<Vec<i64>> {
    match chunk.and_then(|f| f.get(fields::POSITIONS)) {
        Some(Value::Array(rows)) => rows
            .iter()
            .filter_map(Value::as_array)
            .map(|row| row.iter().filter_map(Value::as_i64).collect())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{pool, ScriptedSearcher};
    use quarry_embed::{MockEmbedder, MockRerankModel, MockSubQueryGenerator};

    fn retriever(searcher: Arc<ScriptedSearcher>) -> Retriever {
        Retriever::new(
            searcher,
            Arc::new(MockEmbedder::with_dimension(8)),
            RetrievalConfig::default(),
        )
    }

    // Zero chunk vectors keep the cosine component at zero, so the
    // composite is driven by term overlap alone and stays predictable.
    fn ranked_pool() -> SearchResult {
        pool(&[
            ("c1", "alpha", "quantum computing hardware", vec![0.0; 8]),
            ("c2", "alpha", "quantum computing", vec![0.0; 8]),
            ("c3", "beta", "computing", vec![0.0; 8]),
            ("c4", "beta", "quantum", vec![0.0; 8]),
            ("c5", "gamma", "unrelated text noise", vec![0.0; 8]),
            ("c6", "gamma", "entirely different topic", vec![0.0; 8]),
        ])
    }

    fn base_params() -> RetrievalParams {
        RetrievalParams {
            question: "quantum computing hardware".to_string(),
            indexes: vec!["idx1".to_string()],
            kb_ids: vec!["kb1".to_string()],
            page_size: 2,
            ..Default::default()
        }
    }

    fn ids(result: &RetrievalResult) -> Vec<&str> {
        result.chunks.iter().map(|c| c.chunk_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_precision_tier_ranks_and_thresholds() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![ranked_pool()]));
        let retriever = retriever(searcher.clone());
        let result = retriever.retrieval(&base_params()).await.unwrap();

        assert_eq!(result.total, 6);
        assert_eq!(ids(&result), ["c1", "c2"]);
        assert!(result.chunks[0].similarity > result.chunks[1].similarity);
        assert!(result.chunks[1].similarity >= 0.1);

        // above-threshold chunks past the page still count toward doc aggs
        let agg: Vec<_> = result
            .doc_aggs
            .iter()
            .map(|a| (a.doc_name.as_str(), a.count))
            .collect();
        assert_eq!(agg, [("alpha.pdf", 2), ("beta.pdf", 2)]);

        // the rerank tier widens the recall window instead of paginating
        let requests = searcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].offset, 0);
        assert_eq!(requests[0].limit, 128);
    }

    #[tokio::test]
    async fn test_precision_pages_are_disjoint() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![ranked_pool()]));
        let retriever = retriever(searcher);

        let mut params = base_params();
        let page1 = retriever.retrieval(&params).await.unwrap();
        params.page = 2;
        let page2 = retriever.retrieval(&params).await.unwrap();
        params.page = 3;
        let page3 = retriever.retrieval(&params).await.unwrap();

        assert_eq!(ids(&page1), ["c1", "c2"]);
        assert_eq!(ids(&page2), ["c3", "c4"]);
        // page 3 starts below the similarity threshold
        assert!(page3.chunks.is_empty());
        assert_eq!(page3.total, 6);
    }

    #[tokio::test]
    async fn test_zero_recall_relaxes_and_drops_doc_filter() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![
            SearchResult::default(),
            ranked_pool(),
        ]));
        let retriever = retriever(searcher.clone());
        let mut params = base_params();
        params.doc_ids = Some(vec!["alpha".to_string()]);
        let result = retriever.retrieval(&params).await.unwrap();
        assert!(!result.chunks.is_empty());

        let requests = searcher.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].filters.get(fields::DOC_ID).is_some());
        assert!(requests[1].filters.get(fields::DOC_ID).is_none());

        let dense_floor = |req: &SearchRequest| match req.match_expr.as_ref().unwrap() {
            MatchExpression::Hybrid { dense, .. } => dense.min_similarity,
            _ => panic!("expected hybrid match"),
        };
        assert!((dense_floor(&requests[0]) - 0.1).abs() < 1e-6);
        assert!((dense_floor(&requests[1]) - 0.17).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_throughput_tier_pushes_pagination_down() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![pool(&[
            ("c7", "gamma", "unrelated text noise", vec![0.0; 8]),
            ("c8", "gamma", "entirely different topic", vec![0.0; 8]),
        ])]));
        let retriever = retriever(searcher.clone());
        let mut params = base_params();
        params.page = 4;
        let result = retriever.retrieval(&params).await.unwrap();

        let requests = searcher.requests();
        assert_eq!(requests[0].offset, 6);
        assert_eq!(requests[0].limit, 2);
        // deep pages are served engine-ordered with unit scores
        assert_eq!(ids(&result), ["c7", "c8"]);
        assert!(result
            .chunks
            .iter()
            .all(|c| (c.similarity - 1.0).abs() < f32::EPSILON));
    }

    #[tokio::test]
    async fn test_empty_question_browses_unscored() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![ranked_pool()]));
        let retriever = retriever(searcher.clone());
        let mut params = base_params();
        params.question = String::new();
        params.sort_by_position = true;
        let result = retriever.retrieval(&params).await.unwrap();

        assert_eq!(result.chunks.len(), 2);
        assert!(result.chunks.iter().all(|c| c.similarity == 0.0));

        let requests = searcher.requests();
        assert!(requests[0].match_expr.is_none());
        assert_eq!(requests[0].offset, 0);
        assert_eq!(requests[0].limit, 2);
        let order: Vec<_> = requests[0].order.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(
            order,
            [fields::PAGE_NUM, fields::TOP, fields::CREATE_TIMESTAMP]
        );
    }

    #[tokio::test]
    async fn test_symbol_question_degrades_to_browse() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![ranked_pool()]));
        let retriever = retriever(searcher.clone());
        let mut params = base_params();
        params.question = "??? !!!".to_string();
        let result = retriever.retrieval(&params).await.unwrap();

        assert_eq!(result.chunks.len(), 2);
        assert!(searcher.requests()[0].match_expr.is_none());
    }

    #[tokio::test]
    async fn test_rerank_model_scores_drive_the_order() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![ranked_pool()]));
        let model = MockRerankModel::new(vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.9]);
        let retriever = retriever(searcher).with_rerank_model(Arc::new(model));

        let mut params = base_params();
        params.vector_weight = 0.9;
        let result = retriever.retrieval(&params).await.unwrap();
        assert_eq!(ids(&result), ["c5", "c6"]);
        assert!((result.chunks[0].vector_similarity - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_rerank_model_failure_falls_back_to_heuristic() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![ranked_pool()]));
        let retriever =
            retriever(searcher).with_rerank_model(Arc::new(MockRerankModel::unavailable()));
        let result = retriever.retrieval(&base_params()).await.unwrap();
        assert_eq!(ids(&result), ["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_multi_query_empty_expansion_matches_single() {
        let tenants = vec!["t1".to_string()];
        let kbs = vec!["kb1".to_string()];

        let mut config = RetrievalConfig::default();
        config.strategy = RetrievalStrategy::MultiQuery;
        let searcher = Arc::new(ScriptedSearcher::new(vec![ranked_pool()]));
        let multi = Retriever::new(
            searcher,
            Arc::new(MockEmbedder::with_dimension(8)),
            config,
        )
        .with_subquery_generator(Arc::new(MockSubQueryGenerator::new(vec![])));
        let fused = multi
            .retrieve("quantum computing hardware", &tenants, &kbs, 2, None)
            .await
            .unwrap();

        let searcher = Arc::new(ScriptedSearcher::new(vec![ranked_pool()]));
        let basic = retriever(searcher);
        let expected = basic
            .retrieve("quantum computing hardware", &tenants, &kbs, 2, None)
            .await
            .unwrap();

        assert_eq!(ids(&fused), ids(&expected));
        for (a, b) in fused.chunks.iter().zip(&expected.chunks) {
            assert!((a.similarity - b.similarity).abs() < f32::EPSILON);
        }
    }

    #[tokio::test]
    async fn test_multi_query_fuses_with_reciprocal_ranks() {
        let mut config = RetrievalConfig::default();
        config.strategy = RetrievalStrategy::MultiQuery;
        let searcher = Arc::new(ScriptedSearcher::new(vec![ranked_pool()]));
        let retriever = Retriever::new(
            searcher.clone(),
            Arc::new(MockEmbedder::with_dimension(8)),
            config,
        )
        .with_subquery_generator(Arc::new(MockSubQueryGenerator::new(vec![
            "quantum machines".to_string(),
        ])));

        let result = retriever
            .retrieve(
                "quantum computing hardware",
                &["t1".to_string()],
                &["kb1".to_string()],
                2,
                None,
            )
            .await
            .unwrap();

        // both sub-queries rank c1 first, so it accumulates 2/(k+1)
        assert_eq!(ids(&result), ["c1", "c2"]);
        assert!((result.chunks[0].similarity - 2.0 / 61.0).abs() < 1e-6);
        assert!(result.chunks[0].similarity > result.chunks[1].similarity);
        assert_eq!(result.total, 6);
        assert!(!result.doc_aggs.is_empty());

        // one recall request per deduplicated query
        assert_eq!(searcher.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_chunk_list_stops_on_short_batch() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![pool(&[
            ("c1", "alpha", "first chunk", vec![]),
            ("c2", "alpha", "second chunk", vec![]),
        ])]));
        let retriever = retriever(searcher.clone());
        let rows = retriever
            .chunk_list(
                "alpha",
                &["idx1".to_string()],
                &["kb1".to_string()],
                500,
                0,
                &[fields::CONTENT_TOKENS.to_string()],
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&Value::String("c1".to_string())));

        let requests = searcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].limit, 128);
        assert!(requests[0].filters.get(fields::DOC_ID).is_some());
    }

    #[tokio::test]
    async fn test_no_indexes_is_an_error() {
        let searcher = Arc::new(ScriptedSearcher::new(vec![]));
        let retriever = retriever(searcher);
        let mut params = base_params();
        params.indexes.clear();
        let err = retriever.retrieval(&params).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_dedup_queries() {
        let queries = dedup_queries(
            "original question",
            &[
                "Original Question".to_string(),
                "ok".to_string(),
                "rephrased one".to_string(),
                "rephrased two".to_string(),
            ],
            3,
        );
        assert_eq!(queries, ["original question", "rephrased one", "rephrased two"]);
    }
}
