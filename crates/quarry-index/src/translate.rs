//! Search request compilation into the engine query DSL.

use serde_json::{json, Map, Value};

use quarry_core::error::{QuarryError, Result};
use quarry_core::fields;
use quarry_core::types::{
    DenseMatch, FilterValue, MatchExpression, SearchRequest, SortDirection, TextMatch,
};

/// Text share applied when a text match arrives without fusion weights.
const NEUTRAL_TEXT_BOOST: f32 = 0.5;

/// Upper bound of a terms aggregation.
const AGG_BUCKET_LIMIT: u64 = 1_000_000;

/// {key: value} with a computed key.
fn single_key(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn availability_clause(value: &FilterValue) -> Result<Value> {
    let unavailable = json!({"range": single_key(fields::AVAILABLE, json!({"lt": 1}))});
    match value {
        // 0 means "only unavailable", anything else "exclude unavailable"
        FilterValue::Number(0) => Ok(unavailable),
        FilterValue::Number(_) => Ok(json!({"bool": {"must_not": unavailable}})),
        other => Err(QuarryError::query_build(format!(
            "availability filter must be numeric, got {:?}",
            other
        ))),
    }
}

fn filter_clauses(req: &SearchRequest) -> Result<Vec<Value>> {
    let mut clauses = Vec::new();
    for (field, value) in req.filters.iter() {
        if field == fields::AVAILABLE {
            clauses.push(availability_clause(value)?);
            continue;
        }
        match value {
            FilterValue::Text(s) => {
                if s.is_empty() {
                    continue;
                }
                clauses.push(json!({"term": single_key(field, json!(s))}));
            }
            FilterValue::Texts(vs) => {
                if vs.is_empty() {
                    continue;
                }
                if vs.len() == 1 {
                    clauses.push(json!({"term": single_key(field, json!(vs[0]))}));
                } else {
                    clauses.push(json!({"terms": single_key(field, json!(vs))}));
                }
            }
            FilterValue::Number(n) => {
                clauses.push(json!({"term": single_key(field, json!(n))}));
            }
            FilterValue::Range { gte, lt } => {
                let mut bounds = Map::new();
                if let Some(g) = gte {
                    bounds.insert("gte".to_string(), json!(g));
                }
                if let Some(l) = lt {
                    bounds.insert("lt".to_string(), json!(l));
                }
                if bounds.is_empty() {
                    return Err(QuarryError::query_build(format!(
                        "range filter on {} has no bounds",
                        field
                    )));
                }
                clauses.push(json!({"range": single_key(field, Value::Object(bounds))}));
            }
        }
    }
    Ok(clauses)
}

/// minimum_should_match wire form: fractions become percentages, values
/// above one become absolute clause counts.
fn format_min_should_match(value: Option<f32>) -> String {
    let value = value.unwrap_or(0.0);
    if value > 1.0 {
        format!("{}", value as i64)
    } else {
        format!("{}%", (value * 100.0) as i64)
    }
}

fn query_string_clause(text: &TextMatch) -> Value {
    json!({
        "query_string": {
            "fields": text.fields,
            "type": "best_fields",
            "query": text.query_string,
            "minimum_should_match": format_min_should_match(text.min_should_match),
            "boost": 1,
        }
    })
}

fn knn_clause(dense: &DenseMatch, filters: &[Value]) -> Value {
    json!({
        "field": dense.vector_field,
        "k": dense.top_n,
        "num_candidates": dense.candidate_pool,
        "query_vector": dense.vector,
        "filter": {"bool": {"filter": filters}},
        "similarity": dense.min_similarity,
    })
}

fn rank_feature_clauses(req: &SearchRequest) -> Vec<Value> {
    let Some(features) = &req.rank_features else {
        return Vec::new();
    };
    let mut pairs: Vec<(&String, &f32)> = features.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
        .into_iter()
        .map(|(tag, weight)| {
            let field = if tag == fields::PAGERANK {
                tag.clone()
            } else {
                format!("{}.{}", fields::TAG_FEATURES, tag)
            };
            json!({"rank_feature": {"field": field, "linear": {}, "boost": weight}})
        })
        .collect()
}

fn sort_clauses(req: &SearchRequest) -> Vec<Value> {
    req.order
        .iter()
        .map(|(field, direction)| {
            let order = match direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            if field == "_score" {
                return Value::String("_score".to_string());
            }
            let info = if field == fields::PAGE_NUM || field == fields::TOP {
                json!({
                    "order": order,
                    "unmapped_type": "float",
                    "mode": "avg",
                    "numeric_type": "double",
                })
            } else if field.ends_with("_int") || field.ends_with("_flt") {
                json!({"order": order, "unmapped_type": "float"})
            } else {
                json!({"order": order, "unmapped_type": "text"})
            };
            single_key(field, info)
        })
        .collect()
}

/// Compile a search request into the engine's query body.
///
/// The compiled shape is deterministic for a given request: filters follow
/// the filter-set order and rank features are emitted in tag order.
pub fn to_engine_query(req: &SearchRequest) -> Result<Value> {
    let filters = filter_clauses(req)?;

    let mut must: Vec<Value> = Vec::new();
    let mut bool_boost: Option<f32> = None;
    let mut knn: Option<Value> = None;

    match &req.match_expr {
        None => {}
        Some(MatchExpression::Text(text)) => {
            must.push(query_string_clause(text));
            bool_boost = Some(NEUTRAL_TEXT_BOOST);
        }
        Some(MatchExpression::Dense(dense)) => {
            knn = Some(knn_clause(dense, &filters));
        }
        Some(MatchExpression::Hybrid {
            text,
            dense,
            fusion,
        }) => {
            must.push(query_string_clause(text));
            bool_boost = Some(fusion.weights.text());
            knn = Some(knn_clause(dense, &filters));
        }
    }

    let mut bool_body = Map::new();
    bool_body.insert("filter".to_string(), Value::Array(filters));
    if !must.is_empty() {
        bool_body.insert("must".to_string(), Value::Array(must));
    }
    let should = rank_feature_clauses(req);
    if !should.is_empty() {
        bool_body.insert("should".to_string(), Value::Array(should));
    }
    if let Some(boost) = bool_boost {
        bool_body.insert("boost".to_string(), json!(boost));
    }

    let mut body = Map::new();
    body.insert("query".to_string(), json!({"bool": Value::Object(bool_body)}));
    body.insert("_source".to_string(), json!(true));

    if let Some(knn) = knn {
        body.insert("knn".to_string(), knn);
    }

    let sorts = sort_clauses(req);
    if !sorts.is_empty() {
        body.insert("sort".to_string(), Value::Array(sorts));
    }

    if !req.aggregation_fields.is_empty() {
        let mut aggs = Map::new();
        for field in &req.aggregation_fields {
            aggs.insert(
                format!("aggs_{}", field),
                json!({"terms": {"field": field, "size": AGG_BUCKET_LIMIT}}),
            );
        }
        body.insert("aggs".to_string(), Value::Object(aggs));
    }

    if !req.highlight_fields.is_empty() {
        let mut highlight_fields = Map::new();
        for field in &req.highlight_fields {
            highlight_fields.insert(field.clone(), json!({}));
        }
        body.insert(
            "highlight".to_string(),
            json!({"fields": Value::Object(highlight_fields)}),
        );
    }

    if req.limit > 0 {
        body.insert("from".to_string(), json!(req.offset));
        body.insert("size".to_string(), json!(req.limit));
    } else {
        // aggregation-only searches fetch no hits
        body.insert("size".to_string(), json!(0));
    }

    Ok(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::types::{FilterSet, FusionMethod, FusionSpec, FusionWeights, OrderSpec};

    fn hybrid_request() -> SearchRequest {
        let mut filters = FilterSet::new();
        filters.insert(
            fields::KB_ID,
            FilterValue::Texts(vec!["kb1".into(), "kb2".into()]),
        );
        filters.insert(fields::AVAILABLE, FilterValue::Number(1));

        SearchRequest {
            filters,
            match_expr: Some(MatchExpression::Hybrid {
                text: TextMatch {
                    fields: vec!["title_tks^10".into(), "content_ltks^2".into()],
                    query_string: "(capital^0.5385) (france^0.4615)".into(),
                    top_n: 100,
                    min_should_match: Some(0.3),
                },
                dense: DenseMatch {
                    vector_field: "q_4_vec".into(),
                    vector: vec![0.1, 0.2, 0.3, 0.4],
                    top_n: 64,
                    candidate_pool: 128,
                    min_similarity: 0.1,
                },
                fusion: FusionSpec {
                    method: FusionMethod::WeightedSum,
                    top_n: 64,
                    weights: FusionWeights::from_vector_weight(0.95),
                },
            }),
            offset: 0,
            limit: 30,
            select_fields: vec![fields::CONTENT.into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_hybrid_query_shape() {
        let body = to_engine_query(&hybrid_request()).unwrap();

        let boost = body["query"]["bool"]["boost"].as_f64().unwrap();
        assert!((boost - 0.05).abs() < 1e-6);

        let qs = &body["query"]["bool"]["must"][0]["query_string"];
        assert_eq!(qs["minimum_should_match"], "30%");
        assert_eq!(qs["type"], "best_fields");

        assert_eq!(body["knn"]["k"], 64);
        assert_eq!(body["knn"]["num_candidates"], 128);
        assert_eq!(body["knn"]["field"], "q_4_vec");
        let knn_filters = body["knn"]["filter"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(knn_filters.len(), 2);

        assert_eq!(body["from"], 0);
        assert_eq!(body["size"], 30);
    }

    #[test]
    fn test_availability_filter_forms() {
        let mut req = SearchRequest::default();
        req.filters.insert(fields::AVAILABLE, FilterValue::Number(1));
        req.limit = 10;
        let body = to_engine_query(&req).unwrap();
        let clause = &body["query"]["bool"]["filter"][0];
        assert!(clause["bool"]["must_not"]["range"]["available_int"]["lt"].is_number());

        let mut req = SearchRequest::default();
        req.filters.insert(fields::AVAILABLE, FilterValue::Number(0));
        req.limit = 10;
        let body = to_engine_query(&req).unwrap();
        let clause = &body["query"]["bool"]["filter"][0];
        assert_eq!(clause["range"]["available_int"]["lt"], 1);
    }

    #[test]
    fn test_availability_filter_rejects_text() {
        let mut req = SearchRequest::default();
        req.filters
            .insert(fields::AVAILABLE, FilterValue::Text("yes".into()));
        let err = to_engine_query(&req).unwrap_err();
        assert_eq!(err.error_code(), "QUERY_BUILD_ERROR");
    }

    #[test]
    fn test_term_vs_terms_by_cardinality() {
        let mut req = SearchRequest::default();
        req.filters
            .insert(fields::DOC_ID, FilterValue::Texts(vec!["d1".into()]));
        req.limit = 10;
        let body = to_engine_query(&req).unwrap();
        assert_eq!(body["query"]["bool"]["filter"][0]["term"]["doc_id"], "d1");

        let mut req = SearchRequest::default();
        req.filters.insert(
            fields::DOC_ID,
            FilterValue::Texts(vec!["d1".into(), "d2".into()]),
        );
        req.limit = 10;
        let body = to_engine_query(&req).unwrap();
        let terms = body["query"]["bool"]["filter"][0]["terms"]["doc_id"]
            .as_array()
            .unwrap();
        assert_eq!(terms.len(), 2);
    }

    #[test]
    fn test_empty_filter_values_skipped() {
        let mut req = SearchRequest::default();
        req.filters.insert(fields::DOC_ID, FilterValue::Texts(vec![]));
        req.filters.insert("extra_kwd", FilterValue::Text("".into()));
        req.limit = 10;
        let body = to_engine_query(&req).unwrap();
        assert!(body["query"]["bool"]["filter"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_rank_feature_clauses() {
        let mut req = SearchRequest::default();
        req.limit = 10;
        let mut features = std::collections::HashMap::new();
        features.insert(fields::PAGERANK.to_string(), 10.0);
        features.insert("quantum".to_string(), 3.0);
        req.rank_features = Some(features);

        let body = to_engine_query(&req).unwrap();
        let should = body["query"]["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 2);
        // tags are emitted in name order: pagerank_fea then quantum
        assert_eq!(should[0]["rank_feature"]["field"], "pagerank_fea");
        assert_eq!(should[1]["rank_feature"]["field"], "tag_feas.quantum");
        assert_eq!(should[1]["rank_feature"]["boost"], 3.0);
    }

    #[test]
    fn test_sort_unmapped_fallbacks() {
        let mut req = SearchRequest::default();
        req.limit = 10;
        req.order = OrderSpec::new()
            .asc(fields::PAGE_NUM)
            .desc(fields::CREATE_TIMESTAMP)
            .asc("docnm_kwd");
        let body = to_engine_query(&req).unwrap();
        let sorts = body["sort"].as_array().unwrap();
        assert_eq!(sorts[0]["page_num_int"]["mode"], "avg");
        assert_eq!(sorts[0]["page_num_int"]["numeric_type"], "double");
        assert_eq!(sorts[1]["create_timestamp_flt"]["unmapped_type"], "float");
        assert_eq!(sorts[2]["docnm_kwd"]["unmapped_type"], "text");
    }

    #[test]
    fn test_aggregation_only_fetches_no_hits() {
        let mut req = SearchRequest::default();
        req.aggregation_fields = vec![fields::TAG_KEYWORD.to_string()];
        req.limit = 0;
        let body = to_engine_query(&req).unwrap();
        assert_eq!(body["size"], 0);
        assert!(body.get("from").is_none());
        assert_eq!(
            body["aggs"]["aggs_tag_kwd"]["terms"]["size"],
            AGG_BUCKET_LIMIT
        );
    }

    #[test]
    fn test_min_should_match_count_form() {
        assert_eq!(format_min_should_match(Some(0.3)), "30%");
        assert_eq!(format_min_should_match(Some(2.4)), "2");
        assert_eq!(format_min_should_match(None), "0%");
        assert_eq!(format_min_should_match(Some(1.0)), "100%");
    }

    #[test]
    fn test_highlight_fields() {
        let mut req = SearchRequest::default();
        req.limit = 10;
        req.highlight_fields = vec!["content_ltks".into(), "title_tks".into()];
        let body = to_engine_query(&req).unwrap();
        assert!(body["highlight"]["fields"]["content_ltks"].is_object());
        assert!(body["highlight"]["fields"]["title_tks"].is_object());
    }
}
