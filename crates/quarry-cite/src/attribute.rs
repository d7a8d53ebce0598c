//! Span-to-chunk attribution with inline citation markers.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use quarry_analyze::similarity::hybrid_similarity;
use quarry_analyze::stopwords::strip_stopwords;
use quarry_analyze::tokenize::tokenize;
use quarry_core::config::CitationConfig;
use quarry_core::error::{QuarryError, Result};
use quarry_core::traits::Embedder;

use crate::spans::split_spans;

/// Spans shorter than this are never scored.
const MIN_SPAN_CHARS: usize = 5;

/// A hit must land within this fraction of the span's best score.
const NEAR_BEST: f32 = 0.99;

/// Annotate an answer with inline ` ##N$$` markers naming the chunks that
/// support each span, returning the annotated text and the cited chunk
/// indexes in marker order.
///
/// Spans are scored against every chunk with the weighted blend of term
/// overlap and embedding cosine from the citation config; only hits within
/// one percent of the span's best score are kept, at most `max_per_span`.
/// When nothing clears the threshold it decays toward the floor and the
/// pass repeats. Each chunk is cited once, at its first supporting span.
///
/// Embedding failures are survivable: the answer comes back unannotated.
/// Mismatched chunk vector dimensions degrade to zero vectors so the term
/// component still applies.
pub async fn insert_citations(
    answer: &str,
    chunk_texts: &[String],
    chunk_vectors: &[Vec<f32>],
    embedder: &dyn Embedder,
    config: &CitationConfig,
) -> Result<(String, Vec<usize>)> {
    if chunk_texts.len() != chunk_vectors.len() {
        return Err(QuarryError::invalid_argument(format!(
            "{} chunk texts against {} vectors",
            chunk_texts.len(),
            chunk_vectors.len()
        )));
    }
    if chunk_texts.is_empty() {
        return Ok((answer.to_string(), Vec::new()));
    }

    let pieces = split_spans(answer);
    let mut scorable_idx: Vec<usize> = Vec::new();
    let mut scorable: Vec<&str> = Vec::new();
    for (i, piece) in pieces.iter().enumerate() {
        if piece.chars().count() >= MIN_SPAN_CHARS {
            scorable_idx.push(i);
            scorable.push(piece);
        }
    }
    if scorable.is_empty() {
        return Ok((answer.to_string(), Vec::new()));
    }

    let span_vectors = match embedder.embed(&scorable).await {
        Ok(vectors) => vectors,
        Err(e) => {
            warn!(error = %e, "span embedding failed, returning the answer uncited");
            return Ok((answer.to_string(), Vec::new()));
        }
    };
    let dim = span_vectors.first().map(Vec::len).unwrap_or(0);
    let chunk_vectors: Vec<Vec<f32>> = chunk_vectors
        .iter()
        .map(|v| {
            if v.len() == dim {
                v.clone()
            } else {
                warn!(
                    expected = dim,
                    got = v.len(),
                    "chunk vector dimension mismatch, scoring with zeros"
                );
                vec![0.0; dim]
            }
        })
        .collect();

    let chunk_tokens: Vec<Vec<String>> = chunk_texts
        .iter()
        .map(|t| tokenize(&strip_stopwords(&t.to_lowercase())))
        .collect();
    let span_tokens: Vec<Vec<String>> = scorable
        .iter()
        .map(|t| tokenize(&strip_stopwords(&t.to_lowercase())))
        .collect();

    let mut cited: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut threshold = config.threshold;
    while threshold > config.floor && cited.is_empty() {
        for (s, &piece_idx) in scorable_idx.iter().enumerate() {
            let (sim, _, _) = hybrid_similarity(
                &span_vectors[s],
                &chunk_vectors,
                &span_tokens[s],
                &chunk_tokens,
                config.tk_weight,
                config.vt_weight,
            );
            let best = sim.iter().cloned().fold(0.0f32, f32::max);
            let near = best * NEAR_BEST;
            if near < threshold {
                continue;
            }
            let mut hits: Vec<usize> = (0..sim.len()).filter(|&c| sim[c] > near).collect();
            hits.truncate(config.max_per_span);
            cited.insert(piece_idx, hits);
        }
        threshold *= config.decay;
    }

    let mut out = String::new();
    let mut marked: BTreeSet<usize> = BTreeSet::new();
    for (i, piece) in pieces.iter().enumerate() {
        out.push_str(piece);
        if let Some(hits) = cited.get(&i) {
            for &c in hits {
                if marked.insert(c) {
                    out.push_str(&format!(" ##{}$$", c));
                }
            }
        }
    }
    debug!(
        spans = scorable_idx.len(),
        cited = marked.len(),
        "citation attribution complete"
    );
    Ok((out, marked.into_iter().collect()))
}
