//! Citation record assembly for "sources used" display.

use quarry_core::types::{Citation, CitationOffsets, RetrievedChunk};

/// Snippet cap in characters.
const SNIPPET_CHARS: usize = 300;

/// Build display records from ranked chunks, preserving rank order.
///
/// The page and offsets come from the chunk's layout boxes: the page and
/// top of the first box, the bottom of the last. Chunks without layout
/// information carry zeros.
pub fn build_citations(chunks: &[RetrievedChunk]) -> Vec<Citation> {
    chunks
        .iter()
        .map(|chunk| {
            let first = chunk.positions.first();
            let page = first.and_then(|p| p.first()).copied().unwrap_or(0);
            let start = first.and_then(|p| p.get(3)).copied().unwrap_or(0);
            let end = chunk
                .positions
                .last()
                .and_then(|p| p.get(4))
                .copied()
                .unwrap_or(0);
            Citation {
                document_id: chunk.doc_id.clone(),
                page,
                chunk_id: chunk.chunk_id.clone(),
                score: chunk.similarity,
                snippet: chunk.content.trim().chars().take(SNIPPET_CHARS).collect(),
                offsets: CitationOffsets { start, end },
            }
        })
        .collect()
}
