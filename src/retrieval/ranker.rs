//! Cosine-similarity ranking over the corpus index.
//!
//! Brute-force dense comparison: the corpus is small enough that every
//! entry is scored on every query. Results are deterministic — equal
//! scores keep source row order.

use serde::Serialize;

use crate::records::PatentRecord;
use crate::retrieval::embeddings::{EmbeddingError, TextEncoder};
use crate::retrieval::index::CorpusIndex;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The query was empty or whitespace-only. Recoverable: re-prompt.
    #[error("query text is empty")]
    EmptyQuery,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// One ranked search hit.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    #[serde(flatten)]
    pub record: PatentRecord,

    /// Cosine similarity in [-1, 1]; higher is more similar.
    pub score: f32,

    /// 1-based position in the returned top-K.
    pub rank: usize,
}

/// Rank the corpus against `query_text` and return the top `k` hits.
///
/// The query is encoded with the same encoder that built the index; an
/// empty index yields an empty result, an empty query is an error.
pub fn search(
    query_text: &str,
    index: &CorpusIndex,
    k: usize,
    encoder: &dyn TextEncoder,
) -> Result<Vec<QueryResult>, SearchError> {
    if query_text.trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }

    if index.is_empty() {
        return Ok(vec![]);
    }

    let query = encoder.encode(query_text)?;
    let query_norm = l2_norm(&query);

    let mut scored: Vec<(usize, f32)> = index
        .entries()
        .iter()
        .enumerate()
        .map(|(position, entry)| {
            (
                position,
                cosine_similarity(&query, query_norm, &entry.embedding),
            )
        })
        .collect();

    // Descending score; ties fall back to ascending corpus position so
    // identical inputs always produce identical output.
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(k);

    let results = scored
        .into_iter()
        .enumerate()
        .filter_map(|(i, (position, score))| {
            index.get(position).map(|entry| QueryResult {
                record: entry.record.clone(),
                score,
                rank: i + 1,
            })
        })
        .collect();

    Ok(results)
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity with the query norm precomputed.
/// A zero-norm vector on either side scores 0.0 instead of dividing by zero.
fn cosine_similarity(query: &[f32], query_norm: f32, target: &[f32]) -> f32 {
    if query_norm < f32::EPSILON {
        return 0.0;
    }

    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return 0.0;
    }

    let dot: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    dot / (query_norm * target_norm)
}
