//! In-memory corpus index: one embedding per patent record.
//!
//! The index is an ordered sequence built once from the loaded records and
//! never mutated afterwards. Position in the sequence is the source row
//! order and is what breaks ranking ties.

use crate::records::PatentRecord;
use crate::retrieval::embeddings::{EmbeddingError, TextEncoder};

/// A record paired with its canonical description and embedding.
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub record: PatentRecord,
    pub description: String,
    pub embedding: Vec<f32>,
}

/// Ordered, immutable set of (record, embedding) pairs.
pub struct CorpusIndex {
    entries: Vec<CorpusEntry>,
    dimensions: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding count {got} does not match record count {expected}")]
    CountMismatch { expected: usize, got: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Canonical embedding input for a record: title and abstract joined with
/// a literal ". ".
///
/// The separator is inserted even when one side is empty. The stray
/// leading/trailing separator this produces is kept on purpose: corpus
/// embeddings were computed from exactly this text, and changing the join
/// would silently change every cached vector.
pub fn description_for(record: &PatentRecord) -> String {
    format!("{}. {}", record.title, record.abstract_text)
}

impl CorpusIndex {
    pub fn empty(dimensions: usize) -> Self {
        Self {
            entries: vec![],
            dimensions,
        }
    }

    /// Build the index by batch-encoding every record description in a
    /// single encoder call.
    ///
    /// Zero records is not an error; it yields an empty index and search
    /// against it reports no results.
    pub fn build(
        records: Vec<PatentRecord>,
        encoder: &dyn TextEncoder,
    ) -> Result<Self, IndexError> {
        if records.is_empty() {
            return Ok(Self::empty(encoder.dimensions()));
        }

        let descriptions: Vec<String> = records.iter().map(description_for).collect();

        let embeddings = encoder.encode_batch(&descriptions)?;

        Self::assemble(records, descriptions, embeddings, encoder.dimensions())
    }

    /// Rebuild the index from records plus previously cached embeddings,
    /// skipping the encoder entirely.
    pub fn from_cached(
        records: Vec<PatentRecord>,
        embeddings: Vec<Vec<f32>>,
        dimensions: usize,
    ) -> Result<Self, IndexError> {
        let descriptions: Vec<String> = records.iter().map(description_for).collect();
        Self::assemble(records, descriptions, embeddings, dimensions)
    }

    fn assemble(
        records: Vec<PatentRecord>,
        descriptions: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        dimensions: usize,
    ) -> Result<Self, IndexError> {
        if embeddings.len() != records.len() {
            return Err(IndexError::CountMismatch {
                expected: records.len(),
                got: embeddings.len(),
            });
        }

        for embedding in &embeddings {
            if embedding.len() != dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: dimensions,
                    got: embedding.len(),
                });
            }
        }

        let entries = records
            .into_iter()
            .zip(descriptions)
            .zip(embeddings)
            .map(|((record, description), embedding)| CorpusEntry {
                record,
                description,
                embedding,
            })
            .collect();

        Ok(Self {
            entries,
            dimensions,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn get(&self, position: usize) -> Option<&CorpusEntry> {
        self.entries.get(position)
    }

    /// Look up a record by its publication number (exact match).
    pub fn find_by_publication_number(&self, publication_number: &str) -> Option<&CorpusEntry> {
        self.entries
            .iter()
            .find(|entry| entry.record.publication_number == publication_number)
    }

    pub fn embeddings(&self) -> impl Iterator<Item = &[f32]> {
        self.entries.iter().map(|entry| entry.embedding.as_slice())
    }
}
