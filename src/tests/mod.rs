//! Integration tests for the retrieval pipeline.
//!
//! Everything here runs offline: `StubEncoder` stands in for the fastembed
//! model with deterministic vectors and call counters, so ranking, caching,
//! and loader behavior are testable without a model download.

mod retrieval;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::records::PatentRecord;
use crate::retrieval::{EmbeddingError, TextEncoder};

/// Deterministic in-memory encoder.
///
/// Texts can be programmed to exact vectors; anything unprogrammed falls
/// back to a token-hash bag vector, which is still deterministic (same
/// text, same vector) so similarity and idempotence properties hold.
pub struct StubEncoder {
    dimensions: usize,
    programmed: HashMap<String, Vec<f32>>,
    encode_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl StubEncoder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            programmed: HashMap::new(),
            encode_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimensions, "programmed vector dimension");
        self.programmed.insert(text.to_string(), vector);
        self
    }

    pub fn encode_calls(&self) -> usize {
        self.encode_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(vector) = self.programmed.get(text) {
            return vector.clone();
        }

        use std::hash::{Hash, Hasher};

        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.split_whitespace() {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            token.hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dimensions;
            vector[idx] += 1.0;
        }
        vector
    }
}

impl TextEncoder for StubEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.encode_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn identity_hash(&self) -> [u8; 32] {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("stub-encoder-{}", self.dimensions).as_bytes());
        hasher.finalize().into()
    }
}

pub fn record(publication_number: &str, title: &str, abstract_text: &str) -> PatentRecord {
    PatentRecord {
        publication_number: publication_number.to_string(),
        title: title.to_string(),
        abstract_text: abstract_text.to_string(),
        ..Default::default()
    }
}
