//! Semantic retrieval core: embeddings, corpus index, ranking, caching.
//!
//! # Architecture
//!
//! - `embeddings`: fastembed adapter behind the `TextEncoder` trait
//! - `index`: ordered in-memory corpus of (record, embedding) pairs
//! - `ranker`: brute-force cosine top-K with stable tie-breaking
//! - `cache`: fingerprint-keyed binary cache of corpus embeddings
//! - `service`: lazily-initialized search context owned by the caller

pub mod embeddings;
mod cache;
mod index;
mod ranker;
mod service;

pub use cache::{CacheKey, CacheMiss, EmbeddingCache};
pub use embeddings::{EmbeddingError, EmbeddingModel, TextEncoder};
pub use index::{description_for, CorpusEntry, CorpusIndex, IndexError};
pub use ranker::{search, QueryResult, SearchError};
pub use service::{PatentDetail, SearchService, ServiceError};
