//! High-level search service over the patent corpus.
//!
//! Owns the one embedding model and the one corpus index for the process.
//! Both are lazily initialized exactly once under a mutex, so concurrent
//! first access still builds the corpus a single time; after that every
//! operation is a read. This is the explicit context object the caller
//! constructs at startup and passes around — there is no global state.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::collaborators::{translate_or_fallback, Translator};
use crate::config::Config;
use crate::records::{self, LoadError, PatentRecord};
use crate::retrieval::cache::{CacheError, CacheKey, CacheMiss, EmbeddingCache};
use crate::retrieval::embeddings::{EmbeddingError, EmbeddingModel, TextEncoder};
use crate::retrieval::index::{CorpusIndex, IndexError};
use crate::retrieval::ranker::{self, QueryResult, SearchError};

/// File name of the embeddings cache under the base path
const CACHE_FILE: &str = "corpus.bin";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to load corpus: {0}")]
    Load(#[from] LoadError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("no patent found with publication number '{0}'")]
    NotFound(String),

    #[error("service not initialized")]
    NotInitialized,

    #[error("internal error: {0}")]
    Internal(String),
}

/// A single record with its optional lazily-translated abstract, for the
/// detail view.
#[derive(Debug, Clone, Serialize)]
pub struct PatentDetail {
    #[serde(flatten)]
    pub record: PatentRecord,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_abstract: Option<String>,
}

/// Initialized model + index pair. Model identity is shared by construction:
/// corpus vectors and query vectors can only come from this one model.
struct ServiceState {
    model: EmbeddingModel,
    index: CorpusIndex,
}

pub struct SearchService {
    config: Config,
    base_path: PathBuf,
    translator: Option<Box<dyn Translator>>,
    /// Lazily-initialized state. Uses Mutex<Option<_>> instead of OnceLock
    /// because get_or_try_init is unstable.
    state: Mutex<Option<ServiceState>>,
}

impl SearchService {
    /// Create the service in an uninitialized state; the model and index
    /// load on first use (or via `initialize`).
    pub fn new(config: Config, base_path: PathBuf) -> Self {
        Self {
            config,
            base_path,
            translator: None,
            state: Mutex::new(None),
        }
    }

    pub fn with_translator(mut self, translator: Box<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Force initialization (model load + corpus build-or-cache-load).
    ///
    /// Model or corpus failure here is fatal: no query is served after a
    /// failed initialize.
    pub fn initialize(&self) -> Result<(), ServiceError> {
        self.ensure_initialized()
    }

    pub fn is_initialized(&self) -> bool {
        self.state
            .lock()
            .ok()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Number of indexed patents; 0 before initialization.
    pub fn indexed_count(&self) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|s| s.index.len()))
            .unwrap_or(0)
    }

    /// Delete the on-disk embeddings cache so the next initialization
    /// re-encodes the whole corpus. Call before `initialize`.
    pub fn invalidate_cache(&self) -> Result<(), ServiceError> {
        let cache = EmbeddingCache::new(self.base_path.join(CACHE_FILE));
        cache.delete()?;
        Ok(())
    }

    /// Search the corpus for the top `k` records most similar to
    /// `query_text`.
    ///
    /// A per-query failure (empty input, encode error) is reported to the
    /// caller; the shared model and index are untouched by it.
    pub fn search(&self, query_text: &str, k: usize) -> Result<Vec<QueryResult>, ServiceError> {
        self.ensure_initialized()?;

        let guard = self
            .state
            .lock()
            .map_err(|e| ServiceError::Internal(format!("lock poisoned: {}", e)))?;

        let state = guard.as_ref().ok_or(ServiceError::NotInitialized)?;

        let results = ranker::search(query_text, &state.index, k, &state.model)?;
        Ok(results)
    }

    /// Full detail for one record, with the abstract lazily translated when
    /// requested and a translator is configured. Translation failure falls
    /// back to the original text.
    pub fn detail(
        &self,
        publication_number: &str,
        translate: bool,
    ) -> Result<PatentDetail, ServiceError> {
        self.ensure_initialized()?;

        let record = {
            let guard = self
                .state
                .lock()
                .map_err(|e| ServiceError::Internal(format!("lock poisoned: {}", e)))?;

            let state = guard.as_ref().ok_or(ServiceError::NotInitialized)?;

            state
                .index
                .find_by_publication_number(publication_number)
                .map(|entry| entry.record.clone())
                .ok_or_else(|| ServiceError::NotFound(publication_number.to_string()))?
        };
        // Lock released before the (possibly network-bound) translation call

        let translated_abstract = if translate {
            translate_or_fallback(self.translator.as_deref(), &record.abstract_text)
        } else {
            None
        };

        Ok(PatentDetail {
            record,
            translated_abstract,
        })
    }

    fn ensure_initialized(&self) -> Result<(), ServiceError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| ServiceError::Internal(format!("lock poisoned: {}", e)))?;

        if guard.is_none() {
            *guard = Some(self.do_init()?);
        }

        Ok(())
    }

    fn do_init(&self) -> Result<ServiceState, ServiceError> {
        log::info!(
            "initializing search service with model '{}'",
            self.config.embedding.model
        );

        let timeout = Duration::from_secs(self.config.embedding.download_timeout_secs);
        let model = EmbeddingModel::new(
            &self.config.embedding.model,
            self.base_path.clone(),
            Some(timeout),
        )?;

        let corpus_path = self.config.resolved_corpus_path();
        let records =
            records::load_records(&corpus_path, self.config.image_base_url.as_deref())?;

        let key = CacheKey {
            model_id: model.identity_hash(),
            fingerprint: EmbeddingCache::fingerprint(&corpus_path).map_err(CacheError::Io)?,
        };
        let cache = EmbeddingCache::new(self.base_path.join(CACHE_FILE));

        let index = match cache.load(&key, model.dimensions(), records.len()) {
            Ok(embeddings) => {
                log::info!("corpus cache hit: reusing {} embeddings", embeddings.len());
                CorpusIndex::from_cached(records, embeddings, model.dimensions())?
            }
            Err(miss) => {
                if miss != CacheMiss::NoFile {
                    log::info!("embeddings cache unusable ({}), re-encoding corpus", miss);
                }
                log::info!("embedding {} patent descriptions", records.len());

                let index = CorpusIndex::build(records, &model)?;

                let embeddings: Vec<Vec<f32>> =
                    index.embeddings().map(|e| e.to_vec()).collect();
                if let Err(err) = cache.save(&key, model.dimensions(), &embeddings) {
                    // Cache write failure costs a rebuild next run, nothing more
                    log::warn!("failed to write embeddings cache: {}", err);
                }

                index
            }
        };

        log::info!("corpus index ready: {} patents", index.len());

        Ok(ServiceState { model, index })
    }
}
